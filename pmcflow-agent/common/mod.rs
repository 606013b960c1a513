pub mod affinity;
pub mod arch;
pub mod clock;
pub mod cpuid;
pub mod msr;
pub mod port;
pub mod topology;

pub use affinity::{PinArbiter, PinGuard};
pub use arch::{CpuArchitecture, CpuVendor, CPU_ARCH};
pub use clock::{Clock, MonotonicClock};
pub use msr::MsrPort;
pub use port::RegisterPort;
pub use topology::{ThreadInfo, Topology};
