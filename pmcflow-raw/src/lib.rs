//! # pmcflow-raw
//!
//! Register definitions for core, L3 and data-fabric performance counters on
//! AMD Zen and Intel processors.
//!
//! This crate provides type-safe encodings of the event-select registers that
//! program counter slots, the MSR addresses of the counters themselves, and raw
//! access to `/dev/cpu/*/msr`. It does not interpret event semantics: which event
//! goes into which slot is decided by the caller.
//!
//! ## Usage
//!
//! ```ignore
//! use pmcflow_raw::arch::amd::core::{msr, PerfCtl};
//! use pmcflow_raw::{read_msr, write_msr, RegisterLayout};
//!
//! let ctl = PerfCtl::counting(0xC0, 0x00);
//! write_msr(0, msr::PERF_CTL[0], ctl.to_msr_value())?;
//! let retired = read_msr(0, msr::PERF_CTR[0])?;
//! ```

pub mod arch;
pub mod msr;
pub mod register;

// Re-export for convenience
pub use msr::{read_msr, write_msr, MsrError, MsrFile, Result};
pub use register::{width_mask, RegisterLayout};
