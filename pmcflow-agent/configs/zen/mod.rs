pub mod core;
pub mod df;
pub mod events;
pub mod l3;

pub use self::core::ZenCoreConfig;
pub use df::ZenDataFabricConfig;
pub use l3::{L3Encoding, ZenL3Config};
