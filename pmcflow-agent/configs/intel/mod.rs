pub mod core;
pub mod events;

pub use self::core::IntelCoreConfig;
