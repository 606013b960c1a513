// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod configs;
pub mod counters;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod prom;

#[cfg(test)]
mod testing;

pub use config::MonitorConfig;
pub use configs::{Configuration, MonitoringConfig, MonitoringDomain};
pub use error::{PmcError, Result};
pub use orchestrator::{Hardware, MonitorController, ResultSink};
pub use prom::ResultExporter;
