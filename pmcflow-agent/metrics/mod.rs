pub mod derive;
pub mod types;

pub use types::{ConfigDescription, MetricRow, RawCounterValue, UpdateResults};
