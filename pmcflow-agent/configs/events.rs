// Event sets: which events go into the slots and how their counts become metrics

use crate::counters::NormalizedCounts;
use crate::metrics::ConfigDescription;

/// One programmable event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSpec {
    pub name: &'static str,
    pub event: u16,
    pub umask: u8,
}

impl EventSpec {
    pub const fn new(name: &'static str, event: u16, umask: u8) -> Self {
        Self { name, event, umask }
    }
}

/// Turns the normalized counts of a unit (or of a whole domain) into one
/// value per metric column
pub type MetricFn = fn(&NormalizedCounts) -> Vec<f64>;

/// A named choice of events for the slots of one domain, with its formulas
///
/// `events[i]` is programmed into slot `i`, so `compute` reads it back as
/// `counts.slot(i)`.
#[derive(Debug, Clone, Copy)]
pub struct EventSet {
    pub id: &'static str,
    pub name: &'static str,
    pub help: &'static str,
    /// Column headers; the first one names the row label
    pub columns: &'static [&'static str],
    pub events: &'static [EventSpec],
    pub compute: MetricFn,
}

impl EventSet {
    pub fn describe(&self) -> ConfigDescription {
        ConfigDescription {
            id: self.id,
            name: self.name,
            columns: self.columns.to_vec(),
            help: self.help,
        }
    }

    /// Number of value columns, i.e. without the label column
    pub fn metric_count(&self) -> usize {
        self.columns.len().saturating_sub(1)
    }
}
