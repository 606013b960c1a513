use serde::Serialize;

/// One labelled row of derived metric values, in column order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub label: String,
    pub values: Vec<f64>,
}

impl MetricRow {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawCounterValue {
    pub name: String,
    pub value: f64,
}

/// Everything one tick of one domain produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateResults {
    pub unit_rows: Vec<MetricRow>,
    pub overall: MetricRow,
    pub raw_counters: Vec<RawCounterValue>,
}

/// Static metadata of a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigDescription {
    pub id: &'static str,
    pub name: &'static str,
    /// Column headers; the first names the label column
    pub columns: Vec<&'static str>,
    pub help: &'static str,
}
