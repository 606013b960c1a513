use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::configs::MonitoringDomain;
use crate::error::{PmcError, Result};
use crate::metrics::{ConfigDescription, UpdateResults};

/// Receives the outcome of every tick of every domain
pub trait ResultSink: Send + Sync {
    fn publish(&self, domain: MonitoringDomain, config: &ConfigDescription, results: &UpdateResults);

    /// The tick produced nothing; previously published values stay in place
    fn tick_failed(&self, domain: MonitoringDomain, config: &ConfigDescription, error: &PmcError);

    /// `config` was released and the domain will publish nothing until the next activation
    fn domain_stopped(&self, _domain: MonitoringDomain, _config: &ConfigDescription) {}
}

/// Logs the overall row of each tick
#[derive(Debug, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn publish(&self, domain: MonitoringDomain, config: &ConfigDescription, results: &UpdateResults) {
        let summary: Vec<String> = config
            .columns
            .iter()
            .skip(1)
            .zip(&results.overall.values)
            .map(|(column, value)| format!("{column}={value:.3}"))
            .collect();

        tracing::info!(
            "[{}] {} {}: {}",
            domain,
            config.name,
            results.overall.label,
            summary.join(" ")
        );
        for row in &results.unit_rows {
            tracing::debug!("[{}] {}: {:?}", domain, row.label, row.values);
        }
    }

    fn tick_failed(&self, domain: MonitoringDomain, config: &ConfigDescription, error: &PmcError) {
        tracing::warn!("[{}] {} tick failed: {}", domain, config.name, error);
    }

    fn domain_stopped(&self, domain: MonitoringDomain, config: &ConfigDescription) {
        tracing::info!("[{}] {} stopped", domain, config.name);
    }
}

#[derive(Serialize)]
struct JsonRow<'a> {
    timestamp_ms: u128,
    domain: &'static str,
    config: &'static str,
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<&'a [f64]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Append-only log with one JSON object per row per tick
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        tracing::info!("Logging results to {}", path.as_ref().display());

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn now_ms() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }

    fn write_rows(&self, rows: &[JsonRow<'_>]) -> Result<()> {
        let mut writer = self.writer.lock();
        for row in rows {
            serde_json::to_writer(&mut *writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ResultSink for JsonLinesSink {
    fn publish(&self, domain: MonitoringDomain, config: &ConfigDescription, results: &UpdateResults) {
        let timestamp_ms = Self::now_ms();
        let rows: Vec<JsonRow<'_>> = results
            .unit_rows
            .iter()
            .chain(std::iter::once(&results.overall))
            .map(|row| JsonRow {
                timestamp_ms,
                domain: domain.name(),
                config: config.id,
                label: &row.label,
                values: Some(&row.values),
                error: None,
            })
            .collect();

        if let Err(e) = self.write_rows(&rows) {
            tracing::error!("Failed to write result log: {}", e);
        }
    }

    fn tick_failed(&self, domain: MonitoringDomain, config: &ConfigDescription, error: &PmcError) {
        let row = JsonRow {
            timestamp_ms: Self::now_ms(),
            domain: domain.name(),
            config: config.id,
            label: "",
            values: None,
            error: Some(error.to_string()),
        };
        if let Err(e) = self.write_rows(&[row]) {
            tracing::error!("Failed to write result log: {}", e);
        }
    }
}

/// Forwards every event to each inner sink in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ResultSink for FanoutSink {
    fn publish(&self, domain: MonitoringDomain, config: &ConfigDescription, results: &UpdateResults) {
        for sink in &self.sinks {
            sink.publish(domain, config, results);
        }
    }

    fn tick_failed(&self, domain: MonitoringDomain, config: &ConfigDescription, error: &PmcError) {
        for sink in &self.sinks {
            sink.tick_failed(domain, config, error);
        }
    }

    fn domain_stopped(&self, domain: MonitoringDomain, config: &ConfigDescription) {
        for sink in &self.sinks {
            sink.domain_stopped(domain, config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRow;

    fn description() -> ConfigDescription {
        ConfigDescription {
            id: "branch",
            name: "Branch Prediction",
            columns: vec!["Item", "IPC"],
            help: "",
        }
    }

    fn results() -> UpdateResults {
        UpdateResults {
            unit_rows: vec![
                MetricRow::new("Thread 0", vec![1.5]),
                MetricRow::new("Thread 1", vec![0.5]),
            ],
            overall: MetricRow::new("Overall", vec![1.0]),
            raw_counters: Vec::new(),
        }
    }

    #[test]
    fn test_json_lines_append_one_row_per_line() {
        let path = std::env::temp_dir().join(format!("pmcflow-sink-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let sink = JsonLinesSink::create(&path).unwrap();
        sink.publish(MonitoringDomain::Core, &description(), &results());
        sink.tick_failed(
            MonitoringDomain::Core,
            &description(),
            &PmcError::ConfigurationMismatch("stale".to_string()),
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["label"], "Thread 0");
        assert_eq!(lines[0]["domain"], "core");
        assert_eq!(lines[2]["label"], "Overall");
        assert_eq!(lines[2]["values"][0], 1.0);
        assert!(lines[3]["error"].as_str().unwrap().contains("stale"));

        let _ = std::fs::remove_file(&path);
    }

    #[derive(Default)]
    struct Counting {
        published: std::sync::atomic::AtomicUsize,
        failed: std::sync::atomic::AtomicUsize,
        stopped: std::sync::atomic::AtomicUsize,
    }

    impl ResultSink for Counting {
        fn publish(&self, _: MonitoringDomain, _: &ConfigDescription, _: &UpdateResults) {
            self.published
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        fn tick_failed(&self, _: MonitoringDomain, _: &ConfigDescription, _: &PmcError) {
            self.failed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        fn domain_stopped(&self, _: MonitoringDomain, _: &ConfigDescription) {
            self.stopped.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let fanout = FanoutSink::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(LogSink));

        fanout.publish(MonitoringDomain::L3, &description(), &results());
        fanout.tick_failed(
            MonitoringDomain::L3,
            &description(),
            &PmcError::ConfigError("x".to_string()),
        );
        fanout.domain_stopped(MonitoringDomain::L3, &description());

        for sink in [&a, &b] {
            assert_eq!(sink.published.load(std::sync::atomic::Ordering::SeqCst), 1);
            assert_eq!(sink.failed.load(std::sync::atomic::Ordering::SeqCst), 1);
            assert_eq!(sink.stopped.load(std::sync::atomic::Ordering::SeqCst), 1);
        }
    }
}
