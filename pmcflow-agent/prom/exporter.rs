use parking_lot::Mutex;
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};
use std::collections::HashMap;
use std::sync::Arc;

use crate::configs::MonitoringDomain;
use crate::error::{PmcError, Result};
use crate::metrics::{ConfigDescription, UpdateResults};
use crate::orchestrator::ResultSink;

/// Serves the latest tick of every domain as Prometheus gauges
///
/// Each domain has one gauge family labelled by configuration, unit and
/// metric column. A failed tick leaves the previous values in place; a
/// stopped domain serves nothing until it publishes again.
pub struct ResultExporter {
    registry: Arc<Registry>,
    domain_gauges: HashMap<MonitoringDomain, GaugeVec>,
    raw_counters: GaugeVec,
    /// (config, counter) labels each domain last set on `raw_counters`
    raw_series: Mutex<HashMap<MonitoringDomain, Vec<(&'static str, String)>>>,
    ticks: IntCounterVec,
    failures: IntCounterVec,
}

impl ResultExporter {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let mut domain_gauges = HashMap::new();
        for domain in MonitoringDomain::all() {
            let gauge = GaugeVec::new(
                Opts::new(
                    format!("pmcflow_{}", domain.name()),
                    format!("Derived {} metrics of the active configuration", domain.name()),
                ),
                &["config", "unit", "metric"],
            )?;
            registry.register(Box::new(gauge.clone()))?;
            domain_gauges.insert(domain, gauge);
        }

        let raw_counters = GaugeVec::new(
            Opts::new(
                "pmcflow_raw_counter",
                "Per-second domain total of each tracked register",
            ),
            &["domain", "config", "counter"],
        )?;
        registry.register(Box::new(raw_counters.clone()))?;

        let ticks = IntCounterVec::new(
            Opts::new("pmcflow_ticks_total", "Successful sampling ticks"),
            &["domain"],
        )?;
        registry.register(Box::new(ticks.clone()))?;

        let failures = IntCounterVec::new(
            Opts::new("pmcflow_tick_failures_total", "Failed sampling ticks"),
            &["domain"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        Ok(Self {
            registry,
            domain_gauges,
            raw_counters,
            raw_series: Mutex::new(HashMap::new()),
            ticks,
            failures,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn clear_raw_counters(&self, domain: MonitoringDomain) {
        let Some(series) = self.raw_series.lock().remove(&domain) else {
            return;
        };
        for (config, counter) in series {
            if let Err(e) = self
                .raw_counters
                .remove_label_values(&[domain.name(), config, counter.as_str()])
            {
                tracing::debug!("Raw counter {} of {} already gone: {}", counter, domain, e);
            }
        }
    }

    fn update_gauges(
        &self,
        domain: MonitoringDomain,
        config: &ConfigDescription,
        results: &UpdateResults,
    ) -> Result<()> {
        let gauges = self.domain_gauges.get(&domain).ok_or_else(|| {
            PmcError::ConfigError(format!("No gauges registered for domain {domain}"))
        })?;

        // drop units and columns of a previously active configuration
        gauges.reset();
        for row in results.unit_rows.iter().chain(std::iter::once(&results.overall)) {
            for (&column, value) in config.columns.iter().skip(1).zip(&row.values) {
                gauges
                    .get_metric_with_label_values(&[config.id, row.label.as_str(), column])?
                    .set(*value);
            }
        }

        self.clear_raw_counters(domain);
        let mut series = Vec::with_capacity(results.raw_counters.len());
        for raw in &results.raw_counters {
            self.raw_counters
                .get_metric_with_label_values(&[domain.name(), config.id, raw.name.as_str()])?
                .set(raw.value);
            series.push((config.id, raw.name.clone()));
        }
        self.raw_series.lock().insert(domain, series);

        self.ticks
            .get_metric_with_label_values(&[domain.name()])?
            .inc();
        Ok(())
    }
}

impl ResultSink for ResultExporter {
    fn publish(&self, domain: MonitoringDomain, config: &ConfigDescription, results: &UpdateResults) {
        if let Err(e) = self.update_gauges(domain, config, results) {
            tracing::error!("Failed to update {} gauges: {}", domain, e);
        }
    }

    fn tick_failed(&self, domain: MonitoringDomain, _config: &ConfigDescription, _error: &PmcError) {
        self.failures.with_label_values(&[domain.name()]).inc();
    }

    fn domain_stopped(&self, domain: MonitoringDomain, _config: &ConfigDescription) {
        if let Some(gauges) = self.domain_gauges.get(&domain) {
            gauges.reset();
        }
        self.clear_raw_counters(domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricRow, RawCounterValue};

    fn description(id: &'static str) -> ConfigDescription {
        ConfigDescription {
            id,
            name: "Test",
            columns: vec!["Item", "IPC", "Power (W)"],
            help: "",
        }
    }

    fn results(ipc: f64) -> UpdateResults {
        UpdateResults {
            unit_rows: vec![MetricRow::new("Thread 0", vec![ipc, 5.0])],
            overall: MetricRow::new("Overall", vec![ipc, 5.0]),
            raw_counters: vec![],
        }
    }

    fn with_raw(mut results: UpdateResults, counter: &str, value: f64) -> UpdateResults {
        results.raw_counters.push(RawCounterValue {
            name: counter.to_string(),
            value,
        });
        results
    }

    /// (domain, config, counter) labels of every served raw counter
    fn raw_series(exporter: &ResultExporter) -> Vec<(String, String, String)> {
        let families = exporter.registry().gather();
        let Some(family) = families
            .iter()
            .find(|family| family.get_name() == "pmcflow_raw_counter")
        else {
            return Vec::new();
        };

        let mut series: Vec<(String, String, String)> = family
            .get_metric()
            .iter()
            .map(|m| {
                let labels: HashMap<&str, &str> = m
                    .get_label()
                    .iter()
                    .map(|l| (l.get_name(), l.get_value()))
                    .collect();
                (
                    labels["domain"].to_string(),
                    labels["config"].to_string(),
                    labels["counter"].to_string(),
                )
            })
            .collect();
        series.sort();
        series
    }

    fn series(domain: &str, config: &str, counter: &str) -> (String, String, String) {
        (domain.to_string(), config.to_string(), counter.to_string())
    }

    fn gauge(exporter: &ResultExporter, config: &str, unit: &str, metric: &str) -> Option<f64> {
        let families = exporter.registry().gather();
        families
            .iter()
            .find(|family| family.get_name() == "pmcflow_core")?
            .get_metric()
            .iter()
            .find(|m| {
                let labels: HashMap<&str, &str> = m
                    .get_label()
                    .iter()
                    .map(|l| (l.get_name(), l.get_value()))
                    .collect();
                labels.get("config") == Some(&config)
                    && labels.get("unit") == Some(&unit)
                    && labels.get("metric") == Some(&metric)
            })
            .map(|m| m.get_gauge().get_value())
    }

    #[test]
    fn test_publish_sets_one_gauge_per_cell() {
        let exporter = ResultExporter::new().unwrap();
        exporter.publish(MonitoringDomain::Core, &description("branch"), &results(1.25));

        assert_eq!(gauge(&exporter, "branch", "Thread 0", "IPC"), Some(1.25));
        assert_eq!(gauge(&exporter, "branch", "Overall", "Power (W)"), Some(5.0));
    }

    #[test]
    fn test_failed_tick_keeps_previous_values() {
        let exporter = ResultExporter::new().unwrap();
        exporter.publish(MonitoringDomain::Core, &description("branch"), &results(2.0));
        exporter.tick_failed(
            MonitoringDomain::Core,
            &description("branch"),
            &PmcError::ConfigError("boom".to_string()),
        );

        assert_eq!(gauge(&exporter, "branch", "Thread 0", "IPC"), Some(2.0));
        assert_eq!(exporter.failures.with_label_values(&["core"]).get(), 1);
    }

    #[test]
    fn test_switching_configuration_drops_old_series() {
        let exporter = ResultExporter::new().unwrap();
        exporter.publish(MonitoringDomain::Core, &description("branch"), &results(2.0));
        exporter.publish(MonitoringDomain::Core, &description("opcache"), &results(3.0));

        assert_eq!(gauge(&exporter, "branch", "Thread 0", "IPC"), None);
        assert_eq!(gauge(&exporter, "opcache", "Thread 0", "IPC"), Some(3.0));
    }

    #[test]
    fn test_switching_configuration_drops_old_raw_counters() {
        let exporter = ResultExporter::new().unwrap();
        exporter.publish(
            MonitoringDomain::Core,
            &description("branch"),
            &with_raw(results(2.0), "Retired Branches", 10.0),
        );
        exporter.publish(
            MonitoringDomain::L3,
            &description("l3-hitrate"),
            &with_raw(results(1.0), "L3 Accesses", 7.0),
        );
        exporter.publish(
            MonitoringDomain::Core,
            &description("opcache"),
            &with_raw(results(3.0), "Ops From Decoder", 20.0),
        );

        assert_eq!(
            raw_series(&exporter),
            vec![
                series("core", "opcache", "Ops From Decoder"),
                series("l3", "l3-hitrate", "L3 Accesses"),
            ]
        );
    }

    #[test]
    fn test_stopped_domain_serves_nothing() {
        let exporter = ResultExporter::new().unwrap();
        exporter.publish(
            MonitoringDomain::Core,
            &description("branch"),
            &with_raw(results(2.0), "Retired Branches", 10.0),
        );
        exporter.publish(
            MonitoringDomain::L3,
            &description("l3-hitrate"),
            &with_raw(results(1.0), "L3 Accesses", 7.0),
        );

        exporter.domain_stopped(MonitoringDomain::Core, &description("branch"));

        assert_eq!(gauge(&exporter, "branch", "Thread 0", "IPC"), None);
        assert_eq!(raw_series(&exporter), vec![series("l3", "l3-hitrate", "L3 Accesses")]);

        exporter.publish(MonitoringDomain::Core, &description("branch"), &results(4.0));
        assert_eq!(gauge(&exporter, "branch", "Thread 0", "IPC"), Some(4.0));
    }
}
