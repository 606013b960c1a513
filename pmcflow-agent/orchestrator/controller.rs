// Per-domain sampling loops
// One tokio task per active domain; register work runs on the blocking pool

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::common::affinity::PinArbiter;
use crate::common::arch::CpuArchitecture;
use crate::common::clock::Clock;
use crate::common::port::RegisterPort;
use crate::common::topology::Topology;
use crate::config::DEFAULT_PERIOD;
use crate::configs::{self, Configuration, MonitoringConfig, MonitoringDomain};
use crate::counters::SampleContext;
use crate::error::{PmcError, Result};
use crate::metrics::ConfigDescription;
use crate::orchestrator::ResultSink;

/// Register port, clock and the pin arbiter every domain shares
pub struct Hardware {
    port: Arc<dyn RegisterPort>,
    clock: Arc<dyn Clock>,
    arbiter: PinArbiter,
}

impl Hardware {
    pub fn new(port: Arc<dyn RegisterPort>, clock: Arc<dyn Clock>) -> Self {
        Self {
            port,
            clock,
            arbiter: PinArbiter::new(),
        }
    }

    pub fn ctx(&self) -> SampleContext<'_> {
        SampleContext::new(self.port.as_ref(), self.clock.as_ref(), &self.arbiter)
    }
}

struct DomainLoop {
    description: ConfigDescription,
    config: Arc<Mutex<Configuration>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the active configuration and sampling loop of every domain
pub struct MonitorController {
    hardware: Arc<Hardware>,
    topology: Topology,
    arch: CpuArchitecture,
    sink: Arc<dyn ResultSink>,
    period: Duration,
    loops: HashMap<MonitoringDomain, DomainLoop>,
}

impl MonitorController {
    pub fn new(
        hardware: Hardware,
        topology: Topology,
        arch: CpuArchitecture,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            hardware: Arc::new(hardware),
            topology,
            arch,
            sink,
            period: DEFAULT_PERIOD,
            loops: HashMap::new(),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn list_configurations(&self, domain: MonitoringDomain) -> Vec<ConfigDescription> {
        configs::available(self.arch, domain)
            .into_iter()
            .map(|set| set.describe())
            .collect()
    }

    /// Id of the configuration currently sampling `domain`
    pub fn active(&self, domain: MonitoringDomain) -> Option<&'static str> {
        self.loops.get(&domain).map(|active| active.description.id)
    }

    /// Program `config_id` on `domain` and start sampling it
    ///
    /// Any loop already running on the domain is cancelled, joined and
    /// released first. A configuration whose programming fails is not
    /// started and the failure is returned as `UnsupportedConfiguration`.
    /// A zero sampling period is refused before anything is touched.
    pub async fn activate(
        &mut self,
        domain: MonitoringDomain,
        config_id: &str,
    ) -> Result<ConfigDescription> {
        if self.period.is_zero() {
            return Err(PmcError::ConfigError(format!(
                "Cannot activate {domain} '{config_id}': sampling period must be non-zero"
            )));
        }

        self.deactivate(domain).await?;

        let mut config = configs::build(self.arch, domain, config_id, &self.topology)?;
        let description = config.describe();

        let hardware = Arc::clone(&self.hardware);
        let config = tokio::task::spawn_blocking(move || {
            let ctx = hardware.ctx();
            match config.initialize(ctx) {
                Ok(()) => Ok(config),
                Err(e) => {
                    if let Err(release_error) = config.release(ctx) {
                        tracing::warn!("Release after failed initialize: {}", release_error);
                    }
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| PmcError::ConfigError(format!("Initialize task failed: {e}")))?
        .map_err(|e| {
            tracing::error!("Failed to initialize {} '{}': {}", domain, config_id, e);
            PmcError::UnsupportedConfiguration {
                config: config_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        let config = Arc::new(Mutex::new(config));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            domain,
            description.clone(),
            Arc::clone(&config),
            Arc::clone(&self.hardware),
            Arc::clone(&self.sink),
            self.period,
            cancel.clone(),
        ));

        tracing::info!("Activated {} configuration '{}'", domain, description.name);
        self.loops.insert(
            domain,
            DomainLoop {
                description: description.clone(),
                config,
                cancel,
                handle,
            },
        );
        Ok(description)
    }

    /// Stop sampling `domain`; returns whether a configuration was active
    pub async fn deactivate(&mut self, domain: MonitoringDomain) -> Result<bool> {
        let Some(active) = self.loops.remove(&domain) else {
            return Ok(false);
        };

        active.cancel.cancel();
        if let Err(e) = active.handle.await {
            tracing::error!("{} sampling loop ended abnormally: {}", domain, e);
        }

        let hardware = Arc::clone(&self.hardware);
        let config = active.config;
        let released = tokio::task::spawn_blocking(move || config.lock().release(hardware.ctx()))
            .await
            .map_err(|e| PmcError::ConfigError(format!("Release task failed: {e}")))
            .and_then(|released| released);

        self.sink.domain_stopped(domain, &active.description);
        released?;

        tracing::info!(
            "Deactivated {} configuration '{}'",
            domain,
            active.description.name
        );
        Ok(true)
    }

    /// Deactivate every domain
    pub async fn shutdown(&mut self) {
        let domains: Vec<MonitoringDomain> = self.loops.keys().copied().collect();
        for domain in domains {
            if let Err(e) = self.deactivate(domain).await {
                tracing::error!("Failed to deactivate {}: {}", domain, e);
            }
        }
    }
}

async fn run_loop(
    domain: MonitoringDomain,
    description: ConfigDescription,
    config: Arc<Mutex<Configuration>>,
    hardware: Arc<Hardware>,
    sink: Arc<dyn ResultSink>,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!("Starting {} sampling loop every {:?}", domain, period);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately; the first sample is one period
    // after initialize
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let config = Arc::clone(&config);
        let hardware = Arc::clone(&hardware);
        let outcome =
            tokio::task::spawn_blocking(move || config.lock().update(hardware.ctx())).await;

        match outcome {
            Ok(Ok(results)) => sink.publish(domain, &description, &results),
            Ok(Err(e)) => {
                if e.is_transient() {
                    tracing::warn!("{} tick failed, retrying next period: {}", domain, e);
                } else {
                    tracing::error!("{} tick failed: {}", domain, e);
                }
                sink.tick_failed(domain, &description, &e);
            }
            Err(e) => {
                tracing::error!("{} sampling task panicked: {}", domain, e);
                let error = PmcError::ConfigError(format!("Sampling task failed: {e}"));
                sink.tick_failed(domain, &description, &error);
            }
        }
    }

    tracing::info!("{} sampling loop stopped", domain);
}
