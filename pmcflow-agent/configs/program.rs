use pmcflow_raw::arch::rapl::RaplPowerUnit;
use pmcflow_raw::RegisterLayout;

use crate::common::affinity::PinGuard;
use crate::configs::events::EventSet;
use crate::counters::{CounterLayout, DomainSampler, NormalizedCounts, SampleContext, SampleUnit};
use crate::error::{PmcError, Result};
use crate::metrics::{MetricRow, RawCounterValue, UpdateResults};

/// Label of the aggregate row
pub const OVERALL_LABEL: &str = "Overall";

/// An event set bound to the units of a domain
///
/// Holds a sampler only between `start` and `stop`, so state from an earlier
/// programming can never leak into a later one.
pub struct ProgrammedSet {
    set: &'static EventSet,
    units: Vec<SampleUnit>,
    labels: Vec<String>,
    sampler: Option<DomainSampler>,
}

impl ProgrammedSet {
    pub fn new(set: &'static EventSet, units: Vec<SampleUnit>, labels: Vec<String>) -> Self {
        Self {
            set,
            units,
            labels,
            sampler: None,
        }
    }

    pub fn set(&self) -> &'static EventSet {
        self.set
    }

    pub fn units(&self) -> &[SampleUnit] {
        &self.units
    }

    pub fn is_started(&self) -> bool {
        self.sampler.is_some()
    }

    /// Fresh sampler primed at the current time
    pub fn start(
        &mut self,
        ctx: SampleContext<'_>,
        layout: CounterLayout,
        energy_unit: f64,
    ) -> Result<()> {
        let mut sampler = DomainSampler::new(layout, energy_unit, ctx.clock.now_millis());
        sampler.prime(ctx, &self.units)?;
        self.sampler = Some(sampler);

        tracing::info!(
            "Started '{}' on {} units",
            self.set.name,
            self.units.len()
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        self.sampler = None;
    }

    pub fn update(&mut self, ctx: SampleContext<'_>) -> Result<UpdateResults> {
        let set = self.set;
        let sampler = self.sampler.as_mut().ok_or_else(|| {
            PmcError::ConfigurationMismatch(format!("'{}' updated before initialize", set.id))
        })?;

        let sample = sampler.sample_domain(ctx, &self.units)?.clone();

        let unit_rows = sample
            .units
            .iter()
            .zip(&self.labels)
            .map(|(unit, label)| MetricRow::new(label.clone(), (set.compute)(&unit.counts)))
            .collect();

        let totals = &sample.totals.counts;
        Ok(UpdateResults {
            unit_rows,
            overall: MetricRow::new(OVERALL_LABEL, (set.compute)(totals)),
            raw_counters: raw_counters(sampler.layout(), totals),
        })
    }
}

/// Aggregate normalized value of every tracked register, named after it
fn raw_counters(layout: &CounterLayout, totals: &NormalizedCounts) -> Vec<RawCounterValue> {
    let value = |name: &str, value: f64| RawCounterValue {
        name: name.to_string(),
        value,
    };

    let mut raw: Vec<RawCounterValue> = layout
        .fixed
        .iter()
        .map(|(counter, register)| value(register.name, totals.fixed(*counter)))
        .collect();
    raw.extend(
        layout
            .slots
            .iter()
            .enumerate()
            .map(|(i, register)| value(register.name, totals.slot(i))),
    );
    if let Some(register) = &layout.core_energy {
        raw.push(value(register.name, totals.core_watts));
    }
    if let Some(register) = &layout.package_energy {
        raw.push(value(register.name, totals.package_watts));
    }
    raw
}

/// Run `program` once per unit while pinned to it
pub fn for_each_unit(
    ctx: SampleContext<'_>,
    units: &[SampleUnit],
    mut program: impl FnMut(&PinGuard<'_>) -> Result<()>,
) -> Result<()> {
    for unit in units {
        let guard = PinGuard::acquire(ctx.arbiter, ctx.port, unit.thread)?;
        program(&guard)?;
    }
    Ok(())
}

/// Joules per energy status count, read from a RAPL power unit register
pub fn read_energy_unit(ctx: SampleContext<'_>, thread: usize, address: u64) -> Result<f64> {
    let guard = PinGuard::acquire(ctx.arbiter, ctx.port, thread)?;
    let unit = RaplPowerUnit::from_msr_value(guard.read(address)?);
    tracing::debug!(
        "Energy unit on thread {}: {} J",
        thread,
        unit.energy_unit_multiplier()
    );
    Ok(unit.energy_unit_multiplier())
}

/// Check a typed encoding and return its raw value
pub fn encode<T: RegisterLayout>(config: &str, layout: T) -> Result<u64> {
    layout
        .validate()
        .map_err(|reason| PmcError::UnsupportedConfiguration {
            config: config.to_string(),
            reason: reason.to_string(),
        })?;
    Ok(layout.to_msr_value())
}
