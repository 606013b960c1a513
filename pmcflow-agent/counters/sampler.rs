use std::collections::BTreeMap;

use crate::common::affinity::{PinArbiter, PinGuard};
use crate::common::clock::Clock;
use crate::common::port::RegisterPort;
use crate::counters::delta::counter_delta_width;
use crate::counters::normalize::{IntervalTimer, TimerScope};
use crate::counters::state::{
    AggregateTotals, CounterLayout, CounterRegister, NormalizedCounts, RawReadings, SampleUnit,
    UnitCounterState,
};
use crate::error::Result;

/// Collaborators a sampling pass needs
#[derive(Clone, Copy)]
pub struct SampleContext<'a> {
    pub port: &'a dyn RegisterPort,
    pub clock: &'a dyn Clock,
    pub arbiter: &'a PinArbiter,
}

impl<'a> SampleContext<'a> {
    pub fn new(port: &'a dyn RegisterPort, clock: &'a dyn Clock, arbiter: &'a PinArbiter) -> Self {
        Self {
            port,
            clock,
            arbiter,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UnitSample {
    pub unit: SampleUnit,
    pub raw: RawReadings,
    pub counts: NormalizedCounts,
}

/// Result of the last successful tick of a domain
#[derive(Debug, Clone, Default)]
pub struct DomainSample {
    pub units: Vec<UnitSample>,
    pub totals: AggregateTotals,
}

/// Per-unit state and aggregation for one monitoring domain
///
/// A sampler belongs to exactly one programmed configuration. Reprogramming
/// the slots means building a new sampler or calling [`DomainSampler::reset`].
pub struct DomainSampler {
    layout: CounterLayout,
    /// Joules per energy status count
    energy_unit: f64,
    epoch_ms: i64,
    states: BTreeMap<usize, UnitCounterState>,
    shared_timer: IntervalTimer,
    sample: DomainSample,
}

impl DomainSampler {
    pub fn new(layout: CounterLayout, energy_unit: f64, now_ms: i64) -> Self {
        Self {
            layout,
            energy_unit,
            epoch_ms: now_ms,
            states: BTreeMap::new(),
            shared_timer: IntervalTimer::seeded(now_ms),
            sample: DomainSample::default(),
        }
    }

    pub fn layout(&self) -> &CounterLayout {
        &self.layout
    }

    pub fn state(&self, thread: usize) -> Option<&UnitCounterState> {
        self.states.get(&thread)
    }

    pub fn last_sample(&self) -> &DomainSample {
        &self.sample
    }

    /// Forget every unit; the next interval starts at `now_ms`
    pub fn reset(&mut self, now_ms: i64) {
        self.epoch_ms = now_ms;
        self.states.clear();
        self.shared_timer = IntervalTimer::seeded(now_ms);
        self.sample = DomainSample::default();
    }

    /// Record baselines so the first tick covers the time since priming
    pub fn prime(&mut self, ctx: SampleContext<'_>, units: &[SampleUnit]) -> Result<()> {
        let readings = self.read_units(ctx, units)?;

        for (unit, raw, at_ms) in readings {
            self.states
                .insert(unit.thread, UnitCounterState::primed(raw, at_ms));
            self.shared_timer.seed(at_ms);
        }

        tracing::debug!("Primed {} units", units.len());
        Ok(())
    }

    /// Sample every unit and rebuild the domain totals from zero
    ///
    /// Nothing is committed unless every unit was read. On error the previous
    /// readings and the previous sample stay as they were.
    pub fn sample_domain(
        &mut self,
        ctx: SampleContext<'_>,
        units: &[SampleUnit],
    ) -> Result<&DomainSample> {
        let readings = self.read_units(ctx, units)?;

        let shared_factor = match (self.layout.timing, readings.last()) {
            (TimerScope::Shared, Some(&(_, _, at_ms))) => Some(self.shared_timer.advance(at_ms)),
            _ => None,
        };

        let mut sample = DomainSample {
            units: Vec::with_capacity(readings.len()),
            totals: AggregateTotals::default(),
        };

        for (unit, raw, at_ms) in readings {
            let epoch_ms = self.epoch_ms;
            let state = self
                .states
                .entry(unit.thread)
                .or_insert_with(|| UnitCounterState::new(epoch_ms));

            let unit_factor = state.timer.advance(at_ms);
            let factor = shared_factor.unwrap_or(unit_factor);
            let counts = Self::scale(&self.layout, self.energy_unit, &state.previous, &raw, factor);
            state.previous = raw;

            sample.totals.accumulate(&unit, &counts);
            sample.units.push(UnitSample { unit, raw, counts });
        }

        self.sample = sample;
        Ok(&self.sample)
    }

    fn read_units(
        &self,
        ctx: SampleContext<'_>,
        units: &[SampleUnit],
    ) -> Result<Vec<(SampleUnit, RawReadings, i64)>> {
        units
            .iter()
            .map(|unit| {
                let raw = self.read_unit(ctx, unit.thread)?;
                Ok((*unit, raw, ctx.clock.now_millis()))
            })
            .collect()
    }

    fn read_unit(&self, ctx: SampleContext<'_>, thread: usize) -> Result<RawReadings> {
        let guard = PinGuard::acquire(ctx.arbiter, ctx.port, thread)?;
        let mut raw = RawReadings::default();

        for (counter, register) in &self.layout.fixed {
            raw.fixed[counter.index()] = guard.read(register.address)?;
        }
        for (slot, register) in self.layout.slots.iter().enumerate() {
            raw.slots[slot] = guard.read(register.address)?;
        }
        if let Some(register) = &self.layout.core_energy {
            raw.core_energy = guard.read(register.address)?;
        }
        if let Some(register) = &self.layout.package_energy {
            raw.package_energy = guard.read(register.address)?;
        }

        Ok(raw)
    }

    fn scale(
        layout: &CounterLayout,
        energy_unit: f64,
        previous: &RawReadings,
        current: &RawReadings,
        factor: f64,
    ) -> NormalizedCounts {
        let delta = |register: &CounterRegister, prev: u64, cur: u64| {
            counter_delta_width(prev, cur, register.width) as f64 * factor
        };

        let mut counts = NormalizedCounts {
            factor,
            ..NormalizedCounts::default()
        };

        for (counter, register) in &layout.fixed {
            let i = counter.index();
            counts.fixed[i] = delta(register, previous.fixed[i], current.fixed[i]);
        }
        for (i, register) in layout.slots.iter().enumerate() {
            counts.slots[i] = delta(register, previous.slots[i], current.slots[i]);
        }
        if let Some(register) = &layout.core_energy {
            counts.core_watts =
                delta(register, previous.core_energy, current.core_energy) * energy_unit;
        }
        if let Some(register) = &layout.package_energy {
            counts.package_watts =
                delta(register, previous.package_energy, current.package_energy) * energy_unit;
        }

        counts
    }
}
