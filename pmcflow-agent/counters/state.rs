use crate::counters::normalize::{IntervalTimer, TimerScope};

/// Programmable counter slots tracked per unit
pub const MAX_SLOTS: usize = 6;

crate::metric_enum! {
    /// Free-running counters tracked next to the programmable slots
    pub enum FixedCounter {
        Tsc => "TSC",
        ActualCycles => "APERF",
        ReferenceCycles => "MPERF",
        Instructions => "Instructions",
    }
}

impl FixedCounter {
    pub const COUNT: usize = 4;

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One tracked register and the number of valid bits it counts with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRegister {
    pub name: &'static str,
    pub address: u64,
    pub width: u32,
}

impl CounterRegister {
    pub const fn new(name: &'static str, address: u64, width: u32) -> Self {
        Self {
            name,
            address,
            width,
        }
    }
}

/// Registers a domain reads from every unit on every tick
#[derive(Debug, Clone)]
pub struct CounterLayout {
    pub fixed: Vec<(FixedCounter, CounterRegister)>,
    pub slots: Vec<CounterRegister>,
    pub core_energy: Option<CounterRegister>,
    pub package_energy: Option<CounterRegister>,
    pub timing: TimerScope,
}

impl CounterLayout {
    pub fn new(timing: TimerScope) -> Self {
        Self {
            fixed: Vec::new(),
            slots: Vec::new(),
            core_energy: None,
            package_energy: None,
            timing,
        }
    }

    pub fn with_fixed(mut self, counter: FixedCounter, register: CounterRegister) -> Self {
        self.fixed.push((counter, register));
        self
    }

    /// Slots beyond [`MAX_SLOTS`] are dropped with a warning
    pub fn with_slots(mut self, slots: impl IntoIterator<Item = CounterRegister>) -> Self {
        self.slots.extend(slots);
        if self.slots.len() > MAX_SLOTS {
            let dropped: Vec<&str> = self.slots[MAX_SLOTS..].iter().map(|r| r.name).collect();
            tracing::warn!(
                "Layout holds {} slots, dropping {:?}; their metrics will read 0",
                MAX_SLOTS,
                dropped
            );
            self.slots.truncate(MAX_SLOTS);
        }
        self
    }

    pub fn with_core_energy(mut self, register: CounterRegister) -> Self {
        self.core_energy = Some(register);
        self
    }

    pub fn with_package_energy(mut self, register: CounterRegister) -> Self {
        self.package_energy = Some(register);
        self
    }

    /// Every register in read order
    pub fn registers(&self) -> impl Iterator<Item = &CounterRegister> {
        self.fixed
            .iter()
            .map(|(_, register)| register)
            .chain(self.slots.iter())
            .chain(self.core_energy.iter())
            .chain(self.package_energy.iter())
    }
}

/// One reading of every register in a [`CounterLayout`]
///
/// Registers the layout does not track stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawReadings {
    pub fixed: [u64; FixedCounter::COUNT],
    pub slots: [u64; MAX_SLOTS],
    pub core_energy: u64,
    pub package_energy: u64,
}

impl RawReadings {
    pub fn fixed(&self, counter: FixedCounter) -> u64 {
        self.fixed[counter.index()]
    }
}

/// Previous readings and last sample time of one unit
///
/// Owned by the sampler of a single domain and replaced wholesale whenever
/// that domain is reprogrammed.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitCounterState {
    pub previous: RawReadings,
    pub timer: IntervalTimer,
}

impl UnitCounterState {
    /// Zero baseline whose first interval starts at `epoch_ms`
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            previous: RawReadings::default(),
            timer: IntervalTimer::seeded(epoch_ms),
        }
    }

    pub fn primed(readings: RawReadings, now_ms: i64) -> Self {
        Self {
            previous: readings,
            timer: IntervalTimer::seeded(now_ms),
        }
    }
}

/// Deltas of one unit for one tick, scaled to the reporting interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedCounts {
    /// Factor applied to every raw delta
    pub factor: f64,
    pub fixed: [f64; FixedCounter::COUNT],
    pub slots: [f64; MAX_SLOTS],
    pub core_watts: f64,
    pub package_watts: f64,
}

impl Default for NormalizedCounts {
    fn default() -> Self {
        Self {
            factor: 1.0,
            fixed: [0.0; FixedCounter::COUNT],
            slots: [0.0; MAX_SLOTS],
            core_watts: 0.0,
            package_watts: 0.0,
        }
    }
}

impl NormalizedCounts {
    pub fn fixed(&self, counter: FixedCounter) -> f64 {
        self.fixed[counter.index()]
    }

    /// Normalized count of a programmable slot; 0.0 past the last slot
    pub fn slot(&self, index: usize) -> f64 {
        self.slots.get(index).copied().unwrap_or(0.0)
    }

    pub fn instructions(&self) -> f64 {
        self.fixed(FixedCounter::Instructions)
    }

    pub fn active_cycles(&self) -> f64 {
        self.fixed(FixedCounter::ActualCycles)
    }
}

/// The unit being sampled and the shared hardware it reads for its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleUnit {
    pub thread: usize,
    /// Counts per-core shared counters (core energy) for its physical core
    pub core_representative: bool,
    /// Counts per-package shared counters (package energy) for its package
    pub package_representative: bool,
}

impl SampleUnit {
    pub fn new(thread: usize, core_representative: bool, package_representative: bool) -> Self {
        Self {
            thread,
            core_representative,
            package_representative,
        }
    }

    /// A thread standing in for a whole shared domain
    pub fn representative(thread: usize) -> Self {
        Self::new(thread, true, true)
    }
}

/// Sum of the normalized counts of one domain for one tick
///
/// Shared counters are added only from their designated representative.
/// `counts.factor` is meaningless on a total and stays 1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateTotals {
    pub counts: NormalizedCounts,
    pub units: usize,
}

impl AggregateTotals {
    pub fn accumulate(&mut self, unit: &SampleUnit, counts: &NormalizedCounts) {
        for (total, value) in self.counts.fixed.iter_mut().zip(counts.fixed) {
            *total += value;
        }
        for (total, value) in self.counts.slots.iter_mut().zip(counts.slots) {
            *total += value;
        }
        if unit.core_representative {
            self.counts.core_watts += counts.core_watts;
        }
        if unit.package_representative {
            self.counts.package_watts += counts.package_watts;
        }
        self.units += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(instructions: f64, slot0: f64, core_watts: f64, package_watts: f64) -> NormalizedCounts {
        let mut counts = NormalizedCounts::default();
        counts.fixed[FixedCounter::Instructions.index()] = instructions;
        counts.slots[0] = slot0;
        counts.core_watts = core_watts;
        counts.package_watts = package_watts;
        counts
    }

    #[test]
    fn test_totals_are_additive_without_dedup() {
        let units = [
            SampleUnit::representative(0),
            SampleUnit::representative(1),
            SampleUnit::representative(2),
        ];
        let per_unit = [
            counts(100.0, 1.5, 2.0, 0.0),
            counts(250.0, 2.5, 3.0, 0.0),
            counts(50.0, 0.25, 0.5, 0.0),
        ];

        let mut totals = AggregateTotals::default();
        for (unit, c) in units.iter().zip(per_unit.iter()) {
            totals.accumulate(unit, c);
        }

        assert_eq!(totals.units, 3);
        assert_eq!(totals.counts.instructions(), 400.0);
        assert_eq!(totals.counts.slot(0), 4.25);
        assert_eq!(totals.counts.core_watts, 5.5);
    }

    #[test]
    fn test_shared_power_counted_once_per_core_and_package() {
        let primary = SampleUnit::new(0, true, true);
        let sibling = SampleUnit::new(8, false, false);
        let shared = counts(10.0, 0.0, 4.0, 40.0);

        let mut totals = AggregateTotals::default();
        totals.accumulate(&primary, &shared);
        totals.accumulate(&sibling, &shared);

        assert_eq!(totals.counts.instructions(), 20.0);
        assert_eq!(totals.counts.core_watts, 4.0);
        assert_eq!(totals.counts.package_watts, 40.0);
    }

    #[test]
    fn test_layout_register_order_and_slot_cap() {
        let pmc = CounterRegister::new("pmc", 0x100, 48);
        let layout = CounterLayout::new(TimerScope::PerUnit)
            .with_fixed(FixedCounter::Tsc, CounterRegister::new("TSC", 0x10, 64))
            .with_slots(std::iter::repeat(pmc).take(8))
            .with_package_energy(CounterRegister::new("pkg", 0x611, 32));

        assert_eq!(layout.slots.len(), MAX_SLOTS);
        let addresses: Vec<u64> = layout.registers().map(|r| r.address).collect();
        assert_eq!(addresses.first(), Some(&0x10));
        assert_eq!(addresses.last(), Some(&0x611));
        assert_eq!(addresses.len(), 1 + MAX_SLOTS + 1);
    }

    #[test]
    fn test_slot_past_end_reads_zero() {
        assert_eq!(NormalizedCounts::default().slot(MAX_SLOTS + 3), 0.0);
    }
}
