use pmcflow_raw::arch::amd::core::{
    msr, PerfCtl, CORE_PMC_WIDTH, HWCR_IRPERF_EN, IRPERF_WIDTH,
};
use pmcflow_raw::arch::rapl::{amd_msr, ENERGY_STATUS_WIDTH};

use crate::configs::events::EventSet;
use crate::configs::program::{encode, for_each_unit, read_energy_unit, ProgrammedSet};
use crate::counters::{
    CounterLayout, CounterRegister, FixedCounter, SampleContext, SampleUnit, TimerScope,
};
use crate::error::Result;
use crate::metrics::UpdateResults;

/// Zen core PMU: six programmable slots per hardware thread plus the
/// architectural clocks, retired instructions and core/package energy
pub struct ZenCoreConfig {
    programmed: ProgrammedSet,
}

impl ZenCoreConfig {
    pub fn new(set: &'static EventSet, units: Vec<SampleUnit>) -> Self {
        let labels = units
            .iter()
            .map(|unit| format!("Thread {}", unit.thread))
            .collect();
        Self {
            programmed: ProgrammedSet::new(set, units, labels),
        }
    }

    pub fn set(&self) -> &'static EventSet {
        self.programmed.set()
    }

    pub fn layout(set: &EventSet) -> CounterLayout {
        CounterLayout::new(TimerScope::PerUnit)
            .with_fixed(FixedCounter::Tsc, CounterRegister::new("TSC", msr::TSC, 64))
            .with_fixed(
                FixedCounter::ActualCycles,
                CounterRegister::new("APERF", msr::APERF_RO, 64),
            )
            .with_fixed(
                FixedCounter::ReferenceCycles,
                CounterRegister::new("MPERF", msr::MPERF_RO, 64),
            )
            .with_fixed(
                FixedCounter::Instructions,
                CounterRegister::new("Instructions", msr::IRPERF_COUNT, IRPERF_WIDTH),
            )
            .with_slots(
                set.events
                    .iter()
                    .zip(msr::PERF_CTR)
                    .map(|(event, address)| CounterRegister::new(event.name, address, CORE_PMC_WIDTH)),
            )
            .with_core_energy(CounterRegister::new(
                "Core Power (W)",
                amd_msr::CORE_ENERGY_STAT,
                ENERGY_STATUS_WIDTH,
            ))
            .with_package_energy(CounterRegister::new(
                "Package Power (W)",
                amd_msr::PKG_ENERGY_STAT,
                ENERGY_STATUS_WIDTH,
            ))
    }

    pub fn initialize(&mut self, ctx: SampleContext<'_>) -> Result<()> {
        let set = self.programmed.set();
        let selects = set
            .events
            .iter()
            .map(|event| encode(set.id, PerfCtl::counting(event.event, event.umask)))
            .collect::<Result<Vec<u64>>>()?;

        for_each_unit(ctx, self.programmed.units(), |guard| {
            let hwcr = guard.read(msr::HWCR)?;
            if hwcr & HWCR_IRPERF_EN == 0 {
                guard.write(msr::HWCR, hwcr | HWCR_IRPERF_EN)?;
            }

            for (slot, (&ctl, &ctr)) in msr::PERF_CTL.iter().zip(&msr::PERF_CTR).enumerate() {
                guard.write(ctl, selects.get(slot).copied().unwrap_or(0))?;
                guard.write(ctr, 0)?;
            }
            Ok(())
        })?;

        let energy_unit = match self.programmed.units().first() {
            Some(unit) => read_energy_unit(ctx, unit.thread, amd_msr::RAPL_PWR_UNIT)?,
            None => 1.0,
        };

        self.programmed.start(ctx, Self::layout(set), energy_unit)
    }

    pub fn update(&mut self, ctx: SampleContext<'_>) -> Result<UpdateResults> {
        self.programmed.update(ctx)
    }

    pub fn release(&mut self, ctx: SampleContext<'_>) -> Result<()> {
        self.programmed.stop();
        for_each_unit(ctx, self.programmed.units(), |guard| {
            for &ctl in &msr::PERF_CTL {
                guard.write(ctl, 0)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::affinity::PinArbiter;
    use crate::configs::zen::events::BRANCH_PREDICTION;
    use crate::error::PmcError;
    use crate::testing::{FakePort, ManualClock};
    use pmcflow_raw::RegisterLayout;

    #[test]
    fn test_initialize_programs_every_unit() {
        let port = FakePort::new();
        let clock = ManualClock::new(0);
        let arbiter = PinArbiter::new();
        let ctx = SampleContext::new(&port, &clock, &arbiter);

        let units = vec![SampleUnit::new(0, true, true), SampleUnit::new(1, false, false)];
        let mut config = ZenCoreConfig::new(&BRANCH_PREDICTION, units);
        config.initialize(ctx).unwrap();

        for thread in [0, 1] {
            assert_ne!(port.get(thread, msr::HWCR) & HWCR_IRPERF_EN, 0);
            let ctl = PerfCtl::from_msr_value(port.get(thread, msr::PERF_CTL[1]));
            assert_eq!(ctl, PerfCtl::counting(0xC3, 0x00));
            assert_eq!(port.writes_to(thread, msr::PERF_CTR[1]), vec![0]);
        }
        assert!(port.pinned().is_none());
    }

    #[test]
    fn test_update_before_initialize_is_mismatch() {
        let port = FakePort::new();
        let clock = ManualClock::new(0);
        let arbiter = PinArbiter::new();
        let ctx = SampleContext::new(&port, &clock, &arbiter);

        let mut config = ZenCoreConfig::new(&BRANCH_PREDICTION, vec![SampleUnit::representative(0)]);
        assert!(matches!(
            config.update(ctx),
            Err(PmcError::ConfigurationMismatch(_))
        ));
    }

    #[test]
    fn test_update_reports_rows_in_column_order() {
        let port = FakePort::new();
        let clock = ManualClock::new(0);
        let arbiter = PinArbiter::new();
        let ctx = SampleContext::new(&port, &clock, &arbiter);

        let units = vec![SampleUnit::new(0, true, true), SampleUnit::new(1, false, false)];
        let mut config = ZenCoreConfig::new(&BRANCH_PREDICTION, units);
        config.initialize(ctx).unwrap();

        for thread in [0, 1] {
            port.set(thread, msr::APERF_RO, 1_000_000);
            port.set(thread, msr::IRPERF_COUNT, 2_000_000);
            port.set(thread, msr::PERF_CTR[0], 10_000);
            port.set(thread, msr::PERF_CTR[1], 100);
        }
        clock.advance(1000);
        let results = config.update(ctx).unwrap();

        assert_eq!(results.unit_rows.len(), 2);
        assert_eq!(results.unit_rows[0].label, "Thread 0");
        assert_eq!(results.unit_rows[1].values.len(), BRANCH_PREDICTION.metric_count());
        assert_eq!(results.unit_rows[0].values[2], 2.0);
        assert_eq!(results.overall.label, "Overall");
        assert_eq!(results.overall.values[1], 4_000_000.0);

        let branches = results
            .raw_counters
            .iter()
            .find(|raw| raw.name == "Retired Branches")
            .unwrap();
        assert_eq!(branches.value, 20_000.0);
    }

    #[test]
    fn test_switch_starts_from_a_reset_baseline() {
        use crate::configs::zen::events::OP_CACHE;

        let port = FakePort::new();
        let clock = ManualClock::new(0);
        let arbiter = PinArbiter::new();
        let ctx = SampleContext::new(&port, &clock, &arbiter);

        let mut first = ZenCoreConfig::new(&BRANCH_PREDICTION, vec![SampleUnit::representative(0)]);
        first.initialize(ctx).unwrap();
        port.set(0, msr::PERF_CTR[0], 5_000_000);
        clock.advance(1000);
        first.update(ctx).unwrap();
        first.release(ctx).unwrap();

        let mut second = ZenCoreConfig::new(&OP_CACHE, vec![SampleUnit::representative(0)]);
        second.initialize(ctx).unwrap();
        assert_eq!(port.get(0, msr::PERF_CTR[0]), 0);

        port.set(0, msr::PERF_CTR[0], 300);
        clock.advance(1000);
        let results = second.update(ctx).unwrap();

        let decoded = results
            .raw_counters
            .iter()
            .find(|raw| raw.name == "Ops From Decoder")
            .unwrap();
        assert_eq!(decoded.value, 300.0);
    }

    #[test]
    fn test_release_disables_event_selects() {
        let port = FakePort::new();
        let clock = ManualClock::new(0);
        let arbiter = PinArbiter::new();
        let ctx = SampleContext::new(&port, &clock, &arbiter);

        let mut config = ZenCoreConfig::new(&BRANCH_PREDICTION, vec![SampleUnit::representative(2)]);
        config.initialize(ctx).unwrap();
        config.release(ctx).unwrap();

        for ctl in msr::PERF_CTL {
            assert_eq!(port.get(2, ctl), 0);
        }
        assert!(config.update(ctx).is_err());
    }
}
