use pmcflow_raw::arch::intel::core::{
    global_ctrl_value, msr, CorePerfEvtSel, FixedCtrCtrl, CORE_PMC_WIDTH,
};
use pmcflow_raw::arch::rapl::{intel_msr, ENERGY_STATUS_WIDTH};

use crate::configs::events::EventSet;
use crate::configs::program::{encode, for_each_unit, read_energy_unit, ProgrammedSet};
use crate::counters::{
    CounterLayout, CounterRegister, FixedCounter, SampleContext, SampleUnit, TimerScope,
};
use crate::error::Result;
use crate::metrics::UpdateResults;

/// Intel core PMU: four programmable slots, three fixed counters and package
/// energy
pub struct IntelCoreConfig {
    programmed: ProgrammedSet,
}

impl IntelCoreConfig {
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
            .with_fixed(
                FixedCounter::Tsc,
                CounterRegister::new("TSC", msr::IA32_TIME_STAMP_COUNTER, 64),
            )
            .with_fixed(
                FixedCounter::Instructions,
                CounterRegister::new("Instructions", msr::IA32_FIXED_CTR0, CORE_PMC_WIDTH),
            )
            .with_fixed(
                FixedCounter::ActualCycles,
                CounterRegister::new("Core Cycles", msr::IA32_FIXED_CTR1, CORE_PMC_WIDTH),
            )
            .with_fixed(
                FixedCounter::ReferenceCycles,
                CounterRegister::new("Reference Cycles", msr::IA32_FIXED_CTR2, CORE_PMC_WIDTH),
            )
            .with_slots(
                set.events
                    .iter()
                    .zip(msr::IA32_PMC)
                    .map(|(event, address)| CounterRegister::new(event.name, address, CORE_PMC_WIDTH)),
            )
            .with_package_energy(CounterRegister::new(
                "Package Power (W)",
                intel_msr::MSR_PKG_ENERGY_STATUS,
                ENERGY_STATUS_WIDTH,
            ))
    }

    pub fn initialize(&mut self, ctx: SampleContext<'_>) -> Result<()> {
        let set = self.programmed.set();
        let selects = set
            .events
            .iter()
            .map(|event| {
                encode(
                    set.id,
                    CorePerfEvtSel::counting((event.event & 0xFF) as u8, event.umask),
                )
            })
            .collect::<Result<Vec<u64>>>()?;
        let fixed_ctrl = encode(set.id, FixedCtrCtrl::all_rings())?;

        for_each_unit(ctx, self.programmed.units(), |guard| {
            guard.write(msr::IA32_PERF_GLOBAL_CTRL, 0)?;
            guard.write(msr::IA32_FIXED_CTR_CTRL, fixed_ctrl)?;

            for (slot, &evtsel) in msr::IA32_PERFEVTSEL.iter().enumerate() {
                guard.write(evtsel, selects.get(slot).copied().unwrap_or(0))?;
            }
            for &ctr in msr::IA32_PMC
                .iter()
                .chain(&[msr::IA32_FIXED_CTR0, msr::IA32_FIXED_CTR1, msr::IA32_FIXED_CTR2])
            {
                guard.write(ctr, 0)?;
            }

            guard.write(
                msr::IA32_PERF_GLOBAL_CTRL,
                global_ctrl_value(selects.len()),
            )
        })?;

        let energy_unit = match self.programmed.units().first() {
            Some(unit) => read_energy_unit(ctx, unit.thread, intel_msr::MSR_RAPL_POWER_UNIT)?,
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
            guard.write(msr::IA32_PERF_GLOBAL_CTRL, 0)?;
            for &evtsel in &msr::IA32_PERFEVTSEL {
                guard.write(evtsel, 0)?;
            }
            Ok(())
        })
    }
}
