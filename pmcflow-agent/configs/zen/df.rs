use pmcflow_raw::arch::amd::df::{msr, DfPerfCtl, DF_PMC_WIDTH};

use crate::configs::events::EventSet;
use crate::configs::program::{encode, for_each_unit, ProgrammedSet};
use crate::counters::{CounterLayout, CounterRegister, SampleContext, SampleUnit, TimerScope};
use crate::error::Result;
use crate::metrics::UpdateResults;

/// Data Fabric counters, one representative thread per package
///
/// The fabric counts for the whole package, so every unit shares one
/// interval timer.
pub struct ZenDataFabricConfig {
    programmed: ProgrammedSet,
}

impl ZenDataFabricConfig {
    /// `units` pairs each package id with its representative unit
    pub fn new(set: &'static EventSet, units: Vec<(usize, SampleUnit)>) -> Self {
        let labels = units
            .iter()
            .map(|(package, _)| format!("Package {package}"))
            .collect();
        let units = units.into_iter().map(|(_, unit)| unit).collect();
        Self {
            programmed: ProgrammedSet::new(set, units, labels),
        }
    }

    pub fn set(&self) -> &'static EventSet {
        self.programmed.set()
    }

    pub fn layout(set: &EventSet) -> CounterLayout {
        CounterLayout::new(TimerScope::Shared).with_slots(
            set.events
                .iter()
                .zip(msr::DF_PERF_CTR)
                .map(|(event, address)| CounterRegister::new(event.name, address, DF_PMC_WIDTH)),
        )
    }

    pub fn initialize(&mut self, ctx: SampleContext<'_>) -> Result<()> {
        let set = self.programmed.set();
        let selects = set
            .events
            .iter()
            .map(|event| encode(set.id, DfPerfCtl::counting(event.event, event.umask)))
            .collect::<Result<Vec<u64>>>()?;

        for_each_unit(ctx, self.programmed.units(), |guard| {
            for (slot, (&ctl, &ctr)) in msr::DF_PERF_CTL.iter().zip(&msr::DF_PERF_CTR).enumerate() {
                guard.write(ctl, selects.get(slot).copied().unwrap_or(0))?;
                guard.write(ctr, 0)?;
            }
            Ok(())
        })?;

        self.programmed.start(ctx, Self::layout(set), 1.0)
    }

    pub fn update(&mut self, ctx: SampleContext<'_>) -> Result<UpdateResults> {
        self.programmed.update(ctx)
    }

    pub fn release(&mut self, ctx: SampleContext<'_>) -> Result<()> {
        self.programmed.stop();
        for_each_unit(ctx, self.programmed.units(), |guard| {
            for &ctl in &msr::DF_PERF_CTL {
                guard.write(ctl, 0)?;
            }
            Ok(())
        })
    }
}
