use pmcflow_raw::arch::amd::l3::{msr, L3PerfCtl, L3PerfCtlZen2, L3_PMC_WIDTH};

use crate::configs::events::{EventSet, EventSpec};
use crate::configs::program::{encode, for_each_unit, ProgrammedSet};
use crate::counters::{CounterLayout, CounterRegister, SampleContext, SampleUnit, TimerScope};
use crate::error::Result;
use crate::metrics::UpdateResults;

/// Which generation of the L3 event select layout to program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L3Encoding {
    /// Slice and thread masks (Zen 2)
    SliceMask,
    /// Core, slice and thread selection fields (Zen 3 and later)
    CoreSelect,
}

/// Per-complex L3 counters, read from one thread of each complex
pub struct ZenL3Config {
    programmed: ProgrammedSet,
    encoding: L3Encoding,
}

impl ZenL3Config {
    pub fn new(set: &'static EventSet, encoding: L3Encoding, units: Vec<SampleUnit>) -> Self {
        let labels = units
            .iter()
            .enumerate()
            .map(|(i, unit)| format!("CCX {} (thread {})", i, unit.thread))
            .collect();
        Self {
            programmed: ProgrammedSet::new(set, units, labels),
            encoding,
        }
    }

    pub fn set(&self) -> &'static EventSet {
        self.programmed.set()
    }

    fn select(&self, id: &str, event: &EventSpec) -> Result<u64> {
        let number = (event.event & 0xFF) as u8;
        match self.encoding {
            L3Encoding::SliceMask => encode(id, L3PerfCtlZen2::all_slices(number, event.umask)),
            L3Encoding::CoreSelect => encode(id, L3PerfCtl::all_slices(number, event.umask)),
        }
    }

    pub fn layout(set: &EventSet) -> CounterLayout {
        CounterLayout::new(TimerScope::PerUnit).with_slots(
            set.events
                .iter()
                .zip(msr::L3_PERF_CTR)
                .map(|(event, address)| CounterRegister::new(event.name, address, L3_PMC_WIDTH)),
        )
    }

    pub fn initialize(&mut self, ctx: SampleContext<'_>) -> Result<()> {
        let set = self.programmed.set();
        let selects = set
            .events
            .iter()
            .map(|event| self.select(set.id, event))
            .collect::<Result<Vec<u64>>>()?;

        for_each_unit(ctx, self.programmed.units(), |guard| {
            for (slot, (&ctl, &ctr)) in msr::L3_PERF_CTL.iter().zip(&msr::L3_PERF_CTR).enumerate() {
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
            for &ctl in &msr::L3_PERF_CTL {
                guard.write(ctl, 0)?;
            }
            Ok(())
        })
    }
}
