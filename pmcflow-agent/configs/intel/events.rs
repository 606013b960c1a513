// Intel core event tables (architectural and Skylake-era events)

use crate::configs::events::{EventSet, EventSpec};
use crate::counters::NormalizedCounts;
use crate::metrics::derive::{per_kilo, percent, ratio};

/// Active cycles, instructions, IPC and package power
fn core_prefix(c: &NormalizedCounts) -> Vec<f64> {
    let cycles = c.active_cycles();
    let instructions = c.instructions();
    vec![
        cycles,
        instructions,
        ratio(instructions, cycles),
        c.package_watts,
    ]
}

pub static BRANCH_PREDICTION: EventSet = EventSet {
    id: "branch",
    name: "Branch Prediction",
    help: "Retired branches, mispredictions and front-end resteers. MPKI columns \
           are events per thousand retired instructions.",
    columns: &[
        "Item",
        "Active Cycles",
        "Instructions",
        "IPC",
        "Package Power (W)",
        "BPU Accuracy %",
        "Branch MPKI",
        "BAClears PKI",
        "Taken Branches %",
    ],
    events: &[
        EventSpec::new("BR_INST_RETIRED.ALL_BRANCHES", 0xC4, 0x00),
        EventSpec::new("BR_MISP_RETIRED.ALL_BRANCHES", 0xC5, 0x00),
        EventSpec::new("BACLEARS.ANY", 0xE6, 0x01),
        EventSpec::new("BR_INST_RETIRED.NEAR_TAKEN", 0xC4, 0x20),
    ],
    compute: branch_metrics,
};

fn branch_metrics(c: &NormalizedCounts) -> Vec<f64> {
    let instructions = c.instructions();
    let branches = c.slot(0);
    let mispredicted = c.slot(1);

    let mut values = core_prefix(c);
    values.extend([
        percent(branches - mispredicted, branches),
        per_kilo(mispredicted, instructions),
        per_kilo(c.slot(2), instructions),
        percent(c.slot(3), branches),
    ]);
    values
}

pub static CACHE_HIERARCHY: EventSet = EventSet {
    id: "cache",
    name: "Cache Hierarchy",
    help: "L2 and last level cache hit ratios and misses per thousand \
           instructions.",
    columns: &[
        "Item",
        "Active Cycles",
        "Instructions",
        "IPC",
        "Package Power (W)",
        "L2 Hit %",
        "L2 MPKI",
        "L3 Hit %",
        "L3 MPKI",
    ],
    events: &[
        EventSpec::new("LLCReference", 0x2E, 0x4F),
        EventSpec::new("LLCMisses", 0x2E, 0x41),
        EventSpec::new("L2RequestMisses", 0x24, 0x3F),
        EventSpec::new("L2RequestReference", 0x24, 0xFF),
    ],
    compute: cache_metrics,
};

fn cache_metrics(c: &NormalizedCounts) -> Vec<f64> {
    let instructions = c.instructions();
    let llc_ref = c.slot(0);
    let llc_miss = c.slot(1);
    let l2_miss = c.slot(2);
    let l2_ref = c.slot(3);

    let mut values = core_prefix(c);
    values.extend([
        percent(l2_ref - l2_miss, l2_ref),
        per_kilo(l2_miss, instructions),
        percent(llc_ref - llc_miss, llc_ref),
        per_kilo(llc_miss, instructions),
    ]);
    values
}
