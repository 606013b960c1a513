// Zen event tables
//
// Event numbers and unit masks follow the AMD Processor Programming Reference
// for families 17h-1Ah.

use crate::configs::events::{EventSet, EventSpec};
use crate::counters::NormalizedCounts;
use crate::metrics::derive::{bandwidth_gbps, per_kilo, percent, ratio};

/// Active cycles, instructions, IPC and core power
fn core_prefix(c: &NormalizedCounts) -> Vec<f64> {
    let cycles = c.active_cycles();
    let instructions = c.instructions();
    vec![cycles, instructions, ratio(instructions, cycles), c.core_watts]
}

macro_rules! core_columns {
    ($($column:literal),* $(,)?) => {
        &[
            "Item",
            "Active Cycles",
            "Instructions",
            "IPC",
            "Power (W)",
            $($column,)*
        ]
    };
}

// Core

pub static BRANCH_PREDICTION: EventSet = EventSet {
    id: "branch",
    name: "Branch Prediction",
    help: "Retired branch mix and predictor behaviour. MPKI columns are events per \
           thousand retired instructions.",
    columns: core_columns!(
        "BPU Accuracy %",
        "Branch MPKI",
        "L2 BTB Overrides PKI",
        "Indirect Predictions PKI",
        "Taken Branches %",
        "Decoder Overrides PKI",
    ),
    events: &[
        EventSpec::new("Retired Branches", 0xC2, 0x00),
        EventSpec::new("Retired Mispredicted Branches", 0xC3, 0x00),
        EventSpec::new("L2 BTB Corrections", 0x8B, 0x00),
        EventSpec::new("Dynamic Indirect Predictions", 0x8E, 0x00),
        EventSpec::new("Retired Taken Branches", 0xC4, 0x00),
        EventSpec::new("Decoder Redirects", 0x91, 0x00),
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
        per_kilo(c.slot(3), instructions),
        percent(c.slot(4), branches),
        per_kilo(c.slot(5), instructions),
    ]);
    values
}

pub static OP_CACHE: EventSet = EventSet {
    id: "opcache",
    name: "Op Cache and Instruction Fetch",
    help: "Share of dispatched ops served by the op cache and the hit rate of \
           32-byte instruction cache fetches.",
    columns: core_columns!(
        "Op Cache Hit %",
        "Op Cache Ops",
        "IC Hit %",
        "IC MPKI",
        "Ops per Instruction",
    ),
    events: &[
        EventSpec::new("Ops From Decoder", 0xAA, 0x01),
        EventSpec::new("Ops From Op Cache", 0xAA, 0x02),
        EventSpec::new("IC 32B Fetches", 0x80, 0x00),
        EventSpec::new("IC 32B Fetch Misses", 0x81, 0x00),
        EventSpec::new("Retired Ops", 0xC1, 0x00),
    ],
    compute: op_cache_metrics,
};

fn op_cache_metrics(c: &NormalizedCounts) -> Vec<f64> {
    let decoder = c.slot(0);
    let op_cache = c.slot(1);
    let fetches = c.slot(2);
    let misses = c.slot(3);

    let mut values = core_prefix(c);
    values.extend([
        percent(op_cache, op_cache + decoder),
        op_cache,
        percent(fetches - misses, fetches),
        per_kilo(misses, c.instructions()),
        ratio(c.slot(4), c.instructions()),
    ]);
    values
}

pub static DISPATCH_STALLS: EventSet = EventSet {
    id: "dispatch",
    name: "Dispatch Stalls",
    help: "Cycles dispatch stalled on a full back-end resource, as a share of \
           active cycles.",
    columns: core_columns!(
        "Int Register File %",
        "Load Queue %",
        "Store Queue %",
        "Int Scheduler %",
        "Taken Branch Buffer %",
        "Retire Tokens %",
    ),
    events: &[
        EventSpec::new("Int Register File Stall Cycles", 0xAE, 0x01),
        EventSpec::new("Load Queue Stall Cycles", 0xAE, 0x02),
        EventSpec::new("Store Queue Stall Cycles", 0xAE, 0x04),
        EventSpec::new("Int Scheduler Stall Cycles", 0xAE, 0x08),
        EventSpec::new("Taken Branch Buffer Stall Cycles", 0xAE, 0x10),
        EventSpec::new("Retire Token Stall Cycles", 0xAF, 0x20),
    ],
    compute: dispatch_stall_metrics,
};

fn dispatch_stall_metrics(c: &NormalizedCounts) -> Vec<f64> {
    let cycles = c.active_cycles();
    let mut values = core_prefix(c);
    values.extend((0..6).map(|slot| percent(c.slot(slot), cycles)));
    values
}

// L3

/// Zen 2 and Zen 3: fill latency is reported in units of 16 cycles
pub static L3_HIT_RATE_ZEN2: EventSet = EventSet {
    id: "l3-hitrate",
    name: "L3 Hit Rate and Latency",
    help: "L3 accesses and misses across every slice of each complex, with the \
           average latency of requests that missed.",
    columns: &[
        "Item",
        "Hit Rate %",
        "Hit BW (GB/s)",
        "Miss Latency (clk)",
    ],
    events: &[
        EventSpec::new("L3 Accesses", 0x04, 0xFF),
        EventSpec::new("L3 Misses", 0x04, 0x01),
        EventSpec::new("L3 Fill Latency / 16", 0x90, 0x00),
        EventSpec::new("L3 Miss Requests", 0x9A, 0x1F),
    ],
    compute: l3_zen2_metrics,
};

fn l3_zen2_metrics(c: &NormalizedCounts) -> Vec<f64> {
    let accesses = c.slot(0);
    let misses = c.slot(1);
    vec![
        percent(accesses - misses, accesses),
        bandwidth_gbps(accesses - misses),
        ratio(c.slot(2) * 16.0, c.slot(3)),
    ]
}

/// Zen 4 and Zen 5: sampled latency is reported in units of 10 ns
pub static L3_HIT_RATE_ZEN4: EventSet = EventSet {
    id: "l3-hitrate",
    name: "L3 Hit Rate and Latency",
    help: "L3 accesses and misses across every slice of each complex, with the \
           average sampled latency of demand misses.",
    columns: &["Item", "Hit Rate %", "Hit BW (GB/s)", "Miss Latency (ns)"],
    events: &[
        EventSpec::new("L3 Accesses", 0x04, 0xFF),
        EventSpec::new("L3 Misses", 0x04, 0x01),
        EventSpec::new("L3 Sampled Latency / 10ns", 0xAC, 0x3F),
        EventSpec::new("L3 Sampled Requests", 0xAD, 0x3F),
    ],
    compute: l3_zen4_metrics,
};

fn l3_zen4_metrics(c: &NormalizedCounts) -> Vec<f64> {
    let accesses = c.slot(0);
    let misses = c.slot(1);
    vec![
        percent(accesses - misses, accesses),
        bandwidth_gbps(accesses - misses),
        ratio(c.slot(2) * 10.0, c.slot(3)),
    ]
}

// Data Fabric

pub static DRAM_BANDWIDTH: EventSet = EventSet {
    id: "dram-bw",
    name: "DRAM Bandwidth",
    help: "64-byte transfers through the first four DRAM channel controllers of \
           each package.",
    columns: &[
        "Item",
        "Channel A (GB/s)",
        "Channel B (GB/s)",
        "Channel C (GB/s)",
        "Channel D (GB/s)",
        "Total (GB/s)",
    ],
    events: &[
        EventSpec::new("DRAM Channel A", 0x07, 0x38),
        EventSpec::new("DRAM Channel B", 0x47, 0x38),
        EventSpec::new("DRAM Channel C", 0x87, 0x38),
        EventSpec::new("DRAM Channel D", 0xC7, 0x38),
    ],
    compute: dram_bandwidth_metrics,
};

fn dram_bandwidth_metrics(c: &NormalizedCounts) -> Vec<f64> {
    let channels: Vec<f64> = (0..4).map(|slot| bandwidth_gbps(c.slot(slot))).collect();
    let total = channels.iter().sum();
    let mut values = channels;
    values.push(total);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::FixedCounter;

    fn all_sets() -> [&'static EventSet; 6] {
        [
            &BRANCH_PREDICTION,
            &OP_CACHE,
            &DISPATCH_STALLS,
            &L3_HIT_RATE_ZEN2,
            &L3_HIT_RATE_ZEN4,
            &DRAM_BANDWIDTH,
        ]
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9 * expected.abs().max(1.0),
            "{actual} != {expected}"
        );
    }

    #[test]
    fn test_every_set_fills_its_columns() {
        for set in all_sets() {
            let values = (set.compute)(&NormalizedCounts::default());
            assert_eq!(values.len(), set.metric_count(), "{}", set.name);
        }
    }

    #[test]
    fn test_all_zero_counters_give_defined_values() {
        for set in all_sets() {
            let values = (set.compute)(&NormalizedCounts::default());
            assert!(values.iter().all(|v| *v == 0.0), "{}: {:?}", set.name, values);
        }
    }

    #[test]
    fn test_branch_metrics() {
        let mut c = NormalizedCounts::default();
        c.fixed[FixedCounter::Instructions.index()] = 2_000_000.0;
        c.fixed[FixedCounter::ActualCycles.index()] = 1_000_000.0;
        c.slots[0] = 400_000.0;
        c.slots[1] = 4_000.0;
        c.slots[4] = 200_000.0;

        let values = branch_metrics(&c);
        assert_close(values[2], 2.0);
        assert_close(values[4], 99.0);
        assert_close(values[5], 2.0);
        assert_close(values[8], 50.0);
    }

    #[test]
    fn test_l3_metrics() {
        let mut c = NormalizedCounts::default();
        c.slots[0] = 1_000_000.0;
        c.slots[1] = 250_000.0;
        c.slots[2] = 1_000.0;
        c.slots[3] = 100.0;

        let zen2 = l3_zen2_metrics(&c);
        assert_eq!(zen2[0], 75.0);
        assert_eq!(zen2[1], 750_000.0 * 64.0 / 1e9);
        assert_eq!(zen2[2], 160.0);

        assert_eq!(l3_zen4_metrics(&c)[2], 100.0);
    }

    #[test]
    fn test_dram_total_is_sum_of_channels() {
        let mut c = NormalizedCounts::default();
        c.slots[..4].copy_from_slice(&[1e8, 2e8, 3e8, 4e8]);

        let values = dram_bandwidth_metrics(&c);
        assert_eq!(values[4], values[..4].iter().sum::<f64>());
        assert_close(values[4], 64.0);
    }

    #[test]
    fn test_slot_counts_fit_hardware() {
        use pmcflow_raw::arch::amd::{core, df, l3};

        for set in [&BRANCH_PREDICTION, &OP_CACHE, &DISPATCH_STALLS] {
            assert!(set.events.len() <= core::CORE_PMC_COUNTERS);
        }
        for set in [&L3_HIT_RATE_ZEN2, &L3_HIT_RATE_ZEN4] {
            assert!(set.events.len() <= l3::L3_PMC_COUNTERS);
        }
        assert!(DRAM_BANDWIDTH.events.len() <= df::DF_PMC_COUNTERS);
    }
}
