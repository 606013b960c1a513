//! Core PMU register definitions for Intel Core processors
//!
//! Architectural performance monitoring version 3 and later: four
//! general-purpose counters per thread (with SMT enabled) and three
//! fixed-function counters.

use crate::register::RegisterLayout;

/// Number of general-purpose performance counters per thread
pub const CORE_PMU_COUNTERS: usize = 4;

/// Number of fixed-function performance counters
pub const CORE_FIXED_COUNTERS: usize = 3;

/// Width of the general-purpose and fixed counters in bits
pub const CORE_PMC_WIDTH: u32 = 48;

/// MSR addresses for Core PMU
pub mod msr {
    /// Time stamp counter
    pub const IA32_TIME_STAMP_COUNTER: u64 = 0x10;

    /// Performance Event Select registers (IA32_PERFEVTSELx)
    pub const IA32_PERFEVTSEL: [u64; 4] = [0x186, 0x187, 0x188, 0x189];

    /// Performance Counter registers (IA32_PMCx)
    pub const IA32_PMC: [u64; 4] = [0xC1, 0xC2, 0xC3, 0xC4];

    /// Fixed-function Performance Counter Control
    pub const IA32_FIXED_CTR_CTRL: u64 = 0x38D;

    pub const IA32_FIXED_CTR0: u64 = 0x309; // Instructions Retired
    pub const IA32_FIXED_CTR1: u64 = 0x30A; // Unhalted Core Cycles
    pub const IA32_FIXED_CTR2: u64 = 0x30B; // Unhalted Reference Cycles

    /// Performance Counter Global Control
    pub const IA32_PERF_GLOBAL_CTRL: u64 = 0x38F;
}

/// Core Performance Event Select Register layout
///
/// ## Register Format
///
/// | Bits   | Field       | Description                    |
/// |--------|-------------|--------------------------------|
/// | 0-7    | event_select| Event select                   |
/// | 8-15   | umask       | Unit mask                      |
/// | 16     | usr         | User mode                      |
/// | 17     | os          | OS mode                        |
/// | 18     | edge        | Edge detect                    |
/// | 20     | int         | APIC interrupt enable          |
/// | 21     | any_thread  | Any thread                     |
/// | 22     | enable      | Enable counter                 |
/// | 23     | invert      | Invert counter mask            |
/// | 24-31  | cmask       | Counter mask                   |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorePerfEvtSel {
    pub event_select: u8,
    pub umask: u8,
    pub usr: bool,
    pub os: bool,
    pub edge: bool,
    pub int: bool,
    pub any_thread: bool,
    pub enable: bool,
    pub invert: bool,
    pub cmask: u8,
}

impl CorePerfEvtSel {
    /// Enabled event counting in both user and OS mode
    pub fn counting(event_select: u8, umask: u8) -> Self {
        Self {
            event_select,
            umask,
            usr: true,
            os: true,
            enable: true,
            ..Default::default()
        }
    }
}

impl RegisterLayout for CorePerfEvtSel {
    fn to_msr_value(&self) -> u64 {
        (self.event_select as u64)
            | ((self.umask as u64) << 8)
            | (if self.usr { 1 << 16 } else { 0 })
            | (if self.os { 1 << 17 } else { 0 })
            | (if self.edge { 1 << 18 } else { 0 })
            | (if self.int { 1 << 20 } else { 0 })
            | (if self.any_thread { 1 << 21 } else { 0 })
            | (if self.enable { 1 << 22 } else { 0 })
            | (if self.invert { 1 << 23 } else { 0 })
            | ((self.cmask as u64) << 24)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            event_select: (value & 0xFF) as u8,
            umask: ((value >> 8) & 0xFF) as u8,
            usr: (value & (1 << 16)) != 0,
            os: (value & (1 << 17)) != 0,
            edge: (value & (1 << 18)) != 0,
            int: (value & (1 << 20)) != 0,
            any_thread: (value & (1 << 21)) != 0,
            enable: (value & (1 << 22)) != 0,
            invert: (value & (1 << 23)) != 0,
            cmask: ((value >> 24) & 0xFF) as u8,
        }
    }
}

/// Per-counter enable bits of `IA32_FIXED_CTR_CTRL`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedCounterMode {
    pub os: bool,
    pub usr: bool,
    pub any_thread: bool,
    pub pmi: bool,
}

impl FixedCounterMode {
    pub const ALL_RINGS: Self = Self {
        os: true,
        usr: true,
        any_thread: false,
        pmi: false,
    };

    fn bits(&self) -> u64 {
        (self.os as u64)
            | ((self.usr as u64) << 1)
            | ((self.any_thread as u64) << 2)
            | ((self.pmi as u64) << 3)
    }

    fn from_bits(bits: u64) -> Self {
        Self {
            os: bits & 0x1 != 0,
            usr: bits & 0x2 != 0,
            any_thread: bits & 0x4 != 0,
            pmi: bits & 0x8 != 0,
        }
    }
}

/// Fixed Counter Control Register layout
///
/// Each fixed counter owns a 4-bit field: [os, usr, any_thread, pmi].
/// Counter 0 counts retired instructions, counter 1 unhalted core cycles and
/// counter 2 unhalted reference cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedCtrCtrl {
    pub counters: [FixedCounterMode; CORE_FIXED_COUNTERS],
}

impl FixedCtrCtrl {
    /// All fixed counters enabled in user and OS mode
    pub fn all_rings() -> Self {
        Self {
            counters: [FixedCounterMode::ALL_RINGS; CORE_FIXED_COUNTERS],
        }
    }
}

impl RegisterLayout for FixedCtrCtrl {
    fn to_msr_value(&self) -> u64 {
        self.counters
            .iter()
            .enumerate()
            .fold(0u64, |value, (i, mode)| value | (mode.bits() << (4 * i)))
    }

    fn from_msr_value(value: u64) -> Self {
        let mut counters = [FixedCounterMode::default(); CORE_FIXED_COUNTERS];
        for (i, mode) in counters.iter_mut().enumerate() {
            *mode = FixedCounterMode::from_bits((value >> (4 * i)) & 0xF);
        }
        Self { counters }
    }
}

/// Value of `IA32_PERF_GLOBAL_CTRL` enabling `programmable` general-purpose
/// counters and all fixed counters
pub fn global_ctrl_value(programmable: usize) -> u64 {
    let pmc_bits = (1u64 << programmable.min(CORE_PMU_COUNTERS)) - 1;
    let fixed_bits = ((1u64 << CORE_FIXED_COUNTERS) - 1) << 32;
    fixed_bits | pmc_bits
}
