//! Data Fabric PMC register definitions for AMD Zen 2 and Zen 3
//!
//! The Data Fabric counters are package-wide: any thread of the package can
//! program and read them, and every thread sees the same values.

use crate::register::RegisterLayout;

/// Number of Data Fabric counters per package
pub const DF_PMC_COUNTERS: usize = 4;

/// Width of the Data Fabric counters in bits
pub const DF_PMC_WIDTH: u32 = 48;

/// MSR addresses for the Data Fabric PMU
pub mod msr {
    /// DF event select registers (DF_PERF_CTL0-3)
    pub const DF_PERF_CTL: [u64; 4] = [0xC001_0240, 0xC001_0242, 0xC001_0244, 0xC001_0246];

    /// DF counter registers (DF_PERF_CTR0-3)
    pub const DF_PERF_CTR: [u64; 4] = [0xC001_0241, 0xC001_0243, 0xC001_0245, 0xC001_0247];
}

/// Data Fabric event select layout
///
/// | Bits   | Field   | Description              |
/// |--------|---------|--------------------------|
/// | 0-7    | event   | Event select [7:0]       |
/// | 8-15   | umask   | Unit mask                |
/// | 22     | enable  | Enable counter           |
/// | 32-35  | event   | Event select [11:8]      |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DfPerfCtl {
    pub event: u16,
    pub umask: u8,
    pub enable: bool,
}

impl DfPerfCtl {
    pub fn counting(event: u16, umask: u8) -> Self {
        Self {
            event,
            umask,
            enable: true,
        }
    }
}

impl RegisterLayout for DfPerfCtl {
    fn to_msr_value(&self) -> u64 {
        (self.event as u64 & 0xFF)
            | ((self.umask as u64) << 8)
            | (if self.enable { 1 << 22 } else { 0 })
            | (((self.event as u64 >> 8) & 0xF) << 32)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            event: ((value & 0xFF) | (((value >> 32) & 0xF) << 8)) as u16,
            umask: ((value >> 8) & 0xFF) as u8,
            enable: (value & (1 << 22)) != 0,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.event > 0xFFF {
            return Err("Event select must be <= 0xFFF (12 bits)");
        }
        Ok(())
    }
}
