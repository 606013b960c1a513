//! Core PMC register definitions for AMD Zen
//!
//! Each hardware thread has six programmable counters (`PERF_CTL`/`PERF_CTR`
//! pairs) and a set of free-running architectural counters.

use crate::register::RegisterLayout;

/// Number of programmable counters per thread
pub const CORE_PMC_COUNTERS: usize = 6;

/// Width of the programmable counters in bits
pub const CORE_PMC_WIDTH: u32 = 48;

/// Width of the retired-instruction counter in bits
pub const IRPERF_WIDTH: u32 = 48;

/// MSR addresses for the Zen core PMU
pub mod msr {
    /// Time stamp counter
    pub const TSC: u64 = 0x10;

    /// Read-only copy of MPERF (maximum-frequency clock count)
    pub const MPERF_RO: u64 = 0xC000_00E7;

    /// Read-only copy of APERF (actual-frequency clock count)
    pub const APERF_RO: u64 = 0xC000_00E8;

    /// Instructions retired (free-running once `HWCR.IRPerfEn` is set)
    pub const IRPERF_COUNT: u64 = 0xC000_00E9;

    /// Hardware configuration register
    pub const HWCR: u64 = 0xC001_0015;

    /// Performance event select registers (PERF_CTL0-5)
    pub const PERF_CTL: [u64; 6] = [
        0xC001_0200,
        0xC001_0202,
        0xC001_0204,
        0xC001_0206,
        0xC001_0208,
        0xC001_020A,
    ];

    /// Performance counter registers (PERF_CTR0-5)
    pub const PERF_CTR: [u64; 6] = [
        0xC001_0201,
        0xC001_0203,
        0xC001_0205,
        0xC001_0207,
        0xC001_0209,
        0xC001_020B,
    ];
}

/// `HWCR` bit that makes `IRPERF_COUNT` count retired instructions
pub const HWCR_IRPERF_EN: u64 = 1 << 30;

/// Core Performance Event Select register layout
///
/// ## Register Format
///
/// | Bits   | Field          | Description                    |
/// |--------|----------------|--------------------------------|
/// | 0-7    | event_select   | Event select [7:0]             |
/// | 8-15   | umask          | Unit mask                      |
/// | 16     | usr            | Count in user mode             |
/// | 17     | os             | Count in OS mode               |
/// | 18     | edge           | Edge detect                    |
/// | 20     | int            | APIC interrupt enable          |
/// | 22     | enable         | Enable counter                 |
/// | 23     | invert         | Invert counter mask            |
/// | 24-31  | cmask          | Counter mask                   |
/// | 32-35  | event_select   | Event select [11:8]            |
/// | 40-41  | host_guest     | Host/guest only                |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfCtl {
    /// 12-bit event number, split across bits 0-7 and 32-35
    pub event: u16,
    pub umask: u8,
    pub usr: bool,
    pub os: bool,
    pub edge: bool,
    pub int: bool,
    pub enable: bool,
    pub invert: bool,
    pub cmask: u8,
    /// 0b01 counts guest only, 0b10 host only, 0b00 both
    pub host_guest: u8,
}

impl PerfCtl {
    /// Enabled event counting in both user and OS mode
    pub fn counting(event: u16, umask: u8) -> Self {
        Self {
            event,
            umask,
            usr: true,
            os: true,
            enable: true,
            ..Default::default()
        }
    }
}

impl RegisterLayout for PerfCtl {
    fn to_msr_value(&self) -> u64 {
        (self.event as u64 & 0xFF)
            | ((self.umask as u64) << 8)
            | (if self.usr { 1 << 16 } else { 0 })
            | (if self.os { 1 << 17 } else { 0 })
            | (if self.edge { 1 << 18 } else { 0 })
            | (if self.int { 1 << 20 } else { 0 })
            | (if self.enable { 1 << 22 } else { 0 })
            | (if self.invert { 1 << 23 } else { 0 })
            | ((self.cmask as u64) << 24)
            | (((self.event as u64 >> 8) & 0xF) << 32)
            | ((self.host_guest as u64 & 0x3) << 40)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            event: ((value & 0xFF) | (((value >> 32) & 0xF) << 8)) as u16,
            umask: ((value >> 8) & 0xFF) as u8,
            usr: (value & (1 << 16)) != 0,
            os: (value & (1 << 17)) != 0,
            edge: (value & (1 << 18)) != 0,
            int: (value & (1 << 20)) != 0,
            enable: (value & (1 << 22)) != 0,
            invert: (value & (1 << 23)) != 0,
            cmask: ((value >> 24) & 0xFF) as u8,
            host_guest: ((value >> 40) & 0x3) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.event > 0xFFF {
            return Err("Event select must be <= 0xFFF (12 bits)");
        }
        if self.host_guest > 0x3 {
            return Err("Host/guest field must be <= 3 (2 bits)");
        }
        Ok(())
    }
}
