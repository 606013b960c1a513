//! L3 cache PMC register definitions for AMD Zen
//!
//! Every core complex (CCX) has its own L3 with six counters. The counters are
//! shared by all threads of the complex, so they are programmed and read from
//! one representative thread per CCX. The event select carries extra fields
//! choosing which slices and which threads' requests are counted; the layout of
//! those fields changed with Zen 3.

use crate::register::RegisterLayout;

/// Number of L3 counters per CCX
pub const L3_PMC_COUNTERS: usize = 6;

/// Width of the L3 counters in bits
pub const L3_PMC_WIDTH: u32 = 48;

/// MSR addresses for the L3 PMU
pub mod msr {
    /// L3 event select registers (ChL3PmcCfg0-5)
    pub const L3_PERF_CTL: [u64; 6] = [
        0xC001_0230,
        0xC001_0232,
        0xC001_0234,
        0xC001_0236,
        0xC001_0238,
        0xC001_023A,
    ];

    /// L3 counter registers (ChL3Pmc0-5)
    pub const L3_PERF_CTR: [u64; 6] = [
        0xC001_0231,
        0xC001_0233,
        0xC001_0235,
        0xC001_0237,
        0xC001_0239,
        0xC001_023B,
    ];
}

/// Zen 2 L3 event select layout
///
/// | Bits   | Field       | Description                         |
/// |--------|-------------|-------------------------------------|
/// | 0-7    | event       | Event select                        |
/// | 8-15   | umask       | Unit mask                           |
/// | 22     | enable      | Enable counter                      |
/// | 48-51  | slice_mask  | L3 slices counted                   |
/// | 56-63  | thread_mask | CCX threads whose requests count    |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct L3PerfCtlZen2 {
    pub event: u8,
    pub umask: u8,
    pub enable: bool,
    pub slice_mask: u8,
    pub thread_mask: u8,
}

impl L3PerfCtlZen2 {
    /// Count `event` across every slice and thread of the complex
    pub fn all_slices(event: u8, umask: u8) -> Self {
        Self {
            event,
            umask,
            enable: true,
            slice_mask: 0xF,
            thread_mask: 0xFF,
        }
    }
}

impl RegisterLayout for L3PerfCtlZen2 {
    fn to_msr_value(&self) -> u64 {
        (self.event as u64)
            | ((self.umask as u64) << 8)
            | (if self.enable { 1 << 22 } else { 0 })
            | ((self.slice_mask as u64 & 0xF) << 48)
            | ((self.thread_mask as u64) << 56)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            event: (value & 0xFF) as u8,
            umask: ((value >> 8) & 0xFF) as u8,
            enable: (value & (1 << 22)) != 0,
            slice_mask: ((value >> 48) & 0xF) as u8,
            thread_mask: ((value >> 56) & 0xFF) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.slice_mask > 0xF {
            return Err("Slice mask must be <= 0xF (4 bits)");
        }
        Ok(())
    }
}

/// Zen 3 and later L3 event select layout
///
/// | Bits   | Field         | Description                         |
/// |--------|---------------|-------------------------------------|
/// | 0-7    | event         | Event select                        |
/// | 8-15   | umask         | Unit mask                           |
/// | 22     | enable        | Enable counter                      |
/// | 42-44  | core_id       | Core counted when not all cores     |
/// | 46     | all_slices    | Count every slice                   |
/// | 47     | all_cores     | Count every core                    |
/// | 48-50  | slice_id      | Slice counted when not all slices   |
/// | 56-57  | thread_mask   | Threads of the selected core(s)     |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct L3PerfCtl {
    pub event: u8,
    pub umask: u8,
    pub enable: bool,
    pub core_id: u8,
    pub all_slices: bool,
    pub all_cores: bool,
    pub slice_id: u8,
    pub thread_mask: u8,
}

impl L3PerfCtl {
    /// Count `event` across every slice, core and thread of the complex
    pub fn all_slices(event: u8, umask: u8) -> Self {
        Self {
            event,
            umask,
            enable: true,
            all_slices: true,
            all_cores: true,
            thread_mask: 0x3,
            ..Default::default()
        }
    }
}

impl RegisterLayout for L3PerfCtl {
    fn to_msr_value(&self) -> u64 {
        (self.event as u64)
            | ((self.umask as u64) << 8)
            | (if self.enable { 1 << 22 } else { 0 })
            | ((self.core_id as u64 & 0x7) << 42)
            | (if self.all_slices { 1 << 46 } else { 0 })
            | (if self.all_cores { 1 << 47 } else { 0 })
            | ((self.slice_id as u64 & 0x7) << 48)
            | ((self.thread_mask as u64 & 0x3) << 56)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            event: (value & 0xFF) as u8,
            umask: ((value >> 8) & 0xFF) as u8,
            enable: (value & (1 << 22)) != 0,
            core_id: ((value >> 42) & 0x7) as u8,
            all_slices: (value & (1 << 46)) != 0,
            all_cores: (value & (1 << 47)) != 0,
            slice_id: ((value >> 48) & 0x7) as u8,
            thread_mask: ((value >> 56) & 0x3) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.core_id > 7 {
            return Err("Core id must be <= 7 (3 bits)");
        }
        if self.slice_id > 7 {
            return Err("Slice id must be <= 7 (3 bits)");
        }
        if self.thread_mask > 0x3 {
            return Err("Thread mask must be <= 0x3 (2 bits)");
        }
        Ok(())
    }
}
