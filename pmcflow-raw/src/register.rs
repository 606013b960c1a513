//! Typed event-select encodings

/// A control register whose fields pack into one 64-bit MSR value
///
/// ```
/// use pmcflow_raw::arch::amd::core::PerfCtl;
/// use pmcflow_raw::RegisterLayout;
///
/// let ctl = PerfCtl::counting(0xC0, 0x00);
/// assert_eq!(PerfCtl::from_msr_value(ctl.to_msr_value()), ctl);
/// ```
pub trait RegisterLayout: Sized {
    fn to_msr_value(&self) -> u64;

    fn from_msr_value(value: u64) -> Self;

    /// Reject field values wider than their bit range
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

/// Mask selecting the low `width` bits of a register value
///
/// Widths of 64 or more select the whole value; a width of 0 selects nothing.
pub const fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Threshold(u8);

    impl RegisterLayout for Threshold {
        fn to_msr_value(&self) -> u64 {
            (self.0 as u64) << 24
        }

        fn from_msr_value(value: u64) -> Self {
            Self((value >> 24) as u8)
        }
    }

    #[test]
    fn test_default_validate_accepts() {
        let layout = Threshold::from_msr_value(0x0500_0000);
        assert_eq!(layout.0, 5);
        assert!(layout.validate().is_ok());
        assert_eq!(layout.to_msr_value(), 0x0500_0000);
    }

    #[test]
    fn test_width_mask() {
        assert_eq!(width_mask(32), 0xFFFF_FFFF);
        assert_eq!(width_mask(48), 0xFFFF_FFFF_FFFF);
        assert_eq!(width_mask(64), u64::MAX);
        assert_eq!(width_mask(0), 0);
    }
}
