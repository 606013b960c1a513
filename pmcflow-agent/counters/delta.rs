use pmcflow_raw::register::width_mask;

/// Elapsed count of a 64-bit counter between two readings
pub fn counter_delta(previous: u64, current: u64) -> u64 {
    counter_delta_width(previous, current, 64)
}

/// Elapsed count of a `width`-bit counter between two readings
///
/// Both readings are masked to `width` bits first. A zero `previous` is a
/// first sample and yields `current`. A smaller `current` is taken as exactly
/// one wrap; several wraps in one interval cannot be told apart.
pub fn counter_delta_width(previous: u64, current: u64, width: u32) -> u64 {
    let max = width_mask(width);
    let previous = previous & max;
    let current = current & max;

    if previous == 0 {
        current
    } else if current >= previous {
        current - previous
    } else {
        current + (max - previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_delta() {
        assert_eq!(counter_delta(1000, 1500), 500);
        assert_eq!(counter_delta(7, 7), 0);
    }

    #[test]
    fn test_first_sample_returns_current() {
        assert_eq!(counter_delta(0, 0), 0);
        assert_eq!(counter_delta(0, 12_345), 12_345);
    }

    #[test]
    fn test_single_wrap_of_64_bit_counter() {
        assert_eq!(counter_delta(0xFFFF_FFFF_FFFF_FFF0, 0x10), 0x1F);
        assert_eq!(counter_delta(u64::MAX, 0), 0);
        assert_eq!(counter_delta(1, 0), u64::MAX - 1);
    }

    #[test]
    fn test_energy_counter_masks_to_32_bits() {
        // Bits above 31 are reserved garbage on the energy status registers
        let previous = 0xABCD_0000_FFFF_FF00;
        let current = 0x1234_0000_0000_0100;
        assert_eq!(counter_delta_width(previous, current, 32), 0x100 + 0xFF);
    }

    #[test]
    fn test_48_bit_counter_wrap() {
        let max = (1u64 << 48) - 1;
        assert_eq!(counter_delta_width(max - 9, 5, 48), 5 + 9);
        assert_eq!(counter_delta_width(100, 300, 48), 200);
    }

    #[test]
    fn test_width_masking_hides_high_bits_of_previous_only() {
        // previous masks to zero, so it counts as a first sample
        assert_eq!(counter_delta_width(1 << 48, 42, 48), 42);
    }
}
