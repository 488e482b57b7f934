// SPDX-License-Identifier: MIT OR Apache-2.0

/* ---------------------------------------------------------------------------------------------- */

use num_traits::PrimInt;

/* ---------------------------------------------------------------------------------------------- */

/// Extracts bits `lsb..=msb` of `value`, shifted down to bit 0.
pub fn get_bits<T: PrimInt>(value: T, lsb: u32, msb: u32) -> T {
    debug_assert!(lsb <= msb);
    debug_assert!((msb as usize) < std::mem::size_of::<T>() * 8);

    let width = msb - lsb + 1;
    let shifted = value >> lsb as usize;

    if width as usize >= std::mem::size_of::<T>() * 8 {
        shifted
    } else {
        shifted & ((T::one() << width as usize) - T::one())
    }
}

/// Whether `value` is a (positive) multiple of `multiple`.
pub fn is_multiple(value: usize, multiple: usize) -> bool {
    multiple != 0 && value % multiple == 0
}

/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bits() {
        let value: u32 = 0xabcd_1234;
        assert_eq!(get_bits(value, 0, 3), 0x4);
        assert_eq!(get_bits(value, 0, 15), 0x1234);
        assert_eq!(get_bits(value, 16, 31), 0xabcd);
        assert_eq!(get_bits(value, 0, 31), value);
        assert_eq!(get_bits(0xffu8, 4, 7), 0xf);
    }

    #[test]
    fn test_is_multiple() {
        assert!(is_multiple(1024 * 1024, 1024 * 1024));
        assert!(is_multiple(3 * 32 * 1024, 32 * 1024));
        assert!(!is_multiple(512 * 1024, 1024 * 1024));
        assert!(!is_multiple(8, 0));
    }
}

/* ---------------------------------------------------------------------------------------------- */
