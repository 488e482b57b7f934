// SPDX-License-Identifier: MIT OR Apache-2.0

/* ---------------------------------------------------------------------------------------------- */

use crate::error::{CardError, Result};
use crate::utils::get_bits;

/* ---------------------------------------------------------------------------------------------- */

/// Value the reserved field of the firmware ID register must hold.
const RESERVED_MAGIC: u32 = 0x2;

/// Decodes the C-RORC firmware ID register into `"major.minor:year-month-day"`.
///
/// Layout: reserved\[24:31\] (must be `0x2`), major\[20:23\], minor\[13:19\], year\[9:12\]
/// counted from 2000, month\[5:8\], day\[0:4\].
pub fn decode_firmware_info(version: u32) -> Result<String> {
    let bits = |lsb, msb| get_bits(version, lsb, msb);

    let reserved = bits(24, 31);
    let major = bits(20, 23);
    let minor = bits(13, 19);
    let year = bits(9, 12) + 2000;
    let month = bits(5, 8);
    let day = bits(0, 4);

    if reserved != RESERVED_MAGIC {
        return Err(CardError::with_csr(
            "static field of version register did not equal 0x2",
            version,
        )
        .into());
    }

    Ok(format!("{}.{}:{}-{}-{}", major, minor, year, month, day))
}

/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn encode(major: u32, minor: u32, year: u32, month: u32, day: u32) -> u32 {
        (RESERVED_MAGIC << 24) | (major << 20) | (minor << 13) | ((year - 2000) << 9) | (month << 5) | day
    }

    #[test]
    fn test_decode() {
        let version = encode(3, 20, 2004, 3, 5);
        assert_eq!(decode_firmware_info(version).unwrap(), "3.20:2004-3-5");

        let version = encode(1, 0, 2015, 12, 31);
        assert_eq!(decode_firmware_info(version).unwrap(), "1.0:2015-12-31");
    }

    #[test]
    fn test_bad_reserved_field() {
        let version = encode(3, 20, 2004, 3, 5) & !(0xff << 24);
        assert!(matches!(
            decode_firmware_info(version),
            Err(Error::Card(_))
        ));
    }
}

/* ---------------------------------------------------------------------------------------------- */
