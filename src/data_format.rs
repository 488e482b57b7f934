// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accessors for the CRU sibling card's frame header.
//!
//! A frame starts with two 256-bit header words (64 bytes); the fields of interest sit at fixed
//! bit positions within the 32-bit words of that header.

/* ---------------------------------------------------------------------------------------------- */

use crate::utils::get_bits;

/* ---------------------------------------------------------------------------------------------- */

/// Header size in bytes: two 256-bit words.
pub const HEADER_SIZE: usize = 64;

/// Header size in 256-bit words.
pub const HEADER_SIZE_WORDS: usize = 2;

fn get_word(header: &[u8], index: usize) -> u32 {
    let offset = index * 4;
    u32::from_le_bytes(header[offset..offset + 4].try_into().expect("4 bytes"))
}

/// The link the frame came in on: bits 8..=15 of the header's third 32-bit word.
pub fn link_id(header: &[u8]) -> u32 {
    get_bits(get_word(header, 2), 8, 15)
}

/// Size of the event in the frame: bits 8..=23 of the header's fourth 32-bit word.
pub fn event_size(header: &[u8]) -> u32 {
    get_bits(get_word(header, 3), 8, 23)
}

/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields_roundtrip() {
        let mut header = [0u8; HEADER_SIZE];

        // link id 0x2a into word 2, event size 0x1234 into word 3
        header[8..12].copy_from_slice(&(0x2au32 << 8).to_le_bytes());
        header[12..16].copy_from_slice(&(0x1234u32 << 8).to_le_bytes());

        assert_eq!(link_id(&header), 0x2a);
        assert_eq!(event_size(&header), 0x1234);
    }

    #[test]
    fn test_fields_masked() {
        let mut header = [0xffu8; HEADER_SIZE];
        header[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        header[12..16].copy_from_slice(&u32::MAX.to_le_bytes());

        assert_eq!(link_id(&header), 0xff);
        assert_eq!(event_size(&header), 0xffff);
    }
}

/* ---------------------------------------------------------------------------------------------- */
