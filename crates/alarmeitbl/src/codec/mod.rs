// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire codecs for the alarm panel protocols.
//!
//! Everything in this module is a pure function over byte slices; no state
//! is kept between calls.
//!
//! - [`checksum`] - XOR checksum shared by both protocols
//! - [`digits`] - Contact-ID digits and BCD
//! - [`isecnet2`] - client-side command/response packets
//! - [`frame`] - panel-pushed frames on the IP receiver side
//!
//! # Checksum
//!
//! Both protocols close a frame with `XOR(all preceding bytes) ^ 0xFF`. The
//! useful property is that the checksum of a frame *including* its trailing
//! checksum byte is always zero:
//!
//! ```
//! use alarmeitbl::codec::checksum;
//!
//! let mut frame = vec![0x02, 0x80, 0x11];
//! frame.push(checksum(&frame));
//! assert_eq!(checksum(&frame), 0);
//! ```

pub mod digits;
pub mod frame;
pub mod isecnet2;

use thiserror::Error;

pub use digits::{bcd, decode_contact_id, encode_contact_id, from_bcd};
pub use frame::{encode_long_frame, IngestFrame, ACK, HEARTBEAT};
pub use isecnet2::{Packet, ISECNET2_HEADER_SIZE, ISECNET2_MIN_PACKET};

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated input: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("checksum mismatch")]
    BadChecksum,

    #[error("invalid length field: {0}")]
    InvalidLength(usize),

    #[error("invalid Contact-ID digit 0x{0:02x}")]
    InvalidDigit(u8),

    #[error("value {0} cannot be encoded as BCD")]
    InvalidBcd(i64),
}

/// XOR checksum of `data`, inverted.
///
/// `data` is everything that precedes the checksum byte on the wire.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b) ^ 0xFF
}

/// Encode a 16-bit value big-endian.
#[inline]
pub fn be16(n: u16) -> [u8; 2] {
    n.to_be_bytes()
}

/// Decode a big-endian 16-bit value from the first two bytes of `buf`.
#[inline]
pub fn parse_be16(buf: &[u8]) -> Result<u16, CodecError> {
    match buf {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(CodecError::Truncated {
            needed: 2,
            have: buf.len(),
        }),
    }
}

/// Format bytes as `"0a, ff, 12"` for logging.
pub fn hexprint(buf: &[u8]) -> String {
    buf.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_of_empty() {
        assert_eq!(checksum(&[]), 0xFF);
    }

    #[test]
    fn test_checksum_suffix_is_zero() {
        let samples: [&[u8]; 4] = [
            &[0x00],
            &[0x01, 0x02, 0x03],
            &[0xFF, 0xFF, 0x10, 0x94, 0x45],
            &[0x00, 0x00, 0x8F, 0xFF, 0x00, 0x02, 0xF0, 0xF1],
        ];
        for p in samples {
            let mut framed = p.to_vec();
            framed.push(checksum(p));
            assert_eq!(checksum(&framed), 0, "frame {}", hexprint(&framed));
        }
    }

    #[test]
    fn test_checksum_every_single_byte() {
        for b in 0..=255u8 {
            assert_eq!(checksum(&[b, checksum(&[b])]), 0);
        }
    }

    #[test]
    fn test_be16() {
        assert_eq!(be16(0x401E), [0x40, 0x1E]);
        assert_eq!(parse_be16(&[0x0B, 0xB0, 0x99]).unwrap(), 0x0BB0);
        assert_eq!(
            parse_be16(&[0x01]),
            Err(CodecError::Truncated { needed: 2, have: 1 })
        );
    }

    #[test]
    fn test_hexprint() {
        assert_eq!(hexprint(&[0x0A, 0xFF, 0x12]), "0a, ff, 12");
        assert_eq!(hexprint(&[]), "");
    }
}
