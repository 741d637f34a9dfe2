// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Contact-ID digit strings and packed BCD.
//!
//! Contact-ID carries one decimal digit per byte: `0x0A` stands for zero and
//! `0x01..=0x09` for themselves. Numbers are most-significant digit first.
//!
//! ```text
//! 1234  (len 4)  ->  01 02 03 04
//! 1030  (len 4)  ->  01 0a 03 0a
//!   42  (len 4)  ->  0a 0a 04 02
//! ```

use super::CodecError;

/// Contact-ID encoding of zero.
pub const CONTACT_ID_ZERO: u8 = 0x0A;

/// Encode `number` as exactly `len` Contact-ID digits.
///
/// Digits above `len` are dropped, like a fixed-width odometer.
pub fn encode_contact_id(number: u64, len: usize) -> Vec<u8> {
    let mut out = vec![CONTACT_ID_ZERO; len];
    let mut n = number;
    for slot in out.iter_mut().rev() {
        let digit = (n % 10) as u8;
        n /= 10;
        if digit != 0 {
            *slot = digit;
        }
    }
    out
}

/// Decode a Contact-ID digit string.
///
/// Any byte outside `{0x0A, 0x01..=0x09}` means the field is corrupted.
pub fn decode_contact_id(digits: &[u8]) -> Result<u64, CodecError> {
    digits.iter().try_fold(0u64, |acc, &d| {
        let value = match d {
            CONTACT_ID_ZERO => 0,
            0x01..=0x09 => d as u64,
            _ => return Err(CodecError::InvalidDigit(d)),
        };
        Ok(acc * 10 + value)
    })
}

/// Pack a value in `0..=99` into one BCD byte.
pub fn bcd(n: u32) -> Result<u8, CodecError> {
    if n > 99 {
        return Err(CodecError::InvalidBcd(i64::from(n)));
    }
    Ok((((n / 10) << 4) | (n % 10)) as u8)
}

/// Unpack a big-endian BCD byte string (two digits per byte).
pub fn from_bcd(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &b| {
        acc * 100 + u64::from(b >> 4) * 10 + u64::from(b & 0x0F)
    })
}
