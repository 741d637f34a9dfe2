// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frames pushed by the panel to the IP receiver.
//!
//! # Wire Format
//!
//! ```text
//! heartbeat:  +------+
//!             | 0xF7 |
//!             +------+
//!
//! long frame: +--------+------+-------------+----------+
//!             | len u8 | type | body        | checksum |
//!             +--------+------+-------------+----------+
//!                      |<----- len bytes --->|
//! ```
//!
//! The checksum covers the length byte and the payload. [`classify`] keeps the
//! checksum byte at the end of the body: for type 0xB5 the panel reuses the
//! checksum position as a data byte and appends more data after it, so the
//! body layout must not be "fixed" by stripping it.

use super::checksum;

/// Short heartbeat frame sent by the panel.
pub const HEARTBEAT: u8 = 0xF7;

/// Short acknowledgement sent by the receiver.
pub const ACK: u8 = 0xFE;

/// Frame types carried in the first payload byte.
pub mod kind {
    /// Panel asks for the current date and time
    pub const DATETIME: u8 = 0x80;
    /// Panel identification (channel, account, MAC)
    pub const IDENTIFICATION: u8 = 0x94;
    /// Contact-ID alarm event
    pub const EVENT: u8 = 0xB0;
    /// Contact-ID alarm event with photo reference
    pub const EVENT_WITH_PHOTO: u8 = 0xB5;
}

/// One recognized unit at the front of the receive buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum IngestFrame<'a> {
    /// Single 0xF7 byte
    Heartbeat,
    /// Long frame with a valid checksum; `body` still ends with the checksum byte
    Long { kind: u8, body: &'a [u8] },
    /// Long frame with zero-length payload
    Empty,
    /// Long frame whose checksum does not verify
    Corrupt(&'a [u8]),
}

/// Length of the frame at the front of `buf`, or `None` if incomplete.
pub fn frame_len(buf: &[u8]) -> Option<usize> {
    match buf {
        [] => None,
        [HEARTBEAT, ..] => Some(1),
        [_] => None,
        [len, ..] => {
            // length + payload + checksum
            let expected = *len as usize + 2;
            (buf.len() >= expected).then_some(expected)
        }
    }
}

/// Classify one complete frame as delimited by [`frame_len`].
pub fn classify(raw: &[u8]) -> IngestFrame<'_> {
    if raw.first() == Some(&HEARTBEAT) {
        IngestFrame::Heartbeat
    } else if checksum(raw) != 0 || raw.len() < 2 {
        IngestFrame::Corrupt(raw)
    } else if raw[0] == 0 {
        IngestFrame::Empty
    } else {
        IngestFrame::Long {
            kind: raw[1],
            body: &raw[2..],
        }
    }
}

/// Frame `data` as a long frame: length prefix and trailing checksum.
pub fn encode_long_frame(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    out.push(data.len() as u8);
    out.extend_from_slice(data);
    out.push(checksum(&out));
    out
}
