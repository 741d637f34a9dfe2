// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ISECNet2 packets (client <-> panel command protocol).
//!
//! # Wire Format
//!
//! ```text
//! +--------+--------+------------+--------+-----------+----------+
//! | dst_id | src_id | length     | cmd    | payload   | checksum |
//! | be16   | be16   | be16 (=n+2)| be16   | n bytes   | u8       |
//! +--------+--------+------------+--------+-----------+----------+
//! ```
//!
//! `dst_id` is the panel (always 0). `src_id` is an arbitrary tag chosen by
//! the client and echoed back by the panel. The length field counts the
//! command code plus payload. The checksum is `XOR(all preceding) ^ 0xFF`,
//! so a whole valid packet checksums to zero.

use super::digits::encode_contact_id;
use super::{be16, checksum, parse_be16, CodecError};

/// Bytes before the payload: dst, src, length, cmd.
pub const ISECNET2_HEADER_SIZE: usize = 8;

/// Smallest well-formed packet: header plus checksum, empty payload.
pub const ISECNET2_MIN_PACKET: usize = ISECNET2_HEADER_SIZE + 1;

/// Panel address; panels ignore anything else.
pub const PANEL_ID: u16 = 0x0000;

/// Our tag, echoed back by the panel.
pub const CLIENT_ID: u16 = 0x8FFF;

/// Authentication: software type "monitoring software" (0x03 = mobile app).
pub const SW_TYPE_MONITORING: u8 = 0x02;

/// Authentication: software version, nibble.nibble (1.0).
pub const SW_VERSION: u8 = 0x10;

/// Command codes.
pub mod cmd {
    /// Authentication request / response
    pub const AUTH: u16 = 0xF0F0;
    /// Goodbye; the panel closes the connection afterwards
    pub const BYE: u16 = 0xF0F1;
    /// Panel busy (undocumented, seen after slow exchanges)
    pub const BUSY: u16 = 0xF0F7;
    /// Negative acknowledgement, payload = reason code
    pub const NAK: u16 = 0xF0FD;
    /// Generic acknowledgement
    pub const ACK: u16 = 0xF0FE;
    /// Clear trouble / event memory
    pub const CLEAR_TROUBLE: u16 = 0x4013;
    /// Silence siren
    pub const SILENCE_SIREN: u16 = 0x4019;
    /// Arm / disarm / stay
    pub const ARM_DISARM: u16 = 0x401E;
    /// Bypass / un-bypass zone
    pub const ZONE_BYPASS: u16 = 0x401F;
    /// Full status query
    pub const STATUS: u16 = 0x0B4A;
    /// Photo fragment request / response
    pub const PHOTO_FRAGMENT: u16 = 0x0BB0;
}

/// An ISECNet2 packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Destination id
    pub dst_id: u16,
    /// Source id
    pub src_id: u16,
    /// Command code
    pub command: u16,
    /// Command payload
    pub payload: Vec<u8>,
}

impl Packet {
    /// A client-to-panel packet with the default ids.
    pub fn new(command: u16, payload: Vec<u8>) -> Self {
        Self {
            dst_id: PANEL_ID,
            src_id: CLIENT_ID,
            command,
            payload,
        }
    }

    /// Authentication packet for a numeric password of `password_len` digits.
    pub fn auth(password: u32, password_len: usize) -> Self {
        let mut payload = Vec::with_capacity(password_len + 2);
        payload.push(SW_TYPE_MONITORING);
        payload.extend(encode_contact_id(u64::from(password), password_len));
        payload.push(SW_VERSION);
        Self::new(cmd::AUTH, payload)
    }

    /// Goodbye packet.
    pub fn bye() -> Self {
        Self::new(cmd::BYE, Vec::new())
    }

    /// Serialize to wire bytes, checksum included.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ISECNET2_MIN_PACKET + self.payload.len());
        out.extend_from_slice(&be16(self.dst_id));
        out.extend_from_slice(&be16(self.src_id));
        out.extend_from_slice(&be16((self.payload.len() + 2) as u16));
        out.extend_from_slice(&be16(self.command));
        out.extend_from_slice(&self.payload);
        out.push(checksum(&out));
        out
    }

    /// Parse one complete packet (as delimited by [`complete_len`]).
    pub fn decode(pkt: &[u8]) -> Result<Self, CodecError> {
        if pkt.len() < ISECNET2_MIN_PACKET {
            return Err(CodecError::Truncated {
                needed: ISECNET2_MIN_PACKET,
                have: pkt.len(),
            });
        }
        let net_len = parse_be16(&pkt[4..6])? as usize;
        // must at least carry the command code
        if net_len < 2 {
            return Err(CodecError::InvalidLength(net_len));
        }
        let total = 6 + net_len + 1;
        if pkt.len() < total {
            return Err(CodecError::Truncated {
                needed: total,
                have: pkt.len(),
            });
        }
        if checksum(&pkt[..total]) != 0 {
            return Err(CodecError::BadChecksum);
        }
        Ok(Self {
            dst_id: parse_be16(&pkt[0..2])?,
            src_id: parse_be16(&pkt[2..4])?,
            command: parse_be16(&pkt[6..8])?,
            payload: pkt[ISECNET2_HEADER_SIZE..total - 1].to_vec(),
        })
    }
}

/// Length of the first packet in `buf`, or 0 if it is not complete yet.
pub fn complete_len(buf: &[u8]) -> usize {
    if buf.len() < ISECNET2_MIN_PACKET {
        return 0;
    }
    let net_len = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    let total = 6 + net_len + 1;
    if buf.len() < total {
        return 0;
    }
    total
}

/// Human-readable NAK reason, for logging.
pub fn nak_reason(code: u8) -> &'static str {
    match code {
        0x00 => "message ok",
        0x01 => "checksum error",
        0x02 => "wrong message length",
        0x03 => "wrong parameter length",
        0x04 => "no such parameter",
        0x05 => "parameter index",
        0x06 => "above maximum value",
        0x07 => "below minimum value",
        0x08 => "wrong field count",
        0x09 => "nibble not 0-9",
        0x0A => "nibble not 1-a",
        0x0B => "nibble not 0-f",
        0x0D => "invalid ASCII",
        0x0E..=0x14 => "invalid date or time",
        0x15 => "invalid command type",
        0x17 => "wrong digit count",
        0x18 => "wrong password digit count",
        0x19 => "wrong password",
        0x1A => "no such partition",
        0x1B => "user has no permission on partition",
        0x1C => "no permission to program",
        0x1D => "receive buffer full",
        0x1E => "no permission to disarm",
        0x1F => "authentication required",
        0x20 => "no zones enabled",
        0x21 => "no permission for command",
        0x22 => "no partitions defined",
        0x23 => "event has no photo",
        0x24 => "invalid photo index",
        0x25 => "invalid photo fragment",
        0x26 => "system not partitioned",
        0x27 => "open zones",
        0x28 => "photo still being recorded",
        0x29 => "mobile access disabled",
        0x2A => "operation not allowed",
        0x2E => "arm/disarm failed",
        0x2F => "no permission to arm stay",
        0x30 => "disarm the panel first",
        0x33 => "photo reception failed",
        0x37 => "no permission to bypass",
        0x38 => "corrupted firmware",
        0xFE => "invalid command",
        0xFF => "unspecified error",
        _ => "unknown reason",
    }
}
