// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoding of the full status response (command 0x0B4A).
//!
//! Offsets below are zero-based into the response payload; the vendor
//! documentation counts from one.

use std::fmt;

use crate::codec::CodecError;

/// Shortest payload carrying every field we decode.
pub const STATUS_MIN_LEN: usize = 64;

/// Number of partition slots reported (0 = no partition / global).
pub const PARTITION_SLOTS: usize = 17;

const MODEL: usize = 0;
const FIRMWARE: usize = 1;
const GENERAL: usize = 20;
const PARTITIONS: usize = 21;
const OPEN_ZONES: usize = 38;
const ALARM_ZONES: usize = 46;
const BYPASSED_ZONES: usize = 54;
const SIRENS: usize = 62;

/// AMT-8000 model byte.
pub const MODEL_AMT8000: u8 = 0x01;

/// Overall arming state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmedState {
    Disarmed,
    SomePartitions,
    AllPartitions,
    Unknown(u8),
}

impl fmt::Display for ArmedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmedState::Disarmed => write!(f, "disarmed"),
            ArmedState::SomePartitions => write!(f, "partition(s) armed"),
            ArmedState::AllPartitions => write!(f, "all partitions armed"),
            ArmedState::Unknown(v) => write!(f, "unknown ({})", v),
        }
    }
}

/// State of one partition slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartitionStatus {
    pub number: u8,
    pub enabled: bool,
    pub stay: bool,
    pub exit_delay: bool,
    pub ready: bool,
    pub alarm_occurred: bool,
    pub in_alarm: bool,
    pub armed_stay: bool,
    pub armed: bool,
}

impl PartitionStatus {
    fn from_byte(number: u8, b: u8) -> Self {
        Self {
            number,
            enabled: b & 0x80 != 0,
            stay: b & 0x40 != 0,
            exit_delay: b & 0x20 != 0,
            ready: b & 0x10 != 0,
            alarm_occurred: b & 0x08 != 0,
            in_alarm: b & 0x04 != 0,
            armed_stay: b & 0x02 != 0,
            armed: b & 0x01 != 0,
        }
    }
}

/// Decoded panel status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelStatus {
    pub model: u8,
    pub firmware: (u8, u8, u8),
    pub armed: ArmedState,
    pub zones_in_alarm: bool,
    pub zones_bypassed: bool,
    pub all_zones_closed: bool,
    pub siren: bool,
    pub trouble: bool,
    /// Enabled partitions only
    pub partitions: Vec<PartitionStatus>,
    /// 1-based zone numbers
    pub open_zones: Vec<u16>,
    pub alarm_zones: Vec<u16>,
    pub bypassed_zones: Vec<u16>,
    pub sirens_on: Vec<u16>,
}

/// Bit j of byte i stands for number `1 + j + 8 * i`.
fn bits_to_numbers(octets: &[u8]) -> Vec<u16> {
    let mut out = Vec::new();
    for (i, octet) in octets.iter().enumerate() {
        for j in 0..8 {
            if octet & (1 << j) != 0 {
                out.push((1 + j + i * 8) as u16);
            }
        }
    }
    out
}

impl PanelStatus {
    /// Decode a status response payload.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() < STATUS_MIN_LEN {
            return Err(CodecError::Truncated {
                needed: STATUS_MIN_LEN,
                have: payload.len(),
            });
        }
        let general = payload[GENERAL];
        let armed = match (general >> 5) & 0x03 {
            0x00 => ArmedState::Disarmed,
            0x01 => ArmedState::SomePartitions,
            0x03 => ArmedState::AllPartitions,
            other => ArmedState::Unknown(other),
        };
        let partitions = payload[PARTITIONS..PARTITIONS + PARTITION_SLOTS]
            .iter()
            .enumerate()
            .map(|(n, &b)| PartitionStatus::from_byte(n as u8, b))
            .filter(|p| p.enabled)
            .collect();

        Ok(Self {
            model: payload[MODEL],
            firmware: (
                payload[FIRMWARE],
                payload[FIRMWARE + 1],
                payload[FIRMWARE + 2],
            ),
            armed,
            zones_in_alarm: general & 0x08 != 0,
            zones_bypassed: general & 0x10 != 0,
            all_zones_closed: general & 0x04 != 0,
            siren: general & 0x02 != 0,
            trouble: general & 0x01 != 0,
            partitions,
            open_zones: bits_to_numbers(&payload[OPEN_ZONES..ALARM_ZONES]),
            alarm_zones: bits_to_numbers(&payload[ALARM_ZONES..BYPASSED_ZONES]),
            bypassed_zones: bits_to_numbers(&payload[BYPASSED_ZONES..SIRENS]),
            sirens_on: bits_to_numbers(&payload[SIRENS..SIRENS + 2]),
        })
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

fn list(numbers: &[u16]) -> String {
    numbers
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for PanelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.model == MODEL_AMT8000 {
            writeln!(f, "Panel AMT-8000")?;
        } else {
            writeln!(f, "Panel of unknown model 0x{:02x}", self.model)?;
        }
        let (a, b, c) = self.firmware;
        writeln!(f, "Firmware version {}.{}.{}", a, b, c)?;
        writeln!(f, "General status:")?;
        writeln!(f, "\t{}", self.armed)?;
        writeln!(f, "\tZones in alarm: {}", yes_no(self.zones_in_alarm))?;
        writeln!(f, "\tZones bypassed: {}", yes_no(self.zones_bypassed))?;
        writeln!(f, "\tAll zones closed: {}", yes_no(self.all_zones_closed))?;
        writeln!(f, "\tSiren: {}", yes_no(self.siren))?;
        writeln!(f, "\tTrouble: {}", yes_no(self.trouble))?;
        for p in &self.partitions {
            writeln!(f, "Partition {:02}:", p.number)?;
            writeln!(f, "\tStay: {}", yes_no(p.stay))?;
            writeln!(f, "\tExit delay: {}", yes_no(p.exit_delay))?;
            writeln!(f, "\tReady to arm: {}", yes_no(p.ready))?;
            writeln!(f, "\tAlarm occurred: {}", yes_no(p.alarm_occurred))?;
            writeln!(f, "\tIn alarm: {}", yes_no(p.in_alarm))?;
            writeln!(f, "\tArmed stay: {}", yes_no(p.armed_stay))?;
            writeln!(f, "\tArmed: {}", yes_no(p.armed))?;
        }
        writeln!(f, "Open zones: {}", list(&self.open_zones))?;
        writeln!(f, "Zones in alarm: {}", list(&self.alarm_zones))?;
        writeln!(f, "Bypassed zones: {}", list(&self.bypassed_zones))?;
        write!(f, "Sirens on: {}", list(&self.sirens_on))
    }
}
