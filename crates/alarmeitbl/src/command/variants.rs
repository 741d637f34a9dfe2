// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-request commands.

use super::status::PanelStatus;
use super::{Command, CommandOutput, Request, Step};
use crate::codec::isecnet2::cmd;
use crate::error::{Error, Result};

/// Partition byte meaning "all partitions" (or unpartitioned panel).
const ALL_PARTITIONS: u8 = 0xFF;

fn partition_byte(partition: Option<u8>) -> Result<u8> {
    match partition {
        None => Ok(ALL_PARTITIONS),
        Some(p @ 1..=16) => Ok(p),
        Some(p) => Err(Error::InvalidPartition(p)),
    }
}

/// Arming mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmMode {
    Disarm = 0x00,
    Arm = 0x01,
    Stay = 0x02,
}

/// Arm, disarm or arm-stay one partition or all of them.
#[derive(Debug)]
pub struct ArmDisarm {
    partition: u8,
    mode: ArmMode,
}

impl ArmDisarm {
    /// `None` addresses every partition.
    pub fn new(partition: Option<u8>, mode: ArmMode) -> Result<Self> {
        Ok(Self {
            partition: partition_byte(partition)?,
            mode,
        })
    }
}

impl Command for ArmDisarm {
    fn name(&self) -> &str {
        match self.mode {
            ArmMode::Disarm => "disarm",
            ArmMode::Arm => "arm",
            ArmMode::Stay => "arm stay",
        }
    }

    fn first_request(&mut self) -> Request {
        Request::new(cmd::ARM_DISARM, vec![self.partition, self.mode as u8])
    }

    fn on_response(&mut self, _command: u16, _payload: &[u8]) -> Step {
        Step::Done
    }
}

/// Turn the siren off.
#[derive(Debug)]
pub struct SilenceSiren {
    partition: u8,
}

impl SilenceSiren {
    pub fn new(partition: Option<u8>) -> Result<Self> {
        Ok(Self {
            partition: partition_byte(partition)?,
        })
    }
}

impl Command for SilenceSiren {
    fn name(&self) -> &str {
        "silence siren"
    }

    fn first_request(&mut self) -> Request {
        Request::new(cmd::SILENCE_SIREN, vec![self.partition])
    }

    fn on_response(&mut self, _command: u16, _payload: &[u8]) -> Step {
        Step::Done
    }
}

/// Clear trouble and event memory.
#[derive(Debug, Default)]
pub struct ClearTrouble;

impl Command for ClearTrouble {
    fn name(&self) -> &str {
        "clear trouble"
    }

    fn first_request(&mut self) -> Request {
        Request::new(cmd::CLEAR_TROUBLE, Vec::new())
    }

    fn on_response(&mut self, _command: u16, _payload: &[u8]) -> Step {
        Step::Done
    }
}

/// Bypass or re-enable one zone.
#[derive(Debug)]
pub struct ZoneBypass {
    zone: u16,
    bypass: bool,
}

impl ZoneBypass {
    /// Zone numbers are 1-based, up to 254.
    pub fn new(zone: u16, bypass: bool) -> Result<Self> {
        if !(1..=254).contains(&zone) {
            return Err(Error::InvalidZone(zone));
        }
        Ok(Self { zone, bypass })
    }
}

impl Command for ZoneBypass {
    fn name(&self) -> &str {
        if self.bypass {
            "bypass zone"
        } else {
            "unbypass zone"
        }
    }

    fn first_request(&mut self) -> Request {
        let zone = (self.zone - 1) as u8;
        Request::new(cmd::ZONE_BYPASS, vec![zone, u8::from(self.bypass)])
    }

    fn on_response(&mut self, _command: u16, _payload: &[u8]) -> Step {
        Step::Done
    }
}

/// Query the full panel status.
#[derive(Debug, Default)]
pub struct StatusQuery {
    status: Option<PanelStatus>,
}

impl StatusQuery {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for StatusQuery {
    fn name(&self) -> &str {
        "status"
    }

    fn first_request(&mut self) -> Request {
        Request::new(cmd::STATUS, Vec::new())
    }

    fn on_response(&mut self, command: u16, payload: &[u8]) -> Step {
        if command != cmd::STATUS {
            return Step::retryable(format!("status answered with {:04x}", command));
        }
        match PanelStatus::decode(payload) {
            Ok(status) => {
                self.status = Some(status);
                Step::Done
            }
            Err(e) => Step::retryable(format!("status response: {}", e)),
        }
    }

    fn output(&mut self) -> CommandOutput {
        match self.status.take() {
            Some(status) => CommandOutput::Status(status),
            None => CommandOutput::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::STATUS_MIN_LEN;

    #[test]
    fn test_arm_all() {
        let mut c = ArmDisarm::new(None, ArmMode::Arm).unwrap();
        assert_eq!(
            c.first_request(),
            Request::new(cmd::ARM_DISARM, vec![0xFF, 0x01])
        );
        assert_eq!(c.on_response(cmd::ACK, &[]), Step::Done);
        assert_eq!(c.name(), "arm");
    }

    #[test]
    fn test_stay_partition() {
        let mut c = ArmDisarm::new(Some(2), ArmMode::Stay).unwrap();
        assert_eq!(c.first_request().payload, vec![0x02, 0x02]);
        let mut d = ArmDisarm::new(Some(16), ArmMode::Disarm).unwrap();
        assert_eq!(d.first_request().payload, vec![0x10, 0x00]);
    }

    #[test]
    fn test_invalid_partition() {
        assert!(matches!(
            ArmDisarm::new(Some(0), ArmMode::Arm),
            Err(Error::InvalidPartition(0))
        ));
        assert!(matches!(
            SilenceSiren::new(Some(17)),
            Err(Error::InvalidPartition(17))
        ));
    }

    #[test]
    fn test_silence_and_clear() {
        let mut s = SilenceSiren::new(None).unwrap();
        assert_eq!(s.first_request(), Request::new(cmd::SILENCE_SIREN, vec![0xFF]));
        let mut c = ClearTrouble;
        assert_eq!(c.first_request(), Request::new(cmd::CLEAR_TROUBLE, vec![]));
    }

    #[test]
    fn test_zone_bypass_range() {
        assert!(matches!(ZoneBypass::new(0, true), Err(Error::InvalidZone(0))));
        assert!(matches!(ZoneBypass::new(255, true), Err(Error::InvalidZone(255))));
        let mut z = ZoneBypass::new(1, true).unwrap();
        assert_eq!(z.first_request(), Request::new(cmd::ZONE_BYPASS, vec![0, 1]));
        let mut z = ZoneBypass::new(254, false).unwrap();
        assert_eq!(z.first_request().payload, vec![253, 0]);
        assert_eq!(z.name(), "unbypass zone");
    }

    #[test]
    fn test_status_query() {
        let mut q = StatusQuery::new();
        assert_eq!(q.first_request(), Request::new(cmd::STATUS, vec![]));
        assert!(matches!(
            q.on_response(cmd::STATUS, &[0; 4]),
            Step::Failed { .. }
        ));
        assert!(matches!(
            q.on_response(cmd::ACK, &[0; STATUS_MIN_LEN]),
            Step::Failed { .. }
        ));
        assert_eq!(q.output(), CommandOutput::None);
        assert_eq!(q.on_response(cmd::STATUS, &[0; STATUS_MIN_LEN]), Step::Done);
        assert!(matches!(q.output(), CommandOutput::Status(_)));
    }
}
