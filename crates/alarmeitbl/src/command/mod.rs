// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ISECNet2 command client.
//!
//! One [`CommandSession`] connects to the panel, authenticates, runs one
//! [`Command`] (which may take several request/response rounds, as photo
//! download does), says goodbye and reports a [`Report`] exactly once, when
//! the session is destroyed.
//!
//! ```text
//! Connecting --connect--> Authenticating --auth ok--> AwaitingResponse
//!     |                         |                       |    ^
//!     | error                   | NAK / reject          |    | Step::Send
//!     v                         v                       v    |
//!   Closed <------------------------------------ SayingGoodbye (Step::Done)
//! ```
//!
//! A guard timer ([`COMMAND_TIMEOUT`] unless set with
//! [`CommandSession::with_timeout`]) is restarted on every request. When it fires the
//! session is dropped with [`SessionStatus::Retryable`] unless goodbye was
//! already sent.

mod photo;
mod status;
mod variants;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::codec::isecnet2::{cmd, complete_len, nak_reason, Packet};
use crate::codec::hexprint;
use crate::error::{Error, Result};
use crate::net::{StreamProtocol, TcpLink, TcpSession};
use crate::reactor::{Context, HandlerId, Reactor, TimerId};

pub use photo::{photo_file_name, PhotoDownload};
pub use status::{ArmedState, PanelStatus, PartitionStatus, STATUS_MIN_LEN};
pub use variants::{ArmDisarm, ArmMode, ClearTrouble, SilenceSiren, StatusQuery, ZoneBypass};

/// Guard timeout of every protocol step.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Tri-state outcome reported by a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Command executed and goodbye sent
    Success,
    /// Worth trying again later
    Retryable,
    /// Retrying will not help
    Fatal,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Success => write!(f, "success"),
            SessionStatus::Retryable => write!(f, "retryable failure"),
            SessionStatus::Fatal => write!(f, "fatal failure"),
        }
    }
}

/// Data produced by a successful command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutput {
    None,
    Status(PanelStatus),
    Photo(PathBuf),
}

/// What the observer receives when the session ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub status: SessionStatus,
    pub output: CommandOutput,
}

/// Observer called once with the final report.
pub type ResultCallback = Box<dyn FnOnce(&mut Reactor, Report)>;

/// One request of a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub command: u16,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new(command: u16, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }
}

/// What to do after a command response.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Send another request
    Send(Request),
    /// Command complete; say goodbye
    Done,
    /// Give up
    Failed {
        status: SessionStatus,
        reason: String,
    },
}

impl Step {
    /// Non-fatal failure.
    pub fn retryable(reason: impl Into<String>) -> Self {
        Step::Failed {
            status: SessionStatus::Retryable,
            reason: reason.into(),
        }
    }
}

/// Command-specific part of a session.
pub trait Command {
    /// For log lines.
    fn name(&self) -> &str;

    /// Request sent right after authentication.
    fn first_request(&mut self) -> Request;

    /// Interpret the response to the last request. `command` is either the
    /// code just sent or the generic acknowledgement.
    fn on_response(&mut self, command: u16, payload: &[u8]) -> Step;

    /// Result of a successful run.
    fn output(&mut self) -> CommandOutput {
        CommandOutput::None
    }
}

/// Remote access password.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    password: u32,
    digits: usize,
}

impl Credentials {
    /// Password of 4 or 6 digits.
    pub fn new(password: u32, digits: usize) -> Result<Self> {
        if digits != 4 && digits != 6 {
            return Err(Error::InvalidPassword(format!(
                "length must be 4 or 6, got {}",
                digits
            )));
        }
        if u64::from(password) >= 10u64.pow(digits as u32) {
            return Err(Error::InvalidPassword(format!(
                "more than {} digits",
                digits
            )));
        }
        Ok(Self { password, digits })
    }

    /// Parse a decimal password string; its length must match `digits`.
    pub fn parse(text: &str, digits: usize) -> Result<Self> {
        if text.len() != digits || !text.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidPassword(format!(
                "expected {} decimal digits",
                digits
            )));
        }
        let password = text
            .parse()
            .map_err(|_| Error::InvalidPassword("not a number".into()))?;
        Self::new(password, digits)
    }

    /// Number of digits.
    pub fn digits(&self) -> usize {
        self.digits
    }

    fn auth_packet(&self) -> Packet {
        Packet::auth(self.password, self.digits)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"***")
            .field("digits", &self.digits)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Connecting,
    Authenticating,
    AwaitingResponse { command: u16 },
    SayingGoodbye,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Connecting => write!(f, "connecting"),
            Phase::Authenticating => write!(f, "authenticating"),
            Phase::AwaitingResponse { command } => write!(f, "awaiting {:04x}", command),
            Phase::SayingGoodbye => write!(f, "saying goodbye"),
            Phase::Closed => write!(f, "closed"),
        }
    }
}

/// Protocol driver for one command over one connection.
pub struct CommandSession<C> {
    command: C,
    credentials: Credentials,
    phase: Phase,
    status: SessionStatus,
    timeout: Duration,
    guard: Option<TimerId>,
    on_result: Option<ResultCallback>,
}

/// Connect to the panel at `addr` and run `command`.
///
/// `on_result` is called exactly once unless the connect attempt fails
/// synchronously, in which case the error is returned instead.
pub fn start<C: Command + 'static>(
    reactor: &mut Reactor,
    addr: SocketAddr,
    credentials: Credentials,
    command: C,
    on_result: ResultCallback,
) -> io::Result<HandlerId> {
    let session = CommandSession::new(command, credentials, on_result);
    reactor.spawn(TcpSession::connect(addr, session)?)
}

impl<C: Command> CommandSession<C> {
    pub fn new(command: C, credentials: Credentials, on_result: ResultCallback) -> Self {
        Self {
            command,
            credentials,
            phase: Phase::Connecting,
            status: SessionStatus::Retryable,
            timeout: COMMAND_TIMEOUT,
            guard: None,
            on_result: Some(on_result),
        }
    }

    /// Guard timeout per step instead of [`COMMAND_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn send(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, packet: Packet) {
        let wire = packet.encode();
        log::trace!("{} send {}", link.label(), hexprint(&wire));
        link.send(&wire);
        if let Some(guard) = self.guard {
            ctx.restart(guard);
        }
    }

    fn fail(&mut self, link: &TcpLink, ctx: &mut Context<'_>, status: SessionStatus, reason: &str) {
        log::warn!("{} {}: {} ({})", link.label(), self.command.name(), reason, self.phase);
        self.status = status;
        self.phase = Phase::Closed;
        ctx.destroy();
    }

    fn nak(&mut self, link: &TcpLink, ctx: &mut Context<'_>, payload: &[u8]) {
        let reason = match payload {
            [code] => format!("NAK {:02x} {}", code, nak_reason(*code)),
            _ => format!("malformed NAK {}", hexprint(payload)),
        };
        self.fail(link, ctx, SessionStatus::Retryable, &reason);
    }

    fn goodbye(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>) {
        log::debug!("{} {} done, saying goodbye", link.label(), self.command.name());
        self.send(link, ctx, Packet::bye());
        self.status = SessionStatus::Success;
        self.phase = Phase::SayingGoodbye;
    }

    fn request(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, req: Request) {
        self.phase = Phase::AwaitingResponse {
            command: req.command,
        };
        self.send(link, ctx, Packet::new(req.command, req.payload));
    }

    fn on_auth_response(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, pkt: Packet) {
        if pkt.command == cmd::NAK {
            return self.nak(link, ctx, &pkt.payload);
        }
        if pkt.command != cmd::AUTH {
            let reason = format!("unexpected auth response {:04x}", pkt.command);
            return self.fail(link, ctx, SessionStatus::Retryable, &reason);
        }
        match pkt.payload.as_slice() {
            [0] => {
                log::debug!("{} authenticated", link.label());
                let req = self.command.first_request();
                self.request(link, ctx, req);
            }
            [code] => {
                let reason = match code {
                    1 => "wrong password",
                    2 => "wrong software version",
                    3 => "panel will call back",
                    4 => "waiting for user permission",
                    _ => "unknown reason",
                };
                let reason = format!("authentication rejected: {} ({})", reason, code);
                self.fail(link, ctx, SessionStatus::Fatal, &reason);
            }
            _ => self.fail(link, ctx, SessionStatus::Retryable, "invalid auth response"),
        }
    }

    fn on_command_response(
        &mut self,
        link: &mut TcpLink,
        ctx: &mut Context<'_>,
        sent: u16,
        pkt: Packet,
    ) {
        match pkt.command {
            cmd::NAK => return self.nak(link, ctx, &pkt.payload),
            cmd::BUSY => return self.fail(link, ctx, SessionStatus::Retryable, "panel busy"),
            c if c != sent && c != cmd::ACK => {
                let reason = format!("unexpected response {:04x}", c);
                return self.fail(link, ctx, SessionStatus::Retryable, &reason);
            }
            _ => {}
        }
        match self.command.on_response(pkt.command, &pkt.payload) {
            Step::Send(req) => self.request(link, ctx, req),
            Step::Done => self.goodbye(link, ctx),
            Step::Failed { status, reason } => self.fail(link, ctx, status, &reason),
        }
    }
}

impl<C: Command> StreamProtocol for CommandSession<C> {
    fn on_start(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>) {
        log::debug!("{} {} starting", link.label(), self.command.name());
        self.guard = Some(ctx.schedule("command guard", self.timeout));
    }

    fn on_connect(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, result: io::Result<()>) {
        match result {
            Ok(()) => {
                self.phase = Phase::Authenticating;
                let auth = self.credentials.auth_packet();
                self.send(link, ctx, auth);
            }
            Err(e) => {
                log::warn!("{} connect failed: {}", link.label(), e);
                self.status = SessionStatus::Retryable;
                self.phase = Phase::Closed;
            }
        }
    }

    fn on_data(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, _latest: &[u8]) {
        while !ctx.is_destroyed() {
            let len = complete_len(link.recv_buf());
            if len == 0 {
                break;
            }
            let raw = link.recv_buf()[..len].to_vec();
            link.consume(len);
            log::trace!("{} recv {}", link.label(), hexprint(&raw));

            let pkt = match Packet::decode(&raw) {
                Ok(pkt) => pkt,
                Err(e) => {
                    let reason = format!("bad packet: {}", e);
                    self.fail(link, ctx, SessionStatus::Retryable, &reason);
                    break;
                }
            };
            log::debug!("{} response {:04x}", link.label(), pkt.command);

            match self.phase {
                Phase::Authenticating => self.on_auth_response(link, ctx, pkt),
                Phase::AwaitingResponse { command } => {
                    self.on_command_response(link, ctx, command, pkt)
                }
                Phase::SayingGoodbye => {
                    log::debug!("{} ignoring {:04x} after goodbye", link.label(), pkt.command);
                }
                Phase::Connecting | Phase::Closed => {
                    self.fail(link, ctx, SessionStatus::Retryable, "unsolicited packet");
                }
            }
        }
    }

    fn on_shutdown(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>) {
        if self.status == SessionStatus::Success {
            log::debug!("{} panel closed connection", link.label());
        } else {
            log::warn!("{} connection closed by panel ({})", link.label(), self.phase);
        }
        self.phase = Phase::Closed;
        ctx.destroy();
    }

    fn on_timer(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, _timer: TimerId) {
        if self.status == SessionStatus::Success {
            log::debug!("{} goodbye timeout", link.label());
        } else {
            log::warn!("{} timeout ({})", link.label(), self.phase);
            self.status = SessionStatus::Retryable;
        }
        self.phase = Phase::Closed;
        ctx.destroy();
    }

    fn on_destroy(&mut self, link: &mut TcpLink, reactor: &mut Reactor) {
        let output = match self.status {
            SessionStatus::Success => self.command.output(),
            _ => CommandOutput::None,
        };
        log::info!("{} {}: {}", link.label(), self.command.name(), self.status);
        if let Some(on_result) = self.on_result.take() {
            on_result(
                reactor,
                Report {
                    status: self.status,
                    output,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials() {
        assert!(Credentials::new(1234, 4).is_ok());
        assert!(Credentials::new(123456, 6).is_ok());
        assert!(Credentials::new(0, 4).is_ok());
        assert!(matches!(
            Credentials::new(1234, 5),
            Err(Error::InvalidPassword(_))
        ));
        assert!(matches!(
            Credentials::new(12345, 4),
            Err(Error::InvalidPassword(_))
        ));
    }

    #[test]
    fn test_credentials_parse() {
        assert_eq!(Credentials::parse("0042", 4).unwrap(), Credentials::new(42, 4).unwrap());
        assert!(Credentials::parse("42", 4).is_err());
        assert!(Credentials::parse("12a4", 4).is_err());
        assert!(Credentials::parse("+123", 4).is_err());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let text = format!("{:?}", Credentials::new(9876, 4).unwrap());
        assert!(!text.contains("9876"));
    }

    #[test]
    fn test_auth_packet() {
        let wire = Credentials::new(1234, 4).unwrap().auth_packet().encode();
        assert_eq!(&wire[8..14], &[0x02, 0x01, 0x02, 0x03, 0x04, 0x10]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SessionStatus::Retryable.to_string(), "retryable failure");
        assert_eq!(
            Phase::AwaitingResponse { command: 0x401E }.to_string(),
            "awaiting 401e"
        );
    }
}
