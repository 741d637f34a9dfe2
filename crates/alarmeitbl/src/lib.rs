// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # alarmeitbl - alarm panel receiver and command client
//!
//! Talks the two TCP protocols of Intelbras-style alarm panels:
//!
//! - the **IP receiver** protocol, where panels connect to us and push
//!   Contact-ID events, heartbeats and date/time requests
//! - **ISECNet2**, where we connect to the panel to arm, disarm, query status
//!   or download photos taken by camera sensors
//!
//! Everything runs on one thread, driven by a small [`Reactor`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alarmeitbl::command::{self, ArmDisarm, ArmMode, Credentials};
//! use alarmeitbl::Reactor;
//!
//! fn main() -> alarmeitbl::Result<()> {
//!     let mut reactor = Reactor::new()?;
//!     let credentials = Credentials::parse("1234", 4)?;
//!     command::start(
//!         &mut reactor,
//!         "192.168.0.20:9009".parse().unwrap(),
//!         credentials,
//!         ArmDisarm::new(None, ArmMode::Arm)?,
//!         Box::new(|_reactor, report| println!("{}", report.status)),
//!     )?;
//!     reactor.run()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |  receptorip (bin)                 comandar (bin)            |
//! +-------------------------------------------------------------+
//! |  receiver: Listener -> IngestionSession    command:         |
//! |            PhotoQueue ------------------>  CommandSession   |
//! +-------------------------------------------------------------+
//! |  net: TcpLink / TcpSession / Listener      codec: frames,   |
//! |                                            packets, digits  |
//! +-------------------------------------------------------------+
//! |  reactor: handlers, timers, one dispatch per cycle (mio)    |
//! +-------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`reactor`] - single-threaded event loop and timers
//! - [`net`] - TCP sessions and listener on top of the reactor
//! - [`codec`] - wire formats, checksums, Contact-ID digits
//! - [`command`] - ISECNet2 client sessions
//! - [`receiver`] - IP receiver sessions and alarm events
//! - [`photo_queue`] - deferred photo downloads
//! - [`config`] - receiver configuration file

/// Wire formats of both protocols.
pub mod codec;
/// ISECNet2 command client.
pub mod command;
/// Receiver configuration (TOML).
pub mod config;
/// Library error type.
pub mod error;
/// TCP plumbing on top of the reactor.
pub mod net;
/// Deferred photo downloads.
pub mod photo_queue;
/// Single-threaded event loop.
pub mod reactor;
/// IP receiver.
pub mod receiver;

pub use command::{Credentials, Report, SessionStatus};
pub use config::{ConfigError, ReceiverConfig};
pub use error::{Error, Result};
pub use photo_queue::PhotoQueue;
pub use reactor::{Context, Handler, HandlerId, IoState, Reactor, TimerId};
pub use receiver::{AlarmEvent, Receiver, ReceiverHooks};
