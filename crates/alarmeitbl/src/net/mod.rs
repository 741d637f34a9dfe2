// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP plumbing on top of the reactor.
//!
//! - [`TcpLink`] - non-blocking stream with send queue and receive buffer
//! - [`TcpSession`] - handler adapting a [`StreamProtocol`] to the reactor
//! - [`Listener`] - accepting socket feeding a session factory

mod link;
mod listener;
mod session;

pub use link::{TcpLink, CHUNK_SIZE};
pub use listener::Listener;
pub use session::{StreamProtocol, TcpSession};
