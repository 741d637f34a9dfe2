// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reactor handler wrapping a [`TcpLink`] and a protocol state machine.

use std::io;
use std::net::SocketAddr;

use mio::event::Source;
use mio::net::TcpStream;

use super::link::{Received, TcpLink};
use crate::reactor::{Context, Handler, IoState, Reactor, TimerId};

/// Protocol logic on top of a TCP stream.
///
/// Callbacks receive the link so they can send, inspect or consume the
/// receive buffer. Sending only queues; the session flushes on write
/// readiness.
pub trait StreamProtocol {
    /// Called once after registration.
    fn on_start(&mut self, _link: &mut TcpLink, _ctx: &mut Context<'_>) {}

    /// Outcome of a client connect. The session is destroyed after a failure.
    fn on_connect(&mut self, _link: &mut TcpLink, _ctx: &mut Context<'_>, _result: io::Result<()>) {
    }

    /// New bytes were appended to the receive buffer; `latest` is a copy of them.
    fn on_data(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, latest: &[u8]);

    /// Peer closed its side.
    fn on_shutdown(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>) {
        log::debug!("{} closed by peer", link.label());
        ctx.destroy();
    }

    /// An owned timer fired.
    fn on_timer(&mut self, _link: &mut TcpLink, _ctx: &mut Context<'_>, _timer: TimerId) {}

    /// The session is going away.
    fn on_destroy(&mut self, _link: &mut TcpLink, _reactor: &mut Reactor) {}
}

/// Handler driving a [`StreamProtocol`] over a [`TcpLink`].
pub struct TcpSession<P> {
    link: TcpLink,
    proto: P,
}

impl<P: StreamProtocol> TcpSession<P> {
    /// Client session; connects in the background.
    pub fn connect(addr: SocketAddr, proto: P) -> io::Result<Self> {
        Ok(Self {
            link: TcpLink::connect(addr)?,
            proto,
        })
    }

    /// Server session over an accepted stream.
    pub fn accepted(stream: TcpStream, peer: SocketAddr, proto: P) -> Self {
        Self {
            link: TcpLink::accepted(stream, peer),
            proto,
        }
    }

    fn flush(&mut self, ctx: &mut Context<'_>) -> IoState {
        match self.link.flush() {
            Ok(state) => state,
            Err(e) => {
                log::debug!("{} send failed: {}", self.link.label(), e);
                ctx.destroy();
                IoState::Exhausted
            }
        }
    }
}

impl<P: StreamProtocol> Handler for TcpSession<P> {
    fn label(&self) -> &str {
        self.link.label()
    }

    fn source(&mut self) -> Option<&mut dyn Source> {
        Some(self.link.stream_mut())
    }

    fn on_register(&mut self, ctx: &mut Context<'_>) {
        self.proto.on_start(&mut self.link, ctx);
    }

    fn wants_read(&self) -> bool {
        !self.link.is_connecting() && !self.link.is_eof()
    }

    fn wants_write(&self) -> bool {
        self.link.is_connecting() || self.link.pending_send() > 0
    }

    fn on_readable(&mut self, ctx: &mut Context<'_>) -> IoState {
        match self.link.fill() {
            Received::Bytes { start, state } => {
                let latest = self.link.recv_buf()[start..].to_vec();
                log::trace!("{} received {} bytes", self.link.label(), latest.len());
                self.proto.on_data(&mut self.link, ctx, &latest);
                state
            }
            Received::Nothing => IoState::Exhausted,
            Received::Closed => {
                self.proto.on_shutdown(&mut self.link, ctx);
                IoState::Exhausted
            }
            Received::Failed(e) => {
                log::debug!("{} receive failed: {}", self.link.label(), e);
                ctx.destroy();
                IoState::Exhausted
            }
        }
    }

    fn on_writable(&mut self, ctx: &mut Context<'_>) -> IoState {
        if self.link.is_connecting() {
            match self.link.finish_connect() {
                Ok(false) => return IoState::Exhausted,
                Ok(true) => {
                    log::debug!("{} connected", self.link.label());
                    self.proto.on_connect(&mut self.link, ctx, Ok(()));
                }
                Err(e) => {
                    log::debug!("{} connect failed: {}", self.link.label(), e);
                    self.proto.on_connect(&mut self.link, ctx, Err(e));
                    if !ctx.is_destroyed() {
                        ctx.destroy();
                    }
                    return IoState::Exhausted;
                }
            }
        }
        if ctx.is_destroyed() {
            return IoState::Exhausted;
        }
        self.flush(ctx)
    }

    fn on_timer(&mut self, ctx: &mut Context<'_>, timer: TimerId) {
        self.proto.on_timer(&mut self.link, ctx, timer);
    }

    fn on_destroy(&mut self, reactor: &mut Reactor) {
        self.proto.on_destroy(&mut self.link, reactor);
    }
}
