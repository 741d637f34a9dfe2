// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listening socket handler.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mio::event::Source;
use mio::net::{TcpListener, TcpStream};
use socket2::{Domain, Protocol, Socket, Type};

use crate::reactor::{Context, Handler, IoState, TimerId};

/// Pending connection backlog.
const BACKLOG: i32 = 128;

/// Wait before accepting again after a resource error (EMFILE and the like).
pub const ACCEPT_RETRY: Duration = Duration::from_secs(1);

/// Errors that concern one pending connection, not the listener.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

/// Accepts connections and hands each one to a factory.
pub struct Listener<F> {
    inner: TcpListener,
    label: String,
    factory: F,
    retry: Option<TimerId>,
}

impl<F> Listener<F>
where
    F: FnMut(&mut Context<'_>, TcpStream, SocketAddr),
{
    /// Bind `addr` with `SO_REUSEADDR` and start listening.
    pub fn bind(addr: SocketAddr, factory: F) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        // allows rapid rebind after restart (TIME_WAIT)
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(BACKLOG)?;
        socket.set_nonblocking(true)?;

        let std_listener: std::net::TcpListener = socket.into();
        let inner = TcpListener::from_std(std_listener);
        let label = format!("listener {}", inner.local_addr()?);
        Ok(Self {
            inner,
            label,
            factory,
            retry: None,
        })
    }

    /// Bound address; useful when binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn accept_one(&mut self, ctx: &mut Context<'_>) -> IoState {
        match self.inner.accept() {
            Ok((stream, peer)) => {
                log::info!("{} accepted {}", self.label, peer);
                (self.factory)(ctx, stream, peer);
                IoState::StillReady
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => IoState::Exhausted,
            Err(e) if is_transient(&e) => {
                log::warn!("{} accept: {}", self.label, e);
                IoState::StillReady
            }
            Err(e) => {
                log::error!("{} accept error: {}, retrying in {:?}", self.label, e, ACCEPT_RETRY);
                let retry = *self
                    .retry
                    .get_or_insert_with(|| ctx.create_timer("accept retry", ACCEPT_RETRY));
                ctx.restart(retry);
                IoState::Exhausted
            }
        }
    }
}

impl<F> Handler for Listener<F>
where
    F: FnMut(&mut Context<'_>, TcpStream, SocketAddr),
{
    fn label(&self) -> &str {
        &self.label
    }

    fn source(&mut self) -> Option<&mut dyn Source> {
        Some(&mut self.inner)
    }

    fn wants_read(&self) -> bool {
        true
    }

    // one connection per dispatch
    fn on_readable(&mut self, ctx: &mut Context<'_>) -> IoState {
        self.accept_one(ctx)
    }

    // no readiness edge is coming for what is already queued, so drain it here
    fn on_timer(&mut self, ctx: &mut Context<'_>, _timer: TimerId) {
        for _ in 0..BACKLOG {
            if self.accept_one(ctx) == IoState::Exhausted {
                break;
            }
        }
    }

    fn on_exceptional(&mut self, _ctx: &mut Context<'_>) {
        log::warn!("{} exceptional condition", self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::Reactor;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_accepts_connections() {
        let accepted = Rc::new(RefCell::new(Vec::new()));
        let acc = accepted.clone();
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), move |_ctx: &mut Context<'_>, _stream, peer| {
            acc.borrow_mut().push(peer);
        })
        .unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(listener.label().starts_with("listener 127.0.0.1:"));

        let mut reactor = Reactor::new().unwrap();
        reactor.spawn(listener).unwrap();

        let c1 = std::net::TcpStream::connect(addr).unwrap();
        let c2 = std::net::TcpStream::connect(addr).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        let done = reactor
            .run_until(deadline, |_| accepted.borrow().len() == 2)
            .unwrap();
        assert!(done);
        let peers = accepted.borrow();
        assert!(peers.contains(&c1.local_addr().unwrap()));
        assert!(peers.contains(&c2.local_addr().unwrap()));
    }

    #[test]
    fn test_transient_accept_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        // EMFILE
        assert!(!is_transient(&io::Error::from_raw_os_error(24)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::WouldBlock)));
    }

    #[test]
    fn test_rebind_after_drop() {
        let first = Listener::bind("127.0.0.1:0".parse().unwrap(), |_: &mut Context<'_>, _, _| {})
            .unwrap();
        let addr = first.local_addr().unwrap();
        drop(first);
        let again = Listener::bind(addr, |_: &mut Context<'_>, _, _| {});
        assert!(again.is_ok());
    }
}
