// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IP receiver: panels connect here to push alarm events.
//!
//! [`Receiver::start`] spawns a listener on the reactor; every accepted
//! connection becomes an ingestion session that decodes frames, answers the
//! panel and forwards events to the [`ReceiverHooks`].

pub mod backoff;
pub mod events;
pub mod hooks;
mod ingest;

use std::cell::Cell;
use std::net::SocketAddr;
use std::rc::Rc;

use crate::config::ReceiverConfig;
use crate::error::Result;
use crate::net::{Listener, TcpSession};
use crate::photo_queue::PhotoQueue;
use crate::reactor::{Context, HandlerId, Reactor};

pub use backoff::{Backoff, BACKOFF_MIN, DECAY_MIN};
pub use events::{describe, AlarmEvent, PhotoRef, Qualifier};
pub use hooks::{shared, ReceiverHooks, SharedHooks};
pub use ingest::{datetime_reply, IngestionSession, COMM_TIMEOUT, IDENT_TIMEOUT, INCOMPLETE_TIMEOUT};

/// Live connection counter with an optional ceiling.
#[derive(Clone, Debug)]
pub struct ConnectionGauge {
    live: Rc<Cell<usize>>,
    max: usize,
}

impl ConnectionGauge {
    /// `max == 0` means unlimited.
    pub fn new(max: usize) -> Self {
        Self {
            live: Rc::new(Cell::new(0)),
            max,
        }
    }

    /// Count a new connection until the returned slot is dropped.
    pub fn enter(&self) -> ConnectionSlot {
        self.live.set(self.live.get() + 1);
        ConnectionSlot {
            gauge: self.clone(),
        }
    }

    pub fn live(&self) -> usize {
        self.live.get()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// One counted connection.
#[derive(Debug)]
pub struct ConnectionSlot {
    gauge: ConnectionGauge,
}

impl ConnectionSlot {
    /// Whether the live count, this connection included, is within the ceiling.
    pub fn within_limit(&self) -> bool {
        self.gauge.max == 0 || self.gauge.live() <= self.gauge.max
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        let live = &self.gauge.live;
        live.set(live.get().saturating_sub(1));
    }
}

/// A running receiver.
pub struct Receiver {
    listener: HandlerId,
    local_addr: SocketAddr,
    photos: PhotoQueue,
    gauge: ConnectionGauge,
}

impl Receiver {
    /// Bind the configured address and accept panels on `reactor`.
    pub fn start(reactor: &mut Reactor, config: &ReceiverConfig, hooks: SharedHooks) -> Result<Self> {
        let photos = PhotoQueue::new(&config.photos, hooks.clone());
        let gauge = ConnectionGauge::new(config.max_connections);

        let (q, g, timeouts) = (photos.clone(), gauge.clone(), config.timeouts);
        let listener = Listener::bind(config.listen_addr(), move |ctx: &mut Context<'_>, stream, peer| {
            let session = IngestionSession::new(hooks.clone(), q.clone(), g.enter(), timeouts);
            if let Err(e) = ctx.spawn(TcpSession::accepted(stream, peer, session)) {
                log::error!("cannot register connection from {}: {}", peer, e);
            }
        })?;
        let local_addr = listener.local_addr()?;
        let listener = reactor.spawn(listener)?;
        log::info!(
            "receiver listening on {} (max connections {}, photos {})",
            local_addr,
            config.max_connections,
            if photos.is_enabled() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            listener,
            local_addr,
            photos,
            gauge,
        })
    }

    /// Bound address; useful when the configured port is 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn listener(&self) -> HandlerId {
        self.listener
    }

    pub fn photos(&self) -> &PhotoQueue {
        &self.photos
    }

    /// Panel connections currently open, ignored ones included.
    pub fn active_connections(&self) -> usize {
        self.gauge.live()
    }

    /// Close the listening socket. Open sessions run until they end.
    pub fn stop(&self, reactor: &mut Reactor) -> bool {
        reactor.destroy(self.listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_limit() {
        let gauge = ConnectionGauge::new(2);
        let a = gauge.enter();
        let b = gauge.enter();
        assert!(a.within_limit());
        assert!(b.within_limit());
        let c = gauge.enter();
        assert!(!c.within_limit());
        // earlier slots see the same count
        assert!(!a.within_limit());
        drop(c);
        assert!(a.within_limit());
        assert_eq!(gauge.live(), 2);
        drop(a);
        drop(b);
        assert_eq!(gauge.live(), 0);
    }

    #[test]
    fn test_gauge_unlimited() {
        let gauge = ConnectionGauge::new(0);
        let slots: Vec<_> = (0..50).map(|_| gauge.enter()).collect();
        assert!(slots.iter().all(ConnectionSlot::within_limit));
    }
}
