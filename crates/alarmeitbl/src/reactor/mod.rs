// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-threaded reactor.
//!
//! # Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                          Reactor                             |
//! |  +-----------------+   +------------------+   +-----------+  |
//! |  | handler registry|   |    mio::Poll     |   |  Timers   |  |
//! |  |  (BTreeMap)     |<--|  readiness flags |   | (HashMap) |  |
//! |  +-----------------+   +------------------+   +-----------+  |
//! |            |                                        |        |
//! |            v                                        v        |
//! |   read > write > exceptional  ----------------->  timer      |
//! |              exactly one dispatch per cycle                  |
//! +--------------------------------------------------------------+
//! ```
//!
//! mio is edge-triggered; the reactor keeps level semantics by remembering
//! readiness per handler until the handler reports [`IoState::Exhausted`]
//! (it hit `WouldBlock`). Sockets are registered once for both directions
//! and [`Handler::wants_read`] / [`Handler::wants_write`] decide eligibility.
//!
//! A dispatched handler is taken out of the registry for the duration of the
//! call and put back afterwards unless it asked to be destroyed, so handlers
//! can freely spawn, destroy and schedule through their [`Context`].
//! The loop stops when no handler is interested in I/O and no timer is
//! pending.

pub mod timer;

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

pub use timer::{TimerCallback, TimerId, Timers};

/// Maximum events collected per poll
const MAX_EVENTS: usize = 128;

/// Handler identity; doubles as the mio token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

impl HandlerId {
    fn token(self) -> Token {
        Token(self.0 as usize)
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// What a handler's I/O path observed on its descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoState {
    /// The call hit `WouldBlock`; wait for a new readiness event
    Exhausted,
    /// Work may remain; stay eligible for the next cycle
    StillReady,
}

/// An object driven by the reactor.
///
/// All callbacks get a [`Context`] that derefs to the [`Reactor`] and knows
/// the id of the handler being dispatched.
pub trait Handler {
    /// Prefix for log lines.
    fn label(&self) -> &str;

    /// Descriptor to poll, if any.
    fn source(&mut self) -> Option<&mut dyn Source> {
        None
    }

    /// Called once, right after the handler got its id.
    fn on_register(&mut self, _ctx: &mut Context<'_>) {}

    /// Interested in read readiness.
    fn wants_read(&self) -> bool {
        false
    }

    /// Interested in write readiness.
    fn wants_write(&self) -> bool {
        false
    }

    /// Descriptor is readable (or the peer hung up).
    fn on_readable(&mut self, _ctx: &mut Context<'_>) -> IoState {
        IoState::Exhausted
    }

    /// Descriptor is writable (or connect completed).
    fn on_writable(&mut self, _ctx: &mut Context<'_>) -> IoState {
        IoState::Exhausted
    }

    /// Descriptor reported an error condition.
    fn on_exceptional(&mut self, ctx: &mut Context<'_>) {
        log::debug!("{} exceptional condition", self.label());
        ctx.destroy();
    }

    /// An owned timer fired.
    fn on_timer(&mut self, _ctx: &mut Context<'_>, _timer: TimerId) {}

    /// Last call before the handler is dropped. Owned timers are already gone.
    fn on_destroy(&mut self, _reactor: &mut Reactor) {}
}

/// Dispatch context for one handler callback.
pub struct Context<'a> {
    reactor: &'a mut Reactor,
    id: HandlerId,
    destroyed: bool,
}

impl<'a> Context<'a> {
    /// Id of the handler being dispatched.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Ask for the handler to be destroyed once the callback returns.
    pub fn destroy(&mut self) {
        if self.destroyed {
            log::error!("{} destroyed twice", self.id);
            return;
        }
        self.destroyed = true;
    }

    /// Whether [`destroy`](Self::destroy) was already called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Create an unarmed timer owned by this handler.
    pub fn create_timer(&mut self, label: &str, interval: Duration) -> TimerId {
        self.reactor
            .timers
            .create(Some(self.id), label, interval, None)
    }

    /// Create and arm a timer owned by this handler.
    pub fn schedule(&mut self, label: &str, interval: Duration) -> TimerId {
        let t = self.create_timer(label, interval);
        self.reactor.restart(t);
        t
    }
}

impl Deref for Context<'_> {
    type Target = Reactor;

    fn deref(&self) -> &Reactor {
        self.reactor
    }
}

impl DerefMut for Context<'_> {
    fn deref_mut(&mut self) -> &mut Reactor {
        self.reactor
    }
}

struct Slot {
    handler: Box<dyn Handler>,
    readable: bool,
    writable: bool,
    error: bool,
}

impl Slot {
    fn can_read(&self) -> bool {
        self.readable && self.handler.wants_read()
    }

    fn can_write(&self) -> bool {
        self.writable && self.handler.wants_write()
    }

    fn interested(&self) -> bool {
        self.handler.wants_read() || self.handler.wants_write()
    }
}

#[derive(Clone, Copy, Debug)]
enum Dispatch {
    Read,
    Write,
    Exceptional,
}

/// The event loop.
pub struct Reactor {
    poll: Poll,
    events: Events,
    handlers: BTreeMap<HandlerId, Slot>,
    timers: Timers,
    next_handler: u64,
    // handlers currently out of the registry for dispatch, innermost last
    current: Vec<HandlerId>,
    // destroy requests aimed at a `current` handler from outside its context
    doomed: HashSet<HandlerId>,
}

impl Reactor {
    /// Create an empty reactor.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(MAX_EVENTS),
            handlers: BTreeMap::new(),
            timers: Timers::new(),
            next_handler: 1,
            current: Vec::new(),
            doomed: HashSet::new(),
        })
    }

    /// Register a handler and run its `on_register` hook.
    pub fn spawn<H: Handler + 'static>(&mut self, handler: H) -> io::Result<HandlerId> {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;

        let mut handler: Box<dyn Handler> = Box::new(handler);
        if let Some(source) = handler.source() {
            self.poll
                .registry()
                .register(source, id.token(), Interest::READABLE | Interest::WRITABLE)?;
        }
        log::trace!("+ handler {} {}", id, handler.label());

        let slot = Slot {
            handler,
            readable: false,
            writable: false,
            error: false,
        };
        self.with_slot(id, slot, |handler, ctx| handler.on_register(ctx));
        Ok(id)
    }

    /// Destroy a handler from outside its own callbacks.
    ///
    /// Returns false if the id is unknown or already destroyed.
    pub fn destroy(&mut self, id: HandlerId) -> bool {
        if let Some(slot) = self.handlers.remove(&id) {
            self.finalize(id, slot, true);
            return true;
        }
        if self.current.contains(&id) {
            return self.doomed.insert(id);
        }
        log::error!("destroy of unknown handler {}", id);
        false
    }

    /// Whether the handler is still registered.
    pub fn contains(&self, id: HandlerId) -> bool {
        self.handlers.contains_key(&id) || self.current.contains(&id)
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len() + self.current.len()
    }

    // ---------------------------------------------------------------------
    // Timers
    // ---------------------------------------------------------------------

    /// Create and arm a global timer.
    pub fn schedule<F>(&mut self, label: &str, interval: Duration, callback: F) -> TimerId
    where
        F: FnMut(&mut Reactor, TimerId) + 'static,
    {
        let t = self.create_timer(label, interval, callback);
        self.restart(t);
        t
    }

    /// Create an unarmed global timer.
    pub fn create_timer<F>(&mut self, label: &str, interval: Duration, callback: F) -> TimerId
    where
        F: FnMut(&mut Reactor, TimerId) + 'static,
    {
        self.timers
            .create(None, label, interval, Some(Box::new(callback)))
    }

    /// Re-arm a timer with its current interval.
    pub fn restart(&mut self, timer: TimerId) -> bool {
        self.timers.restart(timer, Instant::now())
    }

    /// Re-arm a timer with a new interval.
    pub fn reset(&mut self, timer: TimerId, interval: Duration) -> bool {
        self.timers.reset(timer, interval, Instant::now())
    }

    /// Disarm a timer; false if it was not pending.
    pub fn cancel(&mut self, timer: TimerId) -> bool {
        self.timers.cancel(timer)
    }

    /// Drop a timer entirely.
    pub fn discard(&mut self, timer: TimerId) -> bool {
        self.timers.discard(timer)
    }

    /// Whether a timer is armed.
    pub fn is_pending(&self, timer: TimerId) -> bool {
        self.timers.is_pending(timer)
    }

    /// Time left on an armed timer.
    pub fn remaining(&self, timer: TimerId) -> Option<Duration> {
        self.timers.remaining(timer, Instant::now())
    }

    /// Current interval of a timer.
    pub fn interval(&self, timer: TimerId) -> Option<Duration> {
        self.timers.interval(timer)
    }

    /// Number of armed timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending_count()
    }

    // ---------------------------------------------------------------------
    // Loop
    // ---------------------------------------------------------------------

    /// Run until nothing is left to wait for.
    pub fn run(&mut self) -> io::Result<()> {
        while self.cycle()? {}
        log::debug!("reactor stopped");
        Ok(())
    }

    /// Run one cycle. Returns `Ok(false)` once the reactor is stopped.
    pub fn cycle(&mut self) -> io::Result<bool> {
        self.cycle_bounded(None)
    }

    /// Run cycles until `done` holds or `deadline` passes.
    ///
    /// Returns whether `done` was satisfied.
    pub fn run_until<F>(&mut self, deadline: Instant, mut done: F) -> io::Result<bool>
    where
        F: FnMut(&mut Reactor) -> bool,
    {
        loop {
            if done(self) {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            if !self.cycle_bounded(Some(deadline - now))? {
                return Ok(done(self));
            }
        }
    }

    fn is_stopped(&self) -> bool {
        !self.timers.has_pending() && !self.handlers.values().any(Slot::interested)
    }

    fn has_ready(&self) -> bool {
        self.handlers
            .values()
            .any(|s| s.can_read() || s.can_write() || s.error)
    }

    fn cycle_bounded(&mut self, cap: Option<Duration>) -> io::Result<bool> {
        if self.is_stopped() {
            return Ok(false);
        }

        let timeout = if self.has_ready() {
            Some(Duration::ZERO)
        } else {
            let next = self.timers.next_due().map(|(_, due, label)| {
                let left = due.saturating_duration_since(Instant::now());
                log::trace!("next timeout {:?} ({})", left, label);
                left
            });
            match (next, cap) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            }
        };

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(true),
            Err(e) => return Err(e),
        }

        for event in self.events.iter() {
            let id = HandlerId(event.token().0 as u64);
            if let Some(slot) = self.handlers.get_mut(&id) {
                slot.readable |= event.is_readable() || event.is_read_closed();
                slot.writable |= event.is_writable() || event.is_write_closed();
                slot.error |= event.is_error();
            }
        }

        if let Some((id, what)) = self.pick_ready() {
            self.dispatch_io(id, what);
        } else if let Some(expired) = self.timers.take_due(Instant::now()) {
            log::trace!("! timer {}", expired.label);
            match expired.owner {
                Some(owner) => match self.handlers.remove(&owner) {
                    Some(slot) => {
                        self.with_slot(owner, slot, |h, ctx| h.on_timer(ctx, expired.id));
                    }
                    None => log::error!("timer {} fired for missing {}", expired.label, owner),
                },
                None => {
                    if let Some(mut callback) = self.timers.take_callback(expired.id) {
                        callback(self, expired.id);
                        self.timers.put_callback(expired.id, callback);
                    }
                }
            }
        }
        Ok(true)
    }

    fn pick_ready(&self) -> Option<(HandlerId, Dispatch)> {
        let find = |pred: fn(&Slot) -> bool| {
            self.handlers
                .iter()
                .find(|(_, s)| pred(s))
                .map(|(id, _)| *id)
        };
        find(Slot::can_read)
            .map(|id| (id, Dispatch::Read))
            .or_else(|| find(Slot::can_write).map(|id| (id, Dispatch::Write)))
            .or_else(|| find(|s| s.error).map(|id| (id, Dispatch::Exceptional)))
    }

    fn dispatch_io(&mut self, id: HandlerId, what: Dispatch) {
        let Some(mut slot) = self.handlers.remove(&id) else {
            return;
        };
        self.current.push(id);
        let mut ctx = Context {
            reactor: self,
            id,
            destroyed: false,
        };
        match what {
            Dispatch::Read => {
                if slot.handler.on_readable(&mut ctx) == IoState::Exhausted {
                    slot.readable = false;
                }
            }
            Dispatch::Write => {
                if slot.handler.on_writable(&mut ctx) == IoState::Exhausted {
                    slot.writable = false;
                }
            }
            Dispatch::Exceptional => {
                slot.error = false;
                slot.handler.on_exceptional(&mut ctx);
            }
        }
        let destroyed = ctx.destroyed;
        self.current.pop();
        self.finalize(id, slot, destroyed);
    }

    fn with_slot<F>(&mut self, id: HandlerId, mut slot: Slot, f: F)
    where
        F: FnOnce(&mut dyn Handler, &mut Context<'_>),
    {
        self.current.push(id);
        let mut ctx = Context {
            reactor: self,
            id,
            destroyed: false,
        };
        f(slot.handler.as_mut(), &mut ctx);
        let destroyed = ctx.destroyed;
        self.current.pop();
        self.finalize(id, slot, destroyed);
    }

    fn finalize(&mut self, id: HandlerId, mut slot: Slot, destroyed: bool) {
        let doomed = self.doomed.remove(&id);
        if !(destroyed || doomed) {
            self.handlers.insert(id, slot);
            return;
        }
        let cancelled = self.timers.cancel_owned_by(id);
        if let Some(source) = slot.handler.source() {
            if let Err(e) = self.poll.registry().deregister(source) {
                log::debug!("{} deregister: {}", slot.handler.label(), e);
            }
        }
        log::trace!(
            "- handler {} {} ({} timers)",
            id,
            slot.handler.label(),
            cancelled
        );
        slot.handler.on_destroy(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Ticker {
        log: Log,
        fires: u32,
        limit: u32,
        timer: Option<TimerId>,
    }

    impl Handler for Ticker {
        fn label(&self) -> &str {
            "ticker"
        }

        fn on_register(&mut self, ctx: &mut Context<'_>) {
            self.timer = Some(ctx.schedule("tick", Duration::from_millis(1)));
        }

        fn on_timer(&mut self, ctx: &mut Context<'_>, timer: TimerId) {
            self.fires += 1;
            self.log.borrow_mut().push(format!("tick {}", self.fires));
            if self.fires >= self.limit {
                ctx.destroy();
            } else {
                ctx.restart(timer);
            }
        }

        fn on_destroy(&mut self, _reactor: &mut Reactor) {
            self.log.borrow_mut().push("destroyed".into());
        }
    }

    fn ticker(log: &Log, limit: u32) -> Ticker {
        Ticker {
            log: log.clone(),
            fires: 0,
            limit,
            timer: None,
        }
    }

    #[test]
    fn test_empty_reactor_stops() {
        let mut reactor = Reactor::new().unwrap();
        assert!(!reactor.cycle().unwrap());
        reactor.run().unwrap();
    }

    #[test]
    fn test_owned_timer_fires_until_destroy() {
        let log: Log = Rc::default();
        let mut reactor = Reactor::new().unwrap();
        reactor.spawn(ticker(&log, 3)).unwrap();
        assert_eq!(reactor.handler_count(), 1);
        reactor.run().unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["tick 1", "tick 2", "tick 3", "destroyed"]
        );
        assert_eq!(reactor.handler_count(), 0);
        assert_eq!(reactor.pending_timers(), 0);
    }

    #[test]
    fn test_external_destroy_invalidates_timers() {
        let log: Log = Rc::default();
        let mut reactor = Reactor::new().unwrap();
        let id = reactor.spawn(ticker(&log, 100)).unwrap();
        assert_eq!(reactor.pending_timers(), 1);
        assert!(reactor.destroy(id));
        assert_eq!(reactor.pending_timers(), 0);
        assert!(!reactor.destroy(id));
        assert_eq!(*log.borrow(), vec!["destroyed"]);
        assert!(!reactor.cycle().unwrap());
    }

    #[test]
    fn test_one_timer_per_cycle_in_due_order() {
        let log: Log = Rc::default();
        let mut reactor = Reactor::new().unwrap();
        for (label, ms) in [("slow", 30u64), ("fast", 1), ("mid", 10)] {
            let log = log.clone();
            reactor.schedule(label, Duration::from_millis(ms), move |_, _| {
                log.borrow_mut().push(label.to_string());
            });
        }
        let mut cycles = 0;
        while reactor.cycle().unwrap() {
            cycles += 1;
        }
        assert_eq!(*log.borrow(), vec!["fast", "mid", "slow"]);
        assert!(cycles >= 3);
    }

    #[test]
    fn test_global_timer_can_rearm_itself() {
        let count = Rc::new(RefCell::new(0));
        let mut reactor = Reactor::new().unwrap();
        let c = count.clone();
        let t = reactor.schedule("again", Duration::from_millis(1), move |r, me| {
            *c.borrow_mut() += 1;
            if *c.borrow() < 4 {
                r.restart(me);
            }
        });
        reactor.run().unwrap();
        assert_eq!(*count.borrow(), 4);
        // fired timers stay valid
        assert!(!reactor.is_pending(t));
        assert!(reactor.restart(t));
        assert!(reactor.cancel(t));
        assert!(reactor.discard(t));
        assert!(!reactor.restart(t));
    }

    #[test]
    fn test_fetch_style_reset_shortens_wait() {
        let mut reactor = Reactor::new().unwrap();
        let fired = Rc::new(RefCell::new(false));
        let f = fired.clone();
        let t = reactor.schedule("long", Duration::from_secs(3600), move |_, _| {
            *f.borrow_mut() = true;
        });
        assert!(reactor.remaining(t).unwrap() > Duration::from_secs(3000));
        reactor.reset(t, Duration::from_millis(1));
        let deadline = Instant::now() + Duration::from_secs(5);
        let done = reactor
            .run_until(deadline, |_| *fired.borrow())
            .unwrap();
        assert!(done);
    }

    #[test]
    fn test_run_until_deadline() {
        let mut reactor = Reactor::new().unwrap();
        reactor.schedule("far", Duration::from_secs(3600), |_, _| {});
        let start = Instant::now();
        let done = reactor
            .run_until(start + Duration::from_millis(20), |_| false)
            .unwrap();
        assert!(!done);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    struct Spawner {
        log: Log,
    }

    impl Handler for Spawner {
        fn label(&self) -> &str {
            "spawner"
        }

        fn on_register(&mut self, ctx: &mut Context<'_>) {
            let me = ctx.id();
            let child = ticker(&self.log, 1);
            let child = ctx.spawn(child).unwrap();
            // both are still known while the outer callback runs
            assert!(ctx.contains(me));
            assert!(ctx.contains(child));
            assert_eq!(ctx.handler_count(), 2);
            ctx.destroy();
            // second request is ignored
            ctx.destroy();
        }

        fn on_destroy(&mut self, _reactor: &mut Reactor) {
            self.log.borrow_mut().push("spawner gone".into());
        }
    }

    #[test]
    fn test_spawn_from_callback() {
        let log: Log = Rc::default();
        let mut reactor = Reactor::new().unwrap();
        reactor.spawn(Spawner { log: log.clone() }).unwrap();
        assert_eq!(reactor.handler_count(), 1);
        reactor.run().unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["spawner gone", "tick 1", "destroyed"]
        );
    }
}
