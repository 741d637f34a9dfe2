// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Photo fetch queue.
//!
//! Photo-bearing events only announce photos; the sensor needs a while to
//! hand them to the panel, so fetching starts [`PHOTO_FETCH_DELAY`] after
//! enqueueing. At most one download runs at a time, always for the head of
//! the queue.
//!
//! ```text
//!           enqueue                 timer fires, queue not empty
//!   Idle ------------> Scheduled ------------------------------> InFlight
//!    ^                   |  ^                                       |
//!    | timer fires,      |  |          download reported            |
//!    | queue empty       |  +---------------------------------------+
//!    +-------------------+       (head dequeued or retry spent)
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use crate::command::{self, CommandOutput, Credentials, PhotoDownload, Report, SessionStatus};
use crate::config::{PanelAddr, PhotoConfig};
use crate::reactor::{Reactor, TimerId};
use crate::receiver::SharedHooks;

/// Delay between an enqueue (or a finished attempt) and the next fetch.
pub const PHOTO_FETCH_DELAY: Duration = Duration::from_secs(20);

/// Delay used by [`PhotoQueue::fetch_now`].
pub const FETCH_NOW_DELAY: Duration = Duration::from_millis(100);

/// Attempts per photo.
pub const PHOTO_RETRIES: u32 = 10;

/// One photo waiting to be fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoRequest {
    /// Address the event came from
    pub peer: IpAddr,
    pub index: u16,
    pub photo: u8,
    pub retries_left: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePhase {
    Idle,
    Scheduled,
    InFlight,
}

struct QueueState {
    queue: VecDeque<PhotoRequest>,
    phase: QueuePhase,
    timer: Option<TimerId>,
    credentials: Option<Credentials>,
    panel_addr: PanelAddr,
    panel_port: u16,
    folder: PathBuf,
    hooks: SharedHooks,
}

/// Shared handle to the photo queue.
#[derive(Clone)]
pub struct PhotoQueue {
    state: Rc<RefCell<QueueState>>,
}

impl PhotoQueue {
    /// Queue using the given photo settings. Disabled when they carry no
    /// credentials.
    pub fn new(config: &PhotoConfig, hooks: SharedHooks) -> Self {
        Self {
            state: Rc::new(RefCell::new(QueueState {
                queue: VecDeque::new(),
                phase: QueuePhase::Idle,
                timer: None,
                credentials: config.credentials(),
                panel_addr: config.panel_addr,
                panel_port: config.panel_port,
                folder: config.folder.clone(),
                hooks,
            })),
        }
    }

    /// Whether downloads are configured at all.
    pub fn is_enabled(&self) -> bool {
        self.state.borrow().credentials.is_some()
    }

    /// Number of queued photos, including the one in flight.
    pub fn len(&self) -> usize {
        self.state.borrow().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the queue.
    pub fn pending(&self) -> Vec<PhotoRequest> {
        self.state.borrow().queue.iter().cloned().collect()
    }

    /// A download is running.
    pub fn is_in_flight(&self) -> bool {
        self.state.borrow().phase == QueuePhase::InFlight
    }

    /// The fetch timer is armed.
    pub fn is_scheduled(&self) -> bool {
        self.state.borrow().phase == QueuePhase::Scheduled
    }

    /// Queue photo `photo` of event `index` reported by `peer`.
    pub fn enqueue(&self, reactor: &mut Reactor, peer: IpAddr, index: u16, photo: u8) {
        let arm = {
            let mut st = self.state.borrow_mut();
            if st.credentials.is_none() {
                log::debug!("photo download disabled, ignoring {}:{}", index, photo);
                return;
            }
            st.queue.push_back(PhotoRequest {
                peer,
                index,
                photo,
                retries_left: PHOTO_RETRIES,
            });
            log::info!("photo {}:{} queued ({} pending)", index, photo, st.queue.len());
            st.phase == QueuePhase::Idle
        };
        if arm {
            let timer = self.timer(reactor);
            reactor.reset(timer, PHOTO_FETCH_DELAY);
            self.state.borrow_mut().phase = QueuePhase::Scheduled;
        }
    }

    /// Shorten the pending wait. No effect while idle or while a download runs.
    pub fn fetch_now(&self, reactor: &mut Reactor) -> bool {
        let timer = {
            let st = self.state.borrow();
            match (st.phase, st.timer) {
                (QueuePhase::Scheduled, Some(timer)) => timer,
                _ => return false,
            }
        };
        reactor.reset(timer, FETCH_NOW_DELAY)
    }

    fn timer(&self, reactor: &mut Reactor) -> TimerId {
        if let Some(timer) = self.state.borrow().timer {
            return timer;
        }
        let me = self.clone();
        let timer = reactor.create_timer("photo queue", PHOTO_FETCH_DELAY, move |r, _| {
            me.on_fire(r)
        });
        self.state.borrow_mut().timer = Some(timer);
        timer
    }

    fn on_fire(&self, reactor: &mut Reactor) {
        let (addr, credentials, download) = {
            let mut st = self.state.borrow_mut();
            let (head, credentials) = match (st.queue.front().cloned(), st.credentials) {
                (Some(head), Some(credentials)) => (head, credentials),
                _ => {
                    st.phase = QueuePhase::Idle;
                    return;
                }
            };
            let ip = match st.panel_addr {
                PanelAddr::Auto => head.peer,
                PanelAddr::Fixed(ip) => ip,
            };
            st.phase = QueuePhase::InFlight;
            log::info!(
                "fetching photo {}:{} ({} attempts left)",
                head.index,
                head.photo,
                head.retries_left
            );
            (
                SocketAddr::new(ip, st.panel_port),
                credentials,
                PhotoDownload::new(head.index, head.photo, &st.folder),
            )
        };

        let me = self.clone();
        let on_result: command::ResultCallback = Box::new(move |r, report| me.on_result(r, report));
        if let Err(e) = command::start(reactor, addr, credentials, download, on_result) {
            log::warn!("photo download to {} failed to start: {}", addr, e);
            self.on_result(
                reactor,
                Report {
                    status: SessionStatus::Retryable,
                    output: CommandOutput::None,
                },
            );
        }
    }

    fn on_result(&self, reactor: &mut Reactor, report: Report) {
        let (timer, hooks) = {
            let mut st = self.state.borrow_mut();
            match report.status {
                SessionStatus::Success => {
                    st.queue.pop_front();
                }
                SessionStatus::Fatal => {
                    if let Some(head) = st.queue.pop_front() {
                        log::warn!("photo {}:{} dropped after fatal error", head.index, head.photo);
                    }
                }
                SessionStatus::Retryable => {
                    let spent = match st.queue.front_mut() {
                        Some(head) => {
                            head.retries_left = head.retries_left.saturating_sub(1);
                            head.retries_left == 0
                        }
                        None => false,
                    };
                    if spent {
                        if let Some(head) = st.queue.pop_front() {
                            log::warn!("photo {}:{} given up", head.index, head.photo);
                        }
                    }
                }
            }
            st.phase = QueuePhase::Scheduled;
            (st.timer, st.hooks.clone())
        };

        if let CommandOutput::Photo(path) = &report.output {
            hooks.borrow_mut().notify_photo_file(path);
        }
        if let Some(timer) = timer {
            reactor.reset(timer, PHOTO_FETCH_DELAY);
        }
    }
}
