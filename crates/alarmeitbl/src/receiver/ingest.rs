// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server side of one panel connection.
//!
//! Frames are not handled as they arrive: a "process" timer consumes one
//! frame per firing, and every consumed long frame doubles the delay until
//! the next one. A panel flooding the receiver is thereby slowed down, and
//! the delay decays again once it goes quiet.

use std::time::Duration;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

use super::backoff::Backoff;
use super::events::AlarmEvent;
use super::hooks::SharedHooks;
use super::ConnectionSlot;
use crate::codec::frame::{classify, frame_len, kind};
use crate::codec::{bcd, encode_long_frame, from_bcd, hexprint, CodecError, IngestFrame, ACK};
use crate::config::TimeoutsConfig;
use crate::net::{StreamProtocol, TcpLink};
use crate::photo_queue::PhotoQueue;
use crate::reactor::{Context, Reactor, TimerId};

/// Time allowed before the panel identifies itself.
pub const IDENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Idle time after which the connection is dropped.
pub const COMM_TIMEOUT: Duration = Duration::from_secs(600);

/// Time a partial frame may sit in the buffer.
pub const INCOMPLETE_TIMEOUT: Duration = Duration::from_secs(60);

/// Identification body: channel, 2 BCD account bytes, 3 MAC bytes, checksum.
const IDENT_LEN: usize = 7;

#[derive(Clone, Copy, Debug)]
struct SessionTimers {
    ident: TimerId,
    comm: TimerId,
    process: TimerId,
    incomplete: TimerId,
    decay: TimerId,
}

/// Reply to a date/time request: `[0x80, yy, mm, dd, dow, hh, mi, ss]` in BCD,
/// day of week counted from Sunday.
pub fn datetime_reply(now: NaiveDateTime) -> Result<Vec<u8>, CodecError> {
    let offset = now.year() - 2000;
    let year = u32::try_from(offset).map_err(|_| CodecError::InvalidBcd(i64::from(offset)))?;
    Ok(vec![
        kind::DATETIME,
        bcd(year)?,
        bcd(now.month())?,
        bcd(now.day())?,
        bcd(now.weekday().num_days_from_sunday())?,
        bcd(now.hour())?,
        bcd(now.minute())?,
        bcd(now.second())?,
    ])
}

/// Protocol state of an accepted panel connection.
pub struct IngestionSession {
    hooks: SharedHooks,
    photos: PhotoQueue,
    slot: ConnectionSlot,
    timeouts: TimeoutsConfig,
    ignored: bool,
    identified: bool,
    backoff: Backoff,
    timers: Option<SessionTimers>,
}

impl IngestionSession {
    pub fn new(
        hooks: SharedHooks,
        photos: PhotoQueue,
        slot: ConnectionSlot,
        timeouts: TimeoutsConfig,
    ) -> Self {
        Self {
            hooks,
            photos,
            slot,
            timeouts,
            ignored: false,
            identified: false,
            backoff: Backoff::new(),
            timers: None,
        }
    }

    /// Consume at most one frame.
    fn process(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, t: SessionTimers) {
        let Some(n) = frame_len(link.recv_buf()) else {
            if !link.recv_buf().is_empty() && !ctx.is_pending(t.incomplete) {
                log::debug!("{} incomplete frame, waiting", link.label());
                ctx.restart(t.incomplete);
            }
            return;
        };

        let raw = link.recv_buf()[..n].to_vec();
        link.consume(n);
        let penalize = self.handle_frame(link, ctx, &raw);
        if ctx.is_destroyed() {
            return;
        }
        if self.ignored {
            link.clear_recv();
        }

        ctx.cancel(t.incomplete);
        if penalize {
            self.backoff.advance();
            let decay = self.backoff.decay_interval();
            ctx.reset(t.decay, decay);
        }
        if !link.recv_buf().is_empty() {
            let delay = self.backoff.current();
            ctx.reset(t.process, delay);
        }
    }

    /// Handle one delimited frame. Returns whether it counts against the pace.
    fn handle_frame(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, raw: &[u8]) -> bool {
        match classify(raw) {
            IngestFrame::Heartbeat => {
                log::debug!("{} heartbeat", link.label());
                link.send(&[ACK]);
                return false;
            }
            IngestFrame::Corrupt(raw) => {
                log::warn!("{} bad checksum, frame {}", link.label(), hexprint(raw));
            }
            IngestFrame::Empty => {
                log::warn!("{} empty frame", link.label());
            }
            IngestFrame::Long { kind: ty, body } => match ty {
                kind::DATETIME => self.datetime(link),
                kind::IDENTIFICATION => self.identification(link, ctx, body),
                kind::EVENT => self.event(link, ctx, body, false),
                kind::EVENT_WITH_PHOTO => self.event(link, ctx, body, true),
                other => {
                    log::warn!(
                        "{} unknown request {:02x}, payload {}",
                        link.label(),
                        other,
                        hexprint(body)
                    );
                    link.send(&[ACK]);
                }
            },
        }
        true
    }

    fn datetime(&mut self, link: &mut TcpLink) {
        log::debug!("{} date/time requested", link.label());
        match datetime_reply(Local::now().naive_local()) {
            Ok(reply) => link.send(&encode_long_frame(&reply)),
            Err(e) => log::error!("{} cannot encode date/time: {}", link.label(), e),
        }
    }

    fn identification(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, body: &[u8]) {
        if body.len() != IDENT_LEN {
            log::warn!(
                "{} identification of unexpected size {}",
                link.label(),
                hexprint(body)
            );
            link.send(&[ACK]);
            return;
        }

        // 'E' ethernet, 'G'/'H' GPRS
        let channel = body[0] as char;
        let account = from_bcd(&body[1..3]);
        let mac = format!("{:02x}:{:02x}:{:02x}", body[3], body[4], body[5]);
        log::info!(
            "{} identification account {} mac {} channel {}",
            link.label(),
            account,
            mac,
            channel
        );

        if !self.hooks.borrow().is_panel_authorized(&mac) {
            log::info!("{} panel {} not authorized, ignoring", link.label(), mac);
            self.ignored = true;
            return;
        }
        // more connections may have been accepted since this one
        if !self.slot.within_limit() {
            log::info!("{} connection limit reached, ignoring", link.label());
            self.ignored = true;
            return;
        }

        self.identified = true;
        if let Some(t) = self.timers {
            ctx.cancel(t.ident);
        }
        link.send(&[ACK]);
    }

    fn event(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, body: &[u8], with_photo: bool) {
        let event = match AlarmEvent::decode(body, with_photo) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("{} malformed event ({}): {}", link.label(), e, hexprint(body));
                link.send(&[ACK]);
                return;
            }
        };

        self.hooks.borrow_mut().notify(&event);
        if event.known {
            log::info!("{} {}", link.label(), event.message());
        } else {
            log::warn!("{} {}", link.label(), event.message());
        }

        if let Some(photo) = event.photo {
            let peer = link.peer().ip();
            for n in 0..photo.count {
                self.photos.enqueue(ctx, peer, photo.index, n);
            }
        }
        link.send(&[ACK]);
    }
}

impl StreamProtocol for IngestionSession {
    fn on_start(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>) {
        log::info!("{} panel connected", link.label());
        self.timers = Some(SessionTimers {
            ident: ctx.schedule("identification", self.timeouts.identification()),
            comm: ctx.schedule("communication", self.timeouts.communication()),
            process: ctx.create_timer("process", self.backoff.current()),
            incomplete: ctx.create_timer("incomplete frame", self.timeouts.incomplete()),
            decay: ctx.create_timer("backoff decay", self.backoff.decay_interval()),
        });
        if !self.slot.within_limit() {
            log::info!("{} connection limit reached, ignoring", link.label());
            self.ignored = true;
        }
    }

    fn on_data(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, latest: &[u8]) {
        if self.ignored {
            link.clear_recv();
            return;
        }
        log::trace!("{} recv {}", link.label(), hexprint(latest));
        let Some(t) = self.timers else {
            return;
        };
        ctx.restart(t.comm);
        if !ctx.is_pending(t.process) {
            let delay = self.backoff.current();
            ctx.reset(t.process, delay);
        }
    }

    fn on_shutdown(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>) {
        log::info!("{} closed by panel", link.label());
        ctx.destroy();
    }

    fn on_timer(&mut self, link: &mut TcpLink, ctx: &mut Context<'_>, timer: TimerId) {
        let Some(t) = self.timers else {
            return;
        };
        if timer == t.process {
            self.process(link, ctx, t);
        } else if timer == t.decay {
            if self.backoff.decay() {
                let decay = self.backoff.decay_interval();
                ctx.reset(t.decay, decay);
            }
        } else if timer == t.ident {
            log::warn!("{} identification timeout", link.label());
            ctx.destroy();
        } else if timer == t.comm {
            log::info!("{} communication timeout", link.label());
            ctx.destroy();
        } else if timer == t.incomplete {
            log::warn!(
                "{} incomplete frame timeout, buffer {}",
                link.label(),
                hexprint(link.recv_buf())
            );
            ctx.destroy();
        }
    }

    fn on_destroy(&mut self, link: &mut TcpLink, _reactor: &mut Reactor) {
        log::info!(
            "{} session ended ({})",
            link.label(),
            if self.identified { "identified" } else { "unidentified" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_datetime_reply() {
        // 2024-03-10 was a Sunday
        let at = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(23, 59, 7)
            .unwrap();
        assert_eq!(
            datetime_reply(at).unwrap(),
            vec![0x80, 0x24, 0x03, 0x10, 0x00, 0x23, 0x59, 0x07]
        );

        let at = NaiveDate::from_ymd_opt(2031, 12, 6)
            .unwrap()
            .and_hms_opt(8, 0, 45)
            .unwrap();
        assert_eq!(
            datetime_reply(at).unwrap(),
            vec![0x80, 0x31, 0x12, 0x06, 0x06, 0x08, 0x00, 0x45]
        );
    }

    #[test]
    fn test_datetime_reply_out_of_range() {
        let at = NaiveDate::from_ymd_opt(1999, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(datetime_reply(at), Err(CodecError::InvalidBcd(-1)));

        let at = NaiveDate::from_ymd_opt(2100, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(datetime_reply(at), Err(CodecError::InvalidBcd(100)));
    }
}
