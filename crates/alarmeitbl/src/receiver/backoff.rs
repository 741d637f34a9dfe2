// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Processing pace of an ingestion session.

use std::time::Duration;

/// Floor of the processing delay.
pub const BACKOFF_MIN: Duration = Duration::from_millis(125);

/// Shortest quiet period before the delay is halved.
pub const DECAY_MIN: Duration = Duration::from_secs(1);

/// Exponential backoff with decay after quiescence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            current: BACKOFF_MIN,
        }
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before the next processing round.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Double the delay after a consumed frame.
    pub fn advance(&mut self) {
        self.current = self.current.saturating_mul(2);
        log::trace!("backoff raised to {:?}", self.current);
    }

    /// Quiet period after which [`decay`](Self::decay) should run.
    pub fn decay_interval(&self) -> Duration {
        DECAY_MIN.max(self.current.saturating_mul(2))
    }

    /// Halve the delay, floored. Returns whether it is still above the floor.
    pub fn decay(&mut self) -> bool {
        self.current = (self.current / 2).max(BACKOFF_MIN);
        log::trace!("backoff lowered to {:?}", self.current);
        self.current > BACKOFF_MIN
    }
}
