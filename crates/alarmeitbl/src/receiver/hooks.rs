// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Integration points of the receiver.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use super::events::AlarmEvent;

/// Collaborator notified by ingestion sessions and the photo queue.
///
/// Called from inside reactor callbacks; implementations must not block.
pub trait ReceiverHooks {
    /// Whether the panel with MAC-like id `id` (`aa:bb:cc`) may talk to us.
    fn is_panel_authorized(&self, _id: &str) -> bool {
        true
    }

    /// A decoded alarm event, known or not.
    fn notify(&mut self, event: &AlarmEvent);

    /// A photo was downloaded to `path`.
    fn notify_photo_file(&mut self, _path: &Path) {}
}

/// Hooks shared between sessions.
pub type SharedHooks = Rc<RefCell<dyn ReceiverHooks>>;

/// Wrap hooks for sharing.
pub fn shared<H: ReceiverHooks + 'static>(hooks: H) -> SharedHooks {
    Rc::new(RefCell::new(hooks))
}
