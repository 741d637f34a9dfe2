// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Library error type.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the public API.
///
/// Protocol failures inside a running session never show up here; they are
/// reported through [`SessionStatus`](crate::command::SessionStatus).
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid zone {0} (expected 1..=254)")]
    InvalidZone(u16),

    #[error("invalid partition {0} (expected 1..=16)")]
    InvalidPartition(u8),

    #[error("invalid password: {0}")]
    InvalidPassword(String),
}

/// Result alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
