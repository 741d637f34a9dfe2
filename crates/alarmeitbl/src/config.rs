// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver configuration.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! addr = "0.0.0.0"
//! port = 9010
//! max_connections = 5
//! authorized_panels = ["aa:bb:cc"]
//! log_level = "info"
//!
//! [hooks]
//! message = "/usr/local/bin/alarm-message"
//!
//! [photos]
//! panel_addr = "auto"
//! panel_port = 9009
//! password = 123456
//! password_len = 6
//! folder = "/var/lib/alarm/photos"
//!
//! [timeouts]
//! identification_ms = 120000
//! communication_ms = 600000
//! incomplete_ms = 60000
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::Credentials;
use crate::receiver::{COMM_TIMEOUT, IDENT_TIMEOUT, INCOMPLETE_TIMEOUT};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// IP receiver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Listen address.
    #[serde(default = "default_addr")]
    pub addr: IpAddr,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent panel connections (0 = unlimited).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// MAC-like ids allowed to connect; empty allows everyone.
    #[serde(default)]
    pub authorized_panels: Vec<String>,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// External scripts.
    #[serde(default)]
    pub hooks: HooksConfig,

    /// Photo download.
    #[serde(default)]
    pub photos: PhotoConfig,

    /// Panel connection timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

/// Paths of the scripts run on events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Called with a timestamped description of every event.
    pub message: Option<PathBuf>,
    /// Called with `code partition zone qualifier`.
    pub event: Option<PathBuf>,
    /// Called with the path of each downloaded photo.
    pub photo: Option<PathBuf>,
}

/// Where the panel lives when fetching photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelAddr {
    /// Use the address the panel connected from
    Auto,
    /// Fixed address
    #[serde(untagged)]
    Fixed(IpAddr),
}

/// Photo download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoConfig {
    #[serde(default = "default_panel_addr")]
    pub panel_addr: PanelAddr,

    #[serde(default = "default_panel_port")]
    pub panel_port: u16,

    /// Remote access password.
    #[serde(default)]
    pub password: u32,

    /// Password digits: 4 or 6, or 0 to disable photo download.
    #[serde(default)]
    pub password_len: usize,

    /// Destination folder.
    #[serde(default = "default_folder")]
    pub folder: PathBuf,
}

/// Panel connection timeouts, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Time allowed before the panel identifies itself.
    #[serde(default = "default_identification_ms")]
    pub identification_ms: u64,

    /// Idle time after which the connection is dropped.
    #[serde(default = "default_communication_ms")]
    pub communication_ms: u64,

    /// Time a partial frame may sit in the buffer.
    #[serde(default = "default_incomplete_ms")]
    pub incomplete_ms: u64,
}

impl TimeoutsConfig {
    pub fn identification(&self) -> Duration {
        Duration::from_millis(self.identification_ms)
    }

    pub fn communication(&self) -> Duration {
        Duration::from_millis(self.communication_ms)
    }

    pub fn incomplete(&self) -> Duration {
        Duration::from_millis(self.incomplete_ms)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            identification_ms: default_identification_ms(),
            communication_ms: default_communication_ms(),
            incomplete_ms: default_incomplete_ms(),
        }
    }
}

fn default_identification_ms() -> u64 {
    IDENT_TIMEOUT.as_millis() as u64
}

fn default_communication_ms() -> u64 {
    COMM_TIMEOUT.as_millis() as u64
}

fn default_incomplete_ms() -> u64 {
    INCOMPLETE_TIMEOUT.as_millis() as u64
}

fn default_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    9010
}

fn default_max_connections() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_panel_addr() -> PanelAddr {
    PanelAddr::Auto
}

fn default_panel_port() -> u16 {
    9009
}

fn default_folder() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            panel_addr: PanelAddr::Auto,
            panel_port: default_panel_port(),
            password: 0,
            password_len: 0,
            folder: default_folder(),
        }
    }
}

impl PhotoConfig {
    /// Credentials for photo download, `None` when disabled.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.password_len == 0 {
            return None;
        }
        Credentials::new(self.password, self.password_len).ok()
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
            max_connections: default_max_connections(),
            authorized_panels: Vec::new(),
            log_level: default_log_level(),
            hooks: HooksConfig::default(),
            photos: PhotoConfig::default(),
            timeouts: TimeoutsConfig::default(),
        }
    }
}

impl ReceiverConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }

    /// Whether the panel with MAC-like id `id` may connect.
    pub fn is_authorized(&self, id: &str) -> bool {
        self.authorized_panels.is_empty()
            || self
                .authorized_panels
                .iter()
                .any(|p| p.eq_ignore_ascii_case(id))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.photos.password_len {
            0 => {}
            4 | 6 => {
                Credentials::new(self.photos.password, self.photos.password_len)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
            n => {
                return Err(ConfigError::Invalid(format!(
                    "photos.password_len must be 0, 4 or 6 (got {})",
                    n
                )))
            }
        }
        if self.photos.panel_port == 0 {
            return Err(ConfigError::Invalid("photos.panel_port must not be 0".into()));
        }
        let t = &self.timeouts;
        if t.identification_ms == 0 || t.communication_ms == 0 || t.incomplete_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must not be 0".into()));
        }
        for panel in &self.authorized_panels {
            if !is_mac_like(panel) {
                return Err(ConfigError::Invalid(format!(
                    "authorized panel '{}' is not of the form aa:bb:cc",
                    panel
                )));
            }
        }
        Ok(())
    }
}

fn is_mac_like(id: &str) -> bool {
    let parts: Vec<&str> = id.split(':').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}
