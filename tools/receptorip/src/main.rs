// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IP receiver for alarm panels.
//!
//! Panels configured to report to this host connect, identify themselves and
//! push Contact-ID events. Each event is logged and handed to the configured
//! hook scripts; photos announced by camera sensors are downloaded in the
//! background.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: listen on 0.0.0.0:9010, accept every panel, no hooks
//! receptorip
//!
//! # Using configuration file
//! receptorip --config receptorip.toml
//!
//! # Verbose
//! receptorip --config receptorip.toml --log-level debug
//! ```

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::rc::Rc;
use std::time::Duration;

use alarmeitbl::receiver::{AlarmEvent, Receiver, ReceiverHooks, SharedHooks};
use alarmeitbl::{Reactor, ReceiverConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// How often finished hook processes are collected.
const REAP_INTERVAL: Duration = Duration::from_secs(5);

/// Alarm panel IP receiver
#[derive(Parser, Debug)]
#[command(name = "receptorip")]
#[command(about = "Alarm panel IP receiver - event ingestion, hook scripts and photo download")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured one
    #[arg(long)]
    log_level: Option<String>,
}

/// Hooks backed by external scripts.
struct ScriptHooks {
    config: ReceiverConfig,
    children: Vec<Child>,
}

impl ScriptHooks {
    fn new(config: ReceiverConfig) -> Self {
        Self {
            config,
            children: Vec::new(),
        }
    }

    fn run(&mut self, script: &Path, args: &[String]) {
        self.reap();
        match Command::new(script)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
        {
            Ok(child) => self.children.push(child),
            Err(e) => tracing::warn!("cannot run hook {}: {}", script.display(), e),
        }
    }

    /// Collect hooks that have exited, without waiting for the others.
    fn reap(&mut self) {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    tracing::warn!("hook process {} exited with {}", child.id(), status);
                }
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("hook process {}: {}", child.id(), e);
                false
            }
        });
    }
}

impl ReceiverHooks for ScriptHooks {
    fn is_panel_authorized(&self, id: &str) -> bool {
        self.config.is_authorized(id)
    }

    fn notify(&mut self, event: &AlarmEvent) {
        if let Some(script) = self.config.hooks.event.clone() {
            let args = [
                event.code.to_string(),
                event.partition.to_string(),
                event.zone.to_string(),
                event.qualifier.as_byte().to_string(),
            ];
            self.run(&script, &args);
        }
        if let Some(script) = self.config.hooks.message.clone() {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            self.run(&script, &[format!("{} {}", now, event.message())]);
        }
    }

    fn notify_photo_file(&mut self, path: &Path) {
        if let Some(script) = self.config.hooks.photo.clone() {
            self.run(&script, &[path.display().to_string()]);
        }
    }
}

fn load_config(args: &Args) -> Result<ReceiverConfig, alarmeitbl::ConfigError> {
    let mut config = match args.config {
        Some(ref path) => ReceiverConfig::from_file(path)?,
        None => ReceiverConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize logging
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let hooks = Rc::new(RefCell::new(ScriptHooks::new(config.clone())));
    let shared: SharedHooks = hooks.clone();

    let mut reactor = Reactor::new()?;
    let receiver = Receiver::start(&mut reactor, &config, shared)?;
    reactor.schedule("reap hooks", REAP_INTERVAL, move |r, timer| {
        hooks.borrow_mut().reap();
        r.restart(timer);
    });

    tracing::info!(
        "receptorip v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        receiver.local_addr()
    );
    if config.authorized_panels.is_empty() {
        tracing::warn!("no authorized_panels configured, accepting every panel");
    }

    reactor.run()?;
    Ok(())
}
