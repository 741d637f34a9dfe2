// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Send one ISECNet2 command to an alarm panel.
//!
//! # Usage
//!
//! ```bash
//! # Arm every partition
//! comandar 192.168.0.20:9009 123456 6 arm
//!
//! # Disarm partition 2
//! comandar 192.168.0.20:9009 123456 6 disarm 2
//!
//! # Print panel status
//! comandar 192.168.0.20:9009 1234 4 status
//!
//! # Download photo 0 of event 12
//! comandar 192.168.0.20:9009 1234 4 photo 12 0 --folder /tmp
//! ```

use std::cell::RefCell;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::rc::Rc;

use alarmeitbl::command::{
    self, ArmDisarm, ArmMode, ClearTrouble, CommandOutput, Credentials, PhotoDownload,
    ResultCallback, SilenceSiren, StatusQuery, ZoneBypass,
};
use alarmeitbl::{HandlerId, Reactor, Report, SessionStatus};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// ISECNet2 command client
#[derive(Parser, Debug)]
#[command(name = "comandar")]
#[command(about = "Send one command to an alarm panel over ISECNet2")]
#[command(version)]
struct Args {
    /// Panel address (ip:port)
    addr: SocketAddr,

    /// Remote access password
    password: String,

    /// Password length (4 or 6)
    #[arg(value_parser = clap::builder::PossibleValuesParser::new(["4", "6"]))]
    password_len: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Arm a partition, or all of them
    Arm { partition: Option<u8> },

    /// Disarm a partition, or all of them
    Disarm { partition: Option<u8> },

    /// Arm in stay mode
    Stay { partition: Option<u8> },

    /// Turn the siren off
    SirenOff { partition: Option<u8> },

    /// Clear trouble and event memory
    ClearTrouble,

    /// Bypass a zone (1-254)
    Bypass { zone: u16 },

    /// Re-enable a bypassed zone
    Unbypass { zone: u16 },

    /// Print panel status
    Status,

    /// Download one photo of a photo-bearing event
    Photo {
        /// Event index
        index: u16,

        /// Photo number within the event
        photo: u8,

        /// Destination folder
        #[arg(short, long, default_value = ".")]
        folder: PathBuf,
    },
}

/// Start the session for `command`. Argument errors surface before any I/O.
fn start(
    reactor: &mut Reactor,
    addr: SocketAddr,
    credentials: Credentials,
    command: Commands,
    on_result: ResultCallback,
) -> Result<HandlerId, Box<dyn std::error::Error>> {
    let id: io::Result<HandlerId> = match command {
        Commands::Arm { partition } => {
            let cmd = ArmDisarm::new(partition, ArmMode::Arm)?;
            command::start(reactor, addr, credentials, cmd, on_result)
        }
        Commands::Disarm { partition } => {
            let cmd = ArmDisarm::new(partition, ArmMode::Disarm)?;
            command::start(reactor, addr, credentials, cmd, on_result)
        }
        Commands::Stay { partition } => {
            let cmd = ArmDisarm::new(partition, ArmMode::Stay)?;
            command::start(reactor, addr, credentials, cmd, on_result)
        }
        Commands::SirenOff { partition } => {
            let cmd = SilenceSiren::new(partition)?;
            command::start(reactor, addr, credentials, cmd, on_result)
        }
        Commands::ClearTrouble => command::start(reactor, addr, credentials, ClearTrouble, on_result),
        Commands::Bypass { zone } => {
            let cmd = ZoneBypass::new(zone, true)?;
            command::start(reactor, addr, credentials, cmd, on_result)
        }
        Commands::Unbypass { zone } => {
            let cmd = ZoneBypass::new(zone, false)?;
            command::start(reactor, addr, credentials, cmd, on_result)
        }
        Commands::Status => command::start(reactor, addr, credentials, StatusQuery::new(), on_result),
        Commands::Photo {
            index,
            photo,
            folder,
        } => {
            let cmd = PhotoDownload::new(index, photo, folder);
            command::start(reactor, addr, credentials, cmd, on_result)
        }
    };
    Ok(id?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let digits: usize = args.password_len.parse()?;
    let credentials = Credentials::parse(&args.password, digits)?;

    let report: Rc<RefCell<Option<Report>>> = Rc::new(RefCell::new(None));
    let slot = report.clone();
    let on_result: ResultCallback = Box::new(move |_, r| *slot.borrow_mut() = Some(r));

    tracing::info!("sending {:?} to {}", args.command, args.addr);
    let mut reactor = Reactor::new()?;
    start(&mut reactor, args.addr, credentials, args.command, on_result)?;
    reactor.run()?;

    let report = report.borrow_mut().take().ok_or("session ended without a result")?;
    match report.output {
        CommandOutput::Status(status) => print!("{}", status),
        CommandOutput::Photo(path) => println!("{}", path.display()),
        CommandOutput::None => {}
    }
    if report.status != SessionStatus::Success {
        return Err(format!("command failed: {}", report.status).into());
    }
    println!("{}", report.status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arm_all() {
        let args = Args::parse_from(["comandar", "10.0.0.5:9009", "1234", "4", "arm"]);
        assert_eq!(args.addr, "10.0.0.5:9009".parse().unwrap());
        assert_eq!(args.password_len, "4");
        assert_eq!(args.command, Commands::Arm { partition: None });
    }

    #[test]
    fn test_parse_partition_and_zone() {
        let args = Args::parse_from(["comandar", "10.0.0.5:9009", "123456", "6", "disarm", "2"]);
        assert_eq!(args.command, Commands::Disarm { partition: Some(2) });
        let args = Args::parse_from(["comandar", "10.0.0.5:9009", "1234", "4", "bypass", "17"]);
        assert_eq!(args.command, Commands::Bypass { zone: 17 });
        let args = Args::parse_from(["comandar", "10.0.0.5:9009", "1234", "4", "siren-off"]);
        assert_eq!(args.command, Commands::SirenOff { partition: None });
    }

    #[test]
    fn test_reject_password_len() {
        let res = Args::try_parse_from(["comandar", "10.0.0.5:9009", "12345", "5", "status"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_invalid_zone_before_io() {
        let mut reactor = Reactor::new().unwrap();
        let creds = Credentials::new(1234, 4).unwrap();
        let res = start(
            &mut reactor,
            "127.0.0.1:9".parse().unwrap(),
            creds,
            Commands::Bypass { zone: 255 },
            Box::new(|_, _| {}),
        );
        assert!(res.is_err());
        assert_eq!(reactor.handler_count(), 0);
    }
}
