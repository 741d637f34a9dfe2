// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Loopback helpers shared by the end-to-end tests.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use alarmeitbl::codec::Packet;
use alarmeitbl::Reactor;

/// Upper bound for any single wait.
pub const PATIENCE: Duration = Duration::from_secs(10);

/// Drive the reactor in short slices until `done` holds or [`PATIENCE`] runs out.
pub fn pump_until<F: FnMut() -> bool>(reactor: &mut Reactor, mut done: F) -> bool {
    let end = Instant::now() + PATIENCE;
    while Instant::now() < end {
        if done() {
            return true;
        }
        reactor
            .run_until(Instant::now() + Duration::from_millis(20), |_| false)
            .unwrap();
    }
    done()
}

/// Drive the reactor for `dur`, calling `tick` between slices.
pub fn pump_for<F: FnMut()>(reactor: &mut Reactor, dur: Duration, mut tick: F) {
    let end = Instant::now() + dur;
    while Instant::now() < end {
        tick();
        reactor
            .run_until(Instant::now() + Duration::from_millis(20), |_| false)
            .unwrap();
    }
    tick();
}

/// Append whatever a non-blocking stream has to offer.
pub fn drain(stream: &mut TcpStream, into: &mut Vec<u8>) {
    let mut buf = [0u8; 512];
    while let Ok(n) = stream.read(&mut buf) {
        if n == 0 {
            break;
        }
        into.extend_from_slice(&buf[..n]);
    }
}

/// Blocking read of one ISECNet2 packet (panel side).
pub fn read_packet(stream: &mut TcpStream) -> Packet {
    let mut header = [0u8; 6];
    stream.read_exact(&mut header).unwrap();
    let len = u16::from_be_bytes([header[4], header[5]]) as usize;
    let mut rest = vec![0u8; len + 1];
    stream.read_exact(&mut rest).unwrap();
    let mut wire = header.to_vec();
    wire.extend(rest);
    Packet::decode(&wire).unwrap()
}

/// Send one ISECNet2 packet (panel side).
pub fn send_packet(stream: &mut TcpStream, command: u16, payload: &[u8]) {
    let wire = Packet::new(command, payload.to_vec()).encode();
    stream.write_all(&wire).unwrap();
}

/// Panel-side stream with a read timeout, so a broken test fails instead of hanging.
pub fn panel_stream(stream: TcpStream) -> TcpStream {
    stream.set_read_timeout(Some(PATIENCE)).unwrap();
    stream
}

/// Block until the other side closes the connection (panel side).
pub fn wait_for_close(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => return,
            Err(e) => panic!("waiting for close: {}", e),
        }
    }
}
