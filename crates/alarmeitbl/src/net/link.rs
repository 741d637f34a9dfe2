// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffered non-blocking TCP stream.

use std::io::{self, Read, Write};
use std::net::SocketAddr;

use mio::net::TcpStream;

use crate::reactor::IoState;

/// Bytes moved per read or write syscall.
pub const CHUNK_SIZE: usize = 4096;

/// Reads per dispatch before yielding back to the reactor.
const MAX_READS_PER_DISPATCH: usize = 16;

/// Outcome of draining the socket into the receive buffer.
#[derive(Debug)]
pub enum Received {
    /// New bytes were appended starting at `start`
    Bytes { start: usize, state: IoState },
    /// Nothing to read right now
    Nothing,
    /// Peer closed its side
    Closed,
    /// Socket error
    Failed(io::Error),
}

/// One TCP connection with its send queue and receive accumulator.
pub struct TcpLink {
    stream: TcpStream,
    label: String,
    peer: SocketAddr,
    connecting: bool,
    eof: bool,
    recv_buf: Vec<u8>,
    send_buf: Vec<u8>,
}

impl TcpLink {
    /// Start a non-blocking connect to `addr`.
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::new(stream, format!("client {}", addr), addr, true))
    }

    /// Wrap a stream returned by `accept`.
    pub fn accepted(stream: TcpStream, peer: SocketAddr) -> Self {
        Self::new(stream, peer.to_string(), peer, false)
    }

    fn new(stream: TcpStream, label: String, peer: SocketAddr, connecting: bool) -> Self {
        Self {
            stream,
            label,
            peer,
            connecting,
            eof: false,
            recv_buf: Vec::new(),
            send_buf: Vec::new(),
        }
    }

    /// Log prefix.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Connect still in progress.
    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// Peer already closed its side.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Queue bytes for transmission.
    pub fn send(&mut self, data: &[u8]) {
        self.send_buf.extend_from_slice(data);
    }

    /// Bytes queued but not yet written.
    pub fn pending_send(&self) -> usize {
        self.send_buf.len()
    }

    /// Accumulated received bytes.
    pub fn recv_buf(&self) -> &[u8] {
        &self.recv_buf
    }

    /// Drop `n` bytes from the front of the receive buffer.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.recv_buf.len());
        self.recv_buf.drain(..n);
    }

    /// Drop everything received so far.
    pub fn clear_recv(&mut self) {
        self.recv_buf.clear();
    }

    pub(crate) fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Check whether a pending connect completed.
    ///
    /// `Ok(false)` means the connect is still in progress.
    pub(crate) fn finish_connect(&mut self) -> io::Result<bool> {
        if let Some(e) = self.stream.take_error()? {
            self.connecting = false;
            return Err(e);
        }
        match self.stream.peer_addr() {
            Ok(_) => {
                self.connecting = false;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
            Err(e) => {
                self.connecting = false;
                Err(e)
            }
        }
    }

    /// Read everything available into the receive buffer.
    pub(crate) fn fill(&mut self) -> Received {
        let start = self.recv_buf.len();
        let mut chunk = [0u8; CHUNK_SIZE];
        for _ in 0..MAX_READS_PER_DISPATCH {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    if self.recv_buf.len() > start {
                        // deliver what we have, report EOF on the next call
                        return Received::Bytes {
                            start,
                            state: IoState::StillReady,
                        };
                    }
                    self.eof = true;
                    return Received::Closed;
                }
                Ok(n) => self.recv_buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if self.recv_buf.len() > start {
                        return Received::Bytes {
                            start,
                            state: IoState::Exhausted,
                        };
                    }
                    return Received::Nothing;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    if self.recv_buf.len() > start {
                        return Received::Bytes {
                            start,
                            state: IoState::StillReady,
                        };
                    }
                    return Received::Failed(e);
                }
            }
        }
        Received::Bytes {
            start,
            state: IoState::StillReady,
        }
    }

    /// Write as much of the send queue as the socket takes.
    pub(crate) fn flush(&mut self) -> io::Result<IoState> {
        while !self.send_buf.is_empty() {
            let len = self.send_buf.len().min(CHUNK_SIZE);
            match self.stream.write(&self.send_buf[..len]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.send_buf.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(IoState::Exhausted);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(IoState::StillReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    fn pair() -> (TcpLink, std::net::TcpStream) {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let mut link = TcpLink::connect(addr).unwrap();
        let (peer, _) = server.accept().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !link.finish_connect().unwrap() {
            assert!(Instant::now() < deadline, "connect timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
        (link, peer)
    }

    #[test]
    fn test_connect_label() {
        let (link, _peer) = pair();
        assert!(link.label().starts_with("client 127.0.0.1:"));
        assert!(!link.is_connecting());
    }

    #[test]
    fn test_send_and_fill() {
        let (mut link, mut peer) = pair();
        link.send(&[1, 2, 3]);
        assert_eq!(link.pending_send(), 3);
        let deadline = Instant::now() + Duration::from_secs(5);
        while link.pending_send() > 0 {
            assert!(Instant::now() < deadline);
            link.flush().unwrap();
        }
        let mut got = [0u8; 3];
        peer.read_exact(&mut got).unwrap();
        assert_eq!(got, [1, 2, 3]);

        peer.write_all(&[9, 8]).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match link.fill() {
                Received::Bytes { start, .. } => {
                    assert_eq!(start, 0);
                    break;
                }
                Received::Nothing => {
                    assert!(Instant::now() < deadline);
                    std::thread::sleep(Duration::from_millis(1));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(link.recv_buf(), &[9, 8]);
        link.consume(1);
        assert_eq!(link.recv_buf(), &[8]);
        link.consume(10);
        assert!(link.recv_buf().is_empty());
    }

    #[test]
    fn test_fill_reports_close() {
        let (mut link, peer) = pair();
        drop(peer);
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match link.fill() {
                Received::Closed => break,
                Received::Nothing => {
                    assert!(Instant::now() < deadline);
                    std::thread::sleep(Duration::from_millis(1));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(link.is_eof());
    }
}
