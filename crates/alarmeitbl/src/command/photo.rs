// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Photo download.
//!
//! The panel serves a photo as numbered fragments. Request payload is
//! `{index:be16, photo:u8, fragment:u8}`; the response echoes them:
//!
//! ```text
//! +-----------+-------+-------------+----------+-------------+------------+
//! | index be16| photo | total photos| fragment | total frags | jpeg bytes |
//! +-----------+-------+-------------+----------+-------------+------------+
//! ```
//!
//! Fragments start at 1 and are requested one at a time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::{Command, CommandOutput, Request, SessionStatus, Step};
use crate::codec::isecnet2::cmd;
use crate::codec::{be16, parse_be16};

/// Response header preceding the JPEG bytes.
const FRAGMENT_HEADER: usize = 6;

/// File name for a photo saved at `at`: `imagem.<index>.<photo>.<secs>.<micros>.jpeg`.
pub fn photo_file_name(index: u16, photo: u8, at: DateTime<Utc>) -> String {
    format!(
        "imagem.{}.{}.{}.{:06}.jpeg",
        index,
        photo,
        at.timestamp(),
        at.timestamp_subsec_micros()
    )
}

/// Fetch one photo of a photo-bearing event and save it under `folder`.
#[derive(Debug)]
pub struct PhotoDownload {
    index: u16,
    photo: u8,
    folder: PathBuf,
    fragment: u8,
    jpeg: Vec<u8>,
    saved: Option<PathBuf>,
}

impl PhotoDownload {
    pub fn new(index: u16, photo: u8, folder: impl AsRef<Path>) -> Self {
        Self {
            index,
            photo,
            folder: folder.as_ref().to_path_buf(),
            fragment: 1,
            jpeg: Vec::new(),
            saved: None,
        }
    }

    fn fragment_request(&self) -> Request {
        let mut payload = be16(self.index).to_vec();
        payload.push(self.photo);
        payload.push(self.fragment);
        Request::new(cmd::PHOTO_FRAGMENT, payload)
    }

    fn save(&mut self) -> Step {
        let path = self
            .folder
            .join(photo_file_name(self.index, self.photo, Utc::now()));
        match std::fs::write(&path, &self.jpeg) {
            Ok(()) => {
                log::info!("photo {}:{} saved to {}", self.index, self.photo, path.display());
                self.saved = Some(path);
                Step::Done
            }
            Err(e) => Step::Failed {
                status: SessionStatus::Fatal,
                reason: format!("cannot write {}: {}", path.display(), e),
            },
        }
    }
}

impl Command for PhotoDownload {
    fn name(&self) -> &str {
        "photo download"
    }

    fn first_request(&mut self) -> Request {
        self.fragment = 1;
        self.jpeg.clear();
        self.fragment_request()
    }

    fn on_response(&mut self, command: u16, payload: &[u8]) -> Step {
        if command != cmd::PHOTO_FRAGMENT {
            return Step::retryable(format!("unexpected response {:04x}", command));
        }
        if payload.len() < FRAGMENT_HEADER {
            return Step::retryable("fragment response too short");
        }
        let index = match parse_be16(payload) {
            Ok(index) => index,
            Err(e) => return Step::retryable(e.to_string()),
        };
        let (photo, fragment, total) = (payload[2], payload[4], payload[5]);
        if index != self.index {
            return Step::retryable(format!("wrong photo index {}", index));
        }
        if photo != self.photo {
            return Step::retryable(format!("wrong photo number {}", photo));
        }
        if fragment != self.fragment {
            return Step::retryable(format!(
                "got fragment {}, expected {}",
                fragment, self.fragment
            ));
        }
        log::debug!("photo {}:{} fragment {}/{}", self.index, self.photo, fragment, total);
        self.jpeg.extend_from_slice(&payload[FRAGMENT_HEADER..]);

        if fragment < total {
            self.fragment = fragment + 1;
            return Step::Send(self.fragment_request());
        }
        self.save()
    }

    fn output(&mut self) -> CommandOutput {
        match self.saved.take() {
            Some(path) => CommandOutput::Photo(path),
            None => CommandOutput::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fragment(index: u16, photo: u8, frag: u8, total: u8, data: &[u8]) -> Vec<u8> {
        let mut p = be16(index).to_vec();
        p.extend_from_slice(&[photo, 1, frag, total]);
        p.extend_from_slice(data);
        p
    }

    #[test]
    fn test_file_name() {
        let at = Utc.timestamp_opt(1_700_000_000, 42_000).unwrap();
        assert_eq!(
            photo_file_name(7, 1, at),
            "imagem.7.1.1700000000.000042.jpeg"
        );
    }

    #[test]
    fn test_reassembly() {
        let dir = tempfile::tempdir().unwrap();
        let mut dl = PhotoDownload::new(0x0102, 0, dir.path());
        assert_eq!(
            dl.first_request(),
            Request::new(cmd::PHOTO_FRAGMENT, vec![0x01, 0x02, 0x00, 0x01])
        );

        let step = dl.on_response(cmd::PHOTO_FRAGMENT, &fragment(0x0102, 0, 1, 3, b"\xff\xd8ab"));
        assert_eq!(
            step,
            Step::Send(Request::new(cmd::PHOTO_FRAGMENT, vec![0x01, 0x02, 0x00, 0x02]))
        );
        let step = dl.on_response(cmd::PHOTO_FRAGMENT, &fragment(0x0102, 0, 2, 3, b"cd"));
        assert!(matches!(step, Step::Send(_)));
        let step = dl.on_response(cmd::PHOTO_FRAGMENT, &fragment(0x0102, 0, 3, 3, b"\xff\xd9"));
        assert_eq!(step, Step::Done);

        let path = match dl.output() {
            CommandOutput::Photo(path) => path,
            other => panic!("unexpected {:?}", other),
        };
        assert!(path.starts_with(dir.path()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("imagem.258.0."));
        assert!(name.ends_with(".jpeg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"\xff\xd8abcd\xff\xd9");
    }

    #[test]
    fn test_out_of_order_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let mut dl = PhotoDownload::new(5, 1, dir.path());
        dl.first_request();
        let step = dl.on_response(cmd::PHOTO_FRAGMENT, &fragment(5, 1, 2, 3, b"x"));
        assert!(matches!(
            step,
            Step::Failed {
                status: SessionStatus::Retryable,
                ..
            }
        ));
    }

    #[test]
    fn test_mismatched_index_and_photo() {
        let dir = tempfile::tempdir().unwrap();
        let mut dl = PhotoDownload::new(5, 1, dir.path());
        dl.first_request();
        assert!(matches!(
            dl.on_response(cmd::PHOTO_FRAGMENT, &fragment(6, 1, 1, 1, b"x")),
            Step::Failed { .. }
        ));
        assert!(matches!(
            dl.on_response(cmd::PHOTO_FRAGMENT, &fragment(5, 2, 1, 1, b"x")),
            Step::Failed { .. }
        ));
        assert!(matches!(
            dl.on_response(cmd::PHOTO_FRAGMENT, &[0, 5, 1]),
            Step::Failed { .. }
        ));
        assert!(matches!(
            dl.on_response(cmd::ACK, &fragment(5, 1, 1, 1, b"x")),
            Step::Failed { .. }
        ));
    }

    #[test]
    fn test_unwritable_folder_is_fatal() {
        let mut dl = PhotoDownload::new(1, 0, "/nonexistent/photos");
        dl.first_request();
        let step = dl.on_response(cmd::PHOTO_FRAGMENT, &fragment(1, 0, 1, 1, b"x"));
        assert!(matches!(
            step,
            Step::Failed {
                status: SessionStatus::Fatal,
                ..
            }
        ));
        assert_eq!(dl.output(), CommandOutput::None);
    }
}
