// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Contact-ID alarm events.
//!
//! Body layout of frame types 0xB0 / 0xB5 (after the type byte):
//!
//! ```text
//! 0      channel
//! 1..5   account            (Contact-ID digits)
//! 5..7   message type       (Contact-ID digits, 18 = Contact-ID)
//! 7      qualifier          (1 = open, 3 = restore)
//! 8..11  event code         (Contact-ID digits)
//! 11..13 partition          (Contact-ID digits)
//! 13..16 zone               (Contact-ID digits)
//! 16     checksum
//! 17..19 photo index be16   (0xB5 only)
//! 19     photo count        (0xB5 only)
//! ```

use std::fmt;

use crate::codec::{decode_contact_id, parse_be16, CodecError};

/// Body length of a plain event.
pub const EVENT_LEN: usize = 17;

/// Body length of an event carrying a photo reference.
pub const EVENT_WITH_PHOTO_LEN: usize = 20;

/// Message type of a proper Contact-ID event.
pub const CONTACT_ID_MESSAGE: u16 = 18;

/// Event qualifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Qualifier {
    /// New event or disarm
    Open,
    /// Restore or arm
    Restore,
    Other(u8),
}

impl Qualifier {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => Qualifier::Open,
            3 => Qualifier::Restore,
            other => Qualifier::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Qualifier::Open => 1,
            Qualifier::Restore => 3,
            Qualifier::Other(b) => b,
        }
    }
}

/// Photos attached to an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhotoRef {
    pub index: u16,
    pub count: u8,
}

/// A decoded alarm event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlarmEvent {
    pub channel: u8,
    pub account: u32,
    pub message_type: u16,
    pub qualifier: Qualifier,
    pub code: u16,
    pub partition: u16,
    pub zone: u16,
    pub photo: Option<PhotoRef>,
    /// Human-readable text
    pub description: String,
    /// Whether the description came from the event table
    pub known: bool,
}

enum Template {
    Any(&'static str),
    OpenRestore {
        open: &'static str,
        restore: &'static str,
    },
}

use Template::{Any, OpenRestore};

fn template(code: u16) -> Option<Template> {
    let t = match code {
        100 => Any("Medical emergency"),
        110 => Any("Fire alarm"),
        120 => Any("Panic"),
        121 => Any("Duress arm/disarm"),
        122 => Any("Silent panic"),
        130 => OpenRestore {
            open: "Zone {zone} triggered",
            restore: "Zone {zone} restored",
        },
        133 => Any("24h zone {zone} triggered"),
        146 => Any("Silent trigger {zone}"),
        301 => OpenRestore {
            open: "AC power lost",
            restore: "AC power restored",
        },
        342 => OpenRestore {
            open: "AC power lost on wireless device {zone}",
            restore: "AC power restored on wireless device {zone}",
        },
        302 => OpenRestore {
            open: "System battery low",
            restore: "System battery recovered",
        },
        305 => Any("System reset"),
        306 => Any("Programming changed"),
        311 => OpenRestore {
            open: "Battery missing",
            restore: "Battery present again",
        },
        351 => OpenRestore {
            open: "Phone line cut",
            restore: "Phone line restored",
        },
        354 => Any("Failed to communicate event"),
        147 => OpenRestore {
            open: "Supervision failure {zone}",
            restore: "Supervision recovered {zone}",
        },
        145 => OpenRestore {
            open: "Expander tamper {zone}",
            restore: "Expander tamper restored {zone}",
        },
        383 => OpenRestore {
            open: "Sensor tamper {zone}",
            restore: "Sensor tamper restored {zone}",
        },
        384 => OpenRestore {
            open: "Low battery on wireless device {zone}",
            restore: "Battery recovered on wireless device {zone}",
        },
        // arming reports restore, disarming reports open
        401 => OpenRestore {
            open: "Manual disarm P{partition}",
            restore: "Manual arm P{partition}",
        },
        403 => OpenRestore {
            open: "Automatic disarm P{partition}",
            restore: "Automatic arm P{partition}",
        },
        404 => OpenRestore {
            open: "Remote disarm P{partition}",
            restore: "Remote arm P{partition}",
        },
        407 => OpenRestore {
            open: "Remote disarm by app P{partition}",
            restore: "Remote arm by app P{partition}",
        },
        408 => Any("One-key arm P{partition}"),
        410 => Any("Remote access"),
        461 => Any("Wrong password"),
        533 => OpenRestore {
            open: "Zone {zone} added",
            restore: "Zone {zone} removed",
        },
        570 => OpenRestore {
            open: "Zone {zone} bypassed",
            restore: "Zone {zone} bypass cancelled",
        },
        602 => Any("Periodic test"),
        621 => Any("Event buffer reset"),
        601 => Any("Manual test"),
        616 => Any("Maintenance request"),
        422 => OpenRestore {
            open: "PGM {zone} on",
            restore: "PGM {zone} off",
        },
        625 => Any("Date and time reset"),
        _ => return None,
    };
    Some(t)
}

/// Table description of a Contact-ID event, if the code/qualifier pair is known.
pub fn describe(code: u16, qualifier: Qualifier, partition: u16, zone: u16) -> Option<String> {
    let text = match (template(code)?, qualifier) {
        (Any(text), _) => text,
        (OpenRestore { open, .. }, Qualifier::Open) => open,
        (OpenRestore { restore, .. }, Qualifier::Restore) => restore,
        (OpenRestore { .. }, Qualifier::Other(_)) => return None,
    };
    Some(
        text.replace("{zone}", &zone.to_string())
            .replace("{partition}", &partition.to_string()),
    )
}

fn digits(body: &[u8]) -> Result<u16, CodecError> {
    Ok(decode_contact_id(body)? as u16)
}

impl AlarmEvent {
    /// Decode the body of a 0xB0 (`with_photo == false`) or 0xB5 frame.
    pub fn decode(body: &[u8], with_photo: bool) -> Result<Self, CodecError> {
        let expected = if with_photo {
            EVENT_WITH_PHOTO_LEN
        } else {
            EVENT_LEN
        };
        if body.len() != expected {
            return Err(CodecError::InvalidLength(body.len()));
        }

        let channel = body[0];
        let account = decode_contact_id(&body[1..5])? as u32;
        let message_type = digits(&body[5..7])?;
        let qualifier = Qualifier::from_byte(body[7]);
        let code = digits(&body[8..11])?;
        let partition = digits(&body[11..13])?;
        let zone = digits(&body[13..16])?;
        // body[16] is the frame checksum; 0xB5 keeps going after it
        let photo = if with_photo {
            Some(PhotoRef {
                index: parse_be16(&body[17..19])?,
                count: body[19],
            })
        } else {
            None
        };

        let known_text = if message_type == CONTACT_ID_MESSAGE {
            describe(code, qualifier, partition, zone)
        } else {
            None
        };
        let known = known_text.is_some();
        let description = known_text.unwrap_or_else(|| {
            format!(
                "Alarm event channel {:02x} contact_id {} type {} qualifier {} code {} partition {} zone {}",
                channel,
                account,
                message_type,
                qualifier.as_byte(),
                code,
                partition,
                zone
            )
        });

        Ok(Self {
            channel,
            account,
            message_type,
            qualifier,
            code,
            partition,
            zone,
            photo,
            description,
            known,
        })
    }

    /// Description plus photo reference, as logged and passed to the message hook.
    pub fn message(&self) -> String {
        match self.photo {
            Some(p) => format!(
                "{} (with photos, i={} n={})",
                self.description, p.index, p.count
            ),
            None => self.description.clone(),
        }
    }
}

impl fmt::Display for AlarmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_contact_id;

    /// Event body as the panel sends it, checksum slot zeroed.
    fn event_body(code: u16, qualifier: u8, partition: u16, zone: u16) -> Vec<u8> {
        let mut b = vec![0x11];
        b.extend(encode_contact_id(1234, 4));
        b.extend(encode_contact_id(18, 2));
        b.push(qualifier);
        b.extend(encode_contact_id(u64::from(code), 3));
        b.extend(encode_contact_id(u64::from(partition), 2));
        b.extend(encode_contact_id(u64::from(zone), 3));
        b.push(0x00);
        b
    }

    #[test]
    fn test_decode_zone_trigger() {
        let ev = AlarmEvent::decode(&event_body(130, 1, 1, 5), false).unwrap();
        assert_eq!(ev.channel, 0x11);
        assert_eq!(ev.account, 1234);
        assert_eq!(ev.message_type, 18);
        assert_eq!(ev.qualifier, Qualifier::Open);
        assert_eq!(ev.code, 130);
        assert_eq!(ev.zone, 5);
        assert!(ev.known);
        assert_eq!(ev.description, "Zone 5 triggered");
        assert_eq!(ev.photo, None);
    }

    #[test]
    fn test_arm_is_restore() {
        let ev = AlarmEvent::decode(&event_body(401, 3, 2, 0), false).unwrap();
        assert_eq!(ev.description, "Manual arm P2");
        let ev = AlarmEvent::decode(&event_body(401, 1, 2, 0), false).unwrap();
        assert_eq!(ev.description, "Manual disarm P2");
    }

    #[test]
    fn test_catch_all_template() {
        assert_eq!(
            describe(602, Qualifier::Other(6), 0, 0).as_deref(),
            Some("Periodic test")
        );
        assert_eq!(describe(130, Qualifier::Other(6), 0, 1), None);
        assert_eq!(describe(999, Qualifier::Open, 0, 1), None);
    }

    #[test]
    fn test_unknown_code_falls_back() {
        let ev = AlarmEvent::decode(&event_body(999, 1, 0, 7), false).unwrap();
        assert!(!ev.known);
        assert!(ev.description.starts_with("Alarm event channel 11 contact_id 1234 type 18"));
        assert!(ev.description.ends_with("code 999 partition 0 zone 7"));
    }

    #[test]
    fn test_non_contact_id_type_is_generic() {
        let mut body = event_body(130, 1, 0, 1);
        body[5..7].copy_from_slice(&encode_contact_id(17, 2));
        let ev = AlarmEvent::decode(&body, false).unwrap();
        assert!(!ev.known);
    }

    #[test]
    fn test_photo_extension() {
        let mut body = event_body(130, 1, 0, 3);
        body.extend_from_slice(&[0x01, 0x02, 0x03]);
        let ev = AlarmEvent::decode(&body, true).unwrap();
        assert_eq!(ev.photo, Some(PhotoRef { index: 0x0102, count: 3 }));
        assert_eq!(ev.message(), "Zone 3 triggered (with photos, i=258 n=3)");
    }

    #[test]
    fn test_bad_length_and_digits() {
        let body = event_body(130, 1, 0, 3);
        assert_eq!(
            AlarmEvent::decode(&body, true),
            Err(CodecError::InvalidLength(EVENT_LEN))
        );
        let mut bad = body.clone();
        bad[9] = 0x0F;
        assert_eq!(
            AlarmEvent::decode(&bad, false),
            Err(CodecError::InvalidDigit(0x0F))
        );
    }
}
