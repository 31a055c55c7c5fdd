// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! System exclusive messages that produce user-visible notifications.

use std::fmt;

const DEVICE_ID: u8 = 0x10;
const BROADCAST_ID: u8 = 0x7f;

const ROLAND: u8 = 0x41;
const ROLAND_SOUND_CANVAS: u8 = 0x45;
const ROLAND_RECEIVE: u8 = 0x12;
const TEXT_INSERT_ADDRESS: u32 = 0x10_0000;

/// Longest text insert kept.
pub const MAX_TEXT: usize = 256;

/// Fixed-size text so posting never allocates.
#[derive(Clone, Copy)]
pub struct TextInsert {
    bytes: [u8; MAX_TEXT],
    len: usize,
}

impl TextInsert {
    fn new(data: &[u8]) -> TextInsert {
        let len = data.len().min(MAX_TEXT);
        let mut bytes = [0; MAX_TEXT];
        bytes[..len].copy_from_slice(&data[..len]);
        TextInsert { bytes, len }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.bytes()).into_owned()
    }
}

impl fmt::Debug for TextInsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextInsert").field(&self.text()).finish()
    }
}

impl PartialEq for TextInsert {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}

/// Messages posted from the real-time thread for the status display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    /// Roland Sound Canvas display text.
    TextInsert(TextInsert),
}

/// Parses a complete `F0 .. F7` message.
pub(super) fn parse(msg: &[u8]) -> Option<Notification> {
    let len = msg.len();
    if len < 4
        || msg[0] != 0xf0
        || msg[len - 1] != 0xf7
        || (msg[2] != DEVICE_ID && msg[2] != BROADCAST_ID)
    {
        return None;
    }

    match msg[1] {
        ROLAND if len >= 10 => {
            let model = msg[3];
            let mode = msg[4];
            let address = u32::from_be_bytes([0, msg[5], msg[6], msg[7]]);
            // Data runs up to the checksum.
            let data = &msg[8..len - 2];
            match (mode, model, address) {
                (ROLAND_RECEIVE, ROLAND_SOUND_CANVAS, TEXT_INSERT_ADDRESS) => {
                    Some(Notification::TextInsert(TextInsert::new(data)))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn text_insert_message(device: u8, text: &[u8]) -> Vec<u8> {
    let mut msg = vec![0xf0, ROLAND, device, ROLAND_SOUND_CANVAS, ROLAND_RECEIVE];
    msg.extend_from_slice(&[0x10, 0x00, 0x00]);
    msg.extend_from_slice(text);
    msg.push(0x00);
    msg.push(0xf7);
    msg
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_text_insert() {
        let Some(Notification::TextInsert(text)) = parse(&text_insert_message(0x10, b"Hello"))
        else {
            panic!("expected a text insert");
        };
        assert_eq!(text.text(), "Hello");

        // Broadcast works too.
        assert!(parse(&text_insert_message(BROADCAST_ID, b"Hi")).is_some());
    }

    #[test]
    fn test_other_device_ignored() {
        assert_eq!(parse(&text_insert_message(0x11, b"Hello")), None);
    }

    #[test]
    fn test_malformed() {
        assert_eq!(parse(&[0xf0, 0x41, 0x10]), None);
        let mut unterminated = text_insert_message(0x10, b"Hello");
        unterminated.pop();
        assert_eq!(parse(&unterminated), None);
        // Roland messages need room for address and checksum.
        assert_eq!(parse(&[0xf0, 0x41, 0x10, 0x45, 0x12, 0xf7]), None);
    }

    #[test]
    fn test_other_address_ignored() {
        let mut msg = text_insert_message(0x10, b"Hello");
        msg[7] = 0x01;
        assert_eq!(parse(&msg), None);
    }

    #[test]
    fn test_text_truncated() {
        let long = vec![b'x'; 400];
        let Some(Notification::TextInsert(text)) = parse(&text_insert_message(0x10, &long)) else {
            panic!("expected a text insert");
        };
        assert_eq!(text.bytes().len(), MAX_TEXT);
    }
}
