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
use midly::num::{u14, u4, u7};
use midly::{MidiMessage, PitchBend};

/// A raw MIDI message after decoding.
#[derive(Debug, PartialEq)]
pub(super) enum Decoded<'a> {
    Channel { channel: u4, message: MidiMessage },
    SysEx(&'a [u8]),
    /// Unsupported or too short.
    Ignored,
}

fn data(byte: u8) -> u7 {
    u7::from(byte & 0x7f)
}

/// Decodes one message as delivered by the MIDI transport.
///
/// Data bytes are masked to 7 bits and trailing bytes beyond the message length are
/// ignored. Note-on with velocity 0 is returned as note-off. Running status is not
/// supported.
pub(super) fn decode(msg: &[u8]) -> Decoded<'_> {
    let Some(&status) = msg.first() else {
        return Decoded::Ignored;
    };
    if status == 0xf0 {
        return Decoded::SysEx(msg);
    }

    let channel = u4::from(status & 0x0f);
    let needs = |len: usize| msg.len() >= len;
    let message = match status >> 4 {
        0x8 if needs(3) => MidiMessage::NoteOff {
            key: data(msg[1]),
            vel: data(msg[2]),
        },
        0x9 if needs(3) => {
            let key = data(msg[1]);
            let vel = data(msg[2]);
            if vel.as_int() == 0 {
                MidiMessage::NoteOff { key, vel }
            } else {
                MidiMessage::NoteOn { key, vel }
            }
        }
        0xa if needs(3) => MidiMessage::Aftertouch {
            key: data(msg[1]),
            vel: data(msg[2]),
        },
        0xb if needs(3) => MidiMessage::Controller {
            controller: data(msg[1]),
            value: data(msg[2]),
        },
        0xc if needs(2) => MidiMessage::ProgramChange {
            program: data(msg[1]),
        },
        0xd if needs(2) => MidiMessage::ChannelAftertouch { vel: data(msg[1]) },
        // The first data byte holds the low seven bits.
        0xe if needs(3) => MidiMessage::PitchBend {
            bend: PitchBend(u14::from(
                (msg[1] & 0x7f) as u16 | ((msg[2] & 0x7f) as u16) << 7,
            )),
        },
        _ => return Decoded::Ignored,
    };

    Decoded::Channel { channel, message }
}
