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
use std::sync::Arc;
use std::time::{Duration, Instant};

use midly::MidiMessage;

use super::decode::{decode, Decoded};
use super::sysex;
use super::ActivePlayer;
use crate::output::OutputBuffers;
use crate::signal::SignalConditioner;

/// The half of the bridge owned by the audio host's real-time thread.
///
/// Neither method ever waits for the player. If the control side holds it, MIDI
/// messages are dropped and audio blocks come out silent.
pub struct Realtime {
    shared: Arc<ActivePlayer>,
    conditioner: SignalConditioner,
}

/// Fraction of the block's real-time duration spent generating it.
pub fn load_ratio(elapsed: Duration, frames: usize, sample_rate: u32) -> f64 {
    elapsed.as_secs_f64() / (frames as f64 / sample_rate as f64)
}

impl Realtime {
    pub(super) fn new(shared: Arc<ActivePlayer>, conditioner: SignalConditioner) -> Realtime {
        Realtime {
            shared,
            conditioner,
        }
    }

    /// Decodes and applies one raw MIDI message.
    pub fn play_midi(&mut self, msg: &[u8]) {
        let decoded = decode(msg);
        if decoded == Decoded::Ignored {
            return;
        }

        let Some(mut player) = self.shared.player.try_lock() else {
            return;
        };

        match decoded {
            Decoded::Channel { channel, message } => {
                player.backend_mut().apply(channel, message);
                self.record(channel.as_int(), message);
            }
            Decoded::SysEx(data) => {
                if let Some(notification) = sysex::parse(data) {
                    // A full queue means nobody is reading; the notification is dropped.
                    let _ = self.shared.notify_tx.try_send(notification);
                }
            }
            Decoded::Ignored => {}
        }
    }

    /// Tracks program, bank and held notes for status readers.
    fn record(&self, channel: u8, message: MidiMessage) {
        let telemetry = &self.shared.telemetry;
        match message {
            MidiMessage::NoteOn { key, .. } => telemetry.record_note_on(channel, key.as_int()),
            MidiMessage::NoteOff { key, .. } => telemetry.record_note_off(channel, key.as_int()),
            MidiMessage::ProgramChange { program } => {
                telemetry.record_program(channel, program.as_int())
            }
            MidiMessage::Controller { controller, value } => match controller.as_int() {
                0 => telemetry.record_bank_msb(channel, value.as_int()),
                32 => telemetry.record_bank_lsb(channel, value.as_int()),
                120 | 123 => telemetry.clear_notes(channel),
                _ => {}
            },
            _ => {}
        }
    }

    /// Renders `frames` frames into `output`, then removes DC and updates levels and load.
    pub fn generate_outputs(&mut self, output: &mut OutputBuffers, frames: usize) {
        let frames = frames.min(output.frames());
        if frames == 0 {
            return;
        }

        let elapsed = {
            let Some(mut player) = self.shared.player.try_lock() else {
                output.silence(frames);
                return;
            };
            let start = Instant::now();
            player.backend_mut().render_block(output, frames);
            start.elapsed()
        };

        let telemetry = &self.shared.telemetry;
        let gain = telemetry.volume() as f64 / 100.0;
        for frame in 0..frames {
            let (left, right) = output.get(frame);
            let ((left, right), _) = self
                .conditioner
                .process(gain * left as f64, gain * right as f64);
            output.set(frame, left as f32, right as f32);
        }

        telemetry.store_levels(self.conditioner.levels());
        telemetry.store_load_ratio(load_ratio(elapsed, frames, self.shared.sample_rate));
    }
}
