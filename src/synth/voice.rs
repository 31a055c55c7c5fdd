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
use std::f32::consts::{LN_10, LN_2};

use super::channel::Channel;
use super::envelope::{Envelope, Stage};
use super::waveform::Emulator;
use crate::bank::{Patch, SILENCE_DB};

/// Phase deviation in cycles produced by a full scale modulator.
const MODULATION_INDEX: f32 = 1.0;

/// Vibrato depth reached by the modulation wheel or aftertouch at full scale, in cents.
const CONTROLLER_VIBRATO_CENTS: f32 = 50.0;

#[inline]
fn db_to_gain(db: f32) -> f32 {
    (-db * LN_10 / 20.0).exp()
}

fn cents_to_ratio_offset(cents: f32) -> f32 {
    (cents * LN_2 / 1200.0).exp() - 1.0
}

fn key_frequency(key: f32) -> f32 {
    440.0 * ((key - 69.0) / 12.0).exp2()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,
    /// Key is down.
    Held,
    /// Key is up but the sustain pedal keeps the note sounding.
    Sustained,
    Released,
}

#[derive(Debug, Clone, Copy, Default)]
struct Operator {
    /// Cycles, in [0, 1).
    phase: f32,
    /// Cycles per sample at the current pitch.
    increment: f32,
    envelope: Envelope,
    /// Static attenuation: patch level plus velocity for carriers.
    level: f32,
    /// Last two outputs, for self-feedback.
    history: [f32; 2],
}

/// One sounding note on one chip channel.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    patch: Patch,
    channel: u8,
    note: u8,
    key: f32,
    state: VoiceState,
    /// Allocation order, for stealing.
    age: u64,
    aftertouch: u8,
    operators: [Operator; 4],
    left_gain: f32,
    right_gain: f32,
    patch_vibrato: f32,
    controller_vibrato: f32,
    tremolo_db: f32,
}

impl Default for Voice {
    fn default() -> Self {
        Voice {
            patch: Patch::default(),
            channel: 0,
            note: 0,
            key: 0.0,
            state: VoiceState::Free,
            age: 0,
            aftertouch: 0,
            operators: [Operator::default(); 4],
            left_gain: 0.0,
            right_gain: 0.0,
            patch_vibrato: 0.0,
            controller_vibrato: 0.0,
            tremolo_db: 0.0,
        }
    }
}

impl Voice {
    /// Starts sounding `patch`. Retriggering a sounding voice keeps its phases.
    pub fn start(
        &mut self,
        channel: u8,
        note: u8,
        key: u8,
        velocity: u8,
        patch: &Patch,
        sample_rate: f32,
        age: u64,
    ) {
        let fresh = self.state == VoiceState::Free;
        self.patch = *patch;
        self.channel = channel;
        self.note = note;
        self.key = key as f32;
        self.state = VoiceState::Held;
        self.age = age;
        self.aftertouch = 0;

        let velocity_db = -40.0 * (velocity.max(1) as f32 / 127.0).log10();
        let used = patch.routing.operators as usize;
        for (index, operator) in self.operators.iter_mut().enumerate() {
            let settings = &patch.operators[index];
            if fresh {
                operator.phase = 0.0;
                operator.history = [0.0; 2];
            }
            if index >= used {
                operator.envelope.kill();
                continue;
            }
            operator.level = settings.attenuation;
            if patch.routing.carriers & (1 << index) != 0 {
                operator.level += velocity_db;
            }
            operator.envelope.key_on(settings, sample_rate);
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn is_active(&self) -> bool {
        self.state != VoiceState::Free
    }

    pub fn set_aftertouch(&mut self, value: u8) {
        self.aftertouch = value;
    }

    /// Key up while the sustain pedal is down.
    pub fn sustain(&mut self) {
        if self.state == VoiceState::Held {
            self.state = VoiceState::Sustained;
        }
    }

    pub fn release(&mut self) {
        if self.is_active() {
            self.state = VoiceState::Released;
            for operator in self.operators.iter_mut() {
                operator.envelope.key_off();
            }
        }
    }

    pub fn kill(&mut self) {
        self.state = VoiceState::Free;
        for operator in self.operators.iter_mut() {
            operator.envelope.kill();
            operator.history = [0.0; 2];
        }
    }

    /// Loudest carrier level in dB below full scale. Free voices report silence.
    pub fn attenuation(&self) -> f32 {
        if !self.is_active() {
            return SILENCE_DB;
        }
        self.carriers()
            .map(|index| {
                let operator = &self.operators[index];
                operator.envelope.attenuation() + operator.level
            })
            .fold(SILENCE_DB, f32::min)
    }

    fn carriers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.patch.routing.operators as usize)
            .filter(move |index| self.patch.routing.carriers & (1 << index) != 0)
    }

    /// Recomputes pitch and gain from the channel. Called once per rendered block.
    pub fn prepare(&mut self, channel: &Channel, sample_rate: f32, deep_lfo: (bool, bool)) {
        let (deep_tremolo, deep_vibrato) = deep_lfo;
        for (index, operator) in self.operators.iter_mut().enumerate() {
            let pair = index / 2;
            let mut key = self.key + self.patch.note_offset[pair] as f32 + channel.bend;
            if pair == 1 {
                key += self.patch.second_pair_detune;
            }
            let frequency = key_frequency(key) * self.patch.operators[index].multiple;
            operator.increment = frequency / sample_rate;
        }

        let gain = channel.gain();
        let (left, right) = channel.pan_gains();
        self.left_gain = gain * left;
        self.right_gain = gain * right;

        self.patch_vibrato = cents_to_ratio_offset(if deep_vibrato { 14.0 } else { 7.0 });
        let controller = channel.modulation as f32 / 127.0
            + channel.aftertouch.max(self.aftertouch) as f32 / 127.0;
        self.controller_vibrato = cents_to_ratio_offset(controller * CONTROLLER_VIBRATO_CENTS);
        self.tremolo_db = if deep_tremolo { 4.8 } else { 1.0 };
    }

    /// Renders one stereo sample. `tremolo` is in [0, 1] and `vibrato` in [-1, 1].
    #[inline]
    pub fn tick(&mut self, emulator: Emulator, tremolo: f32, vibrato: f32) -> (f32, f32) {
        let routing = self.patch.routing;
        let mut outputs = [0.0f32; 4];
        let mut sum = 0.0;
        let mut sounding = false;

        for index in 0..routing.operators as usize {
            let settings = &self.patch.operators[index];
            let operator = &mut self.operators[index];

            let mut attenuation = operator.envelope.tick() + operator.level;
            if settings.tremolo {
                attenuation += self.tremolo_db * tremolo;
            }

            let mut modulation = 0.0;
            for (source, output) in outputs.iter().enumerate().take(index) {
                if routing.modulators[index] & (1 << source) != 0 {
                    modulation += output;
                }
            }
            let feedback = match index {
                0 => self.patch.feedback[0],
                2 => self.patch.feedback[1],
                _ => 0.0,
            };
            if feedback != 0.0 {
                modulation += feedback * (operator.history[0] + operator.history[1]) * 0.5;
            }

            let mut depth = self.controller_vibrato;
            if settings.vibrato {
                depth += self.patch_vibrato;
            }
            operator.phase += operator.increment * (1.0 + depth * vibrato);
            if operator.phase >= 1.0 {
                operator.phase -= operator.phase.floor();
            }

            let output = if attenuation >= SILENCE_DB {
                0.0
            } else {
                emulator.wave(
                    settings.waveform,
                    operator.phase + modulation * MODULATION_INDEX,
                ) * db_to_gain(attenuation)
            };
            operator.history = [operator.history[1], output];
            outputs[index] = output;

            if routing.carriers & (1 << index) != 0 {
                sum += output;
                sounding |= operator.envelope.stage() != Stage::Off;
            }
        }

        if !sounding {
            self.kill();
        }

        let sample = emulator.channel_output(sum);
        (sample * self.left_gain, sample * self.right_gain)
    }
}
