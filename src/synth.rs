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

//! Polyphonic FM synthesis engine shared by the OPL3 and OPN2 players.
//!
//! The engine owns a fixed pool of voices sized by the chip count. Nothing on the
//! note or render paths allocates; only chip count and bank changes do.

mod channel;
mod envelope;
mod voice;
mod waveform;

use crate::bank::Bank;
use crate::output::OutputBuffers;

use channel::Channel;
use voice::{Voice, VoiceState};
pub use waveform::Emulator;

/// Upper bound on emulated chips.
pub const MAX_CHIPS: usize = 100;

/// MIDI channel 10, zero based.
pub const PERCUSSION_CHANNEL: u8 = 9;

const CHANNELS: usize = 16;

/// Keeps a handful of full scale voices from clipping.
const MASTER_GAIN: f32 = 0.25;

const TREMOLO_HZ: f32 = 3.7;
const VIBRATO_HZ: f32 = 6.1;

/// Shared low frequency oscillators.
#[derive(Debug, Clone, Copy)]
struct Lfo {
    tremolo_phase: f32,
    vibrato_phase: f32,
    tremolo_increment: f32,
    vibrato_increment: f32,
}

impl Lfo {
    fn new(sample_rate: f32) -> Lfo {
        Lfo {
            tremolo_phase: 0.0,
            vibrato_phase: 0.0,
            tremolo_increment: TREMOLO_HZ / sample_rate,
            vibrato_increment: VIBRATO_HZ / sample_rate,
        }
    }

    /// Advances one sample; returns tremolo in [0, 1] and vibrato in [-1, 1].
    #[inline]
    fn tick(&mut self) -> (f32, f32) {
        self.tremolo_phase = (self.tremolo_phase + self.tremolo_increment).fract();
        self.vibrato_phase = (self.vibrato_phase + self.vibrato_increment).fract();
        let tremolo = 1.0 - (2.0 * self.tremolo_phase - 1.0).abs();
        let vibrato = 4.0 * (self.vibrato_phase - 0.5).abs() - 1.0;
        (tremolo, vibrato)
    }
}

/// The synthesis engine.
pub struct Synth {
    sample_rate: f32,
    voices_per_chip: usize,
    voices: Vec<Voice>,
    channels: [Channel; CHANNELS],
    bank: Bank,
    emulator: Emulator,
    lfo: Lfo,
    /// Note-on counter used as voice age.
    clock: u64,
}

impl Synth {
    /// Creates an engine with `voices_per_chip * chips` voices.
    pub fn new(sample_rate: u32, voices_per_chip: usize, chips: usize, bank: Bank) -> Synth {
        let sample_rate = sample_rate.max(1) as f32;
        let emulator = Emulator::Reference;
        emulator.prepare();
        Synth {
            sample_rate,
            voices_per_chip,
            voices: vec![Voice::default(); voices_per_chip * chips.clamp(1, MAX_CHIPS)],
            channels: [Channel::default(); CHANNELS],
            bank,
            emulator,
            lfo: Lfo::new(sample_rate),
            clock: 0,
        }
    }

    pub fn chip_count(&self) -> usize {
        self.voices.len() / self.voices_per_chip.max(1)
    }

    /// Resizes the voice pool. Every sounding voice is dropped.
    pub fn set_chip_count(&mut self, chips: usize) {
        let voices = self.voices_per_chip * chips.clamp(1, MAX_CHIPS);
        self.voices.clear();
        self.voices.resize(voices, Voice::default());
    }

    pub fn set_emulator(&mut self, emulator: Emulator) {
        emulator.prepare();
        self.emulator = emulator;
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    /// Replaces the bank. Sounding voices keep their copied patches until released.
    pub fn set_bank(&mut self, bank: Bank) {
        self.bank = bank;
    }

    /// Number of voices currently sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_active()).count()
    }

    fn channel(&self, channel: u8) -> &Channel {
        &self.channels[channel as usize % CHANNELS]
    }

    fn channel_mut(&mut self, channel: u8) -> &mut Channel {
        &mut self.channels[channel as usize % CHANNELS]
    }

    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, note);
            return;
        }

        let state = *self.channel(channel);
        let (patch, key) = if channel == PERCUSSION_CHANNEL {
            let patch = *self.bank.percussion(state.bank_msb, state.bank_lsb, note);
            (patch, patch.percussion_key.unwrap_or(note))
        } else {
            (*self.bank.melodic(state.bank_msb, state.bank_lsb, state.program), note)
        };
        if patch.blank {
            return;
        }

        let velocity = (velocity as i16 + patch.velocity_offset as i16).clamp(1, 127) as u8;
        let Some(index) = self.allocate(channel, note) else {
            return;
        };
        self.clock += 1;
        self.voices[index].start(
            channel,
            note,
            key,
            velocity,
            &patch,
            self.sample_rate,
            self.clock,
        );
    }

    /// Picks a voice for a new note: the same note if it is still held, then a free
    /// voice, then the quietest released voice, then the quietest held one.
    fn allocate(&self, channel: u8, note: u8) -> Option<usize> {
        if let Some(index) = self.voices.iter().position(|voice| {
            voice.state() == VoiceState::Held && voice.channel() == channel && voice.note() == note
        }) {
            return Some(index);
        }
        if let Some(index) = self.voices.iter().position(|voice| !voice.is_active()) {
            return Some(index);
        }
        self.voices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let a_held = a.state() == VoiceState::Held;
                let b_held = b.state() == VoiceState::Held;
                a_held
                    .cmp(&b_held)
                    .then(b.attenuation().total_cmp(&a.attenuation()))
                    .then(a.age().cmp(&b.age()))
            })
            .map(|(index, _)| index)
    }

    pub fn note_off(&mut self, channel: u8, note: u8) {
        let sustain = self.channel(channel).sustain;
        for voice in self.voices.iter_mut() {
            if voice.state() == VoiceState::Held && voice.channel() == channel && voice.note() == note
            {
                if sustain {
                    voice.sustain();
                } else {
                    voice.release();
                }
            }
        }
    }

    pub fn poly_aftertouch(&mut self, channel: u8, note: u8, value: u8) {
        for voice in self.voices.iter_mut() {
            if voice.is_active() && voice.channel() == channel && voice.note() == note {
                voice.set_aftertouch(value);
            }
        }
    }

    pub fn channel_aftertouch(&mut self, channel: u8, value: u8) {
        self.channel_mut(channel).aftertouch = value;
    }

    pub fn program_change(&mut self, channel: u8, program: u8) {
        self.channel_mut(channel).program = program & 0x7f;
    }

    /// `value` is the 14-bit bend, 8192 meaning centred.
    pub fn pitch_bend(&mut self, channel: u8, value: u16) {
        self.channel_mut(channel).set_pitch_bend(value);
    }

    pub fn controller_change(&mut self, channel: u8, controller: u8, value: u8) {
        let state = self.channel_mut(channel);
        match controller {
            0 => state.bank_msb = value,
            1 => state.modulation = value,
            6 => state.data_entry_msb(value),
            7 => state.volume = value,
            10 => state.pan = value,
            11 => state.expression = value,
            32 => state.bank_lsb = value,
            38 => state.data_entry_lsb(value),
            64 => {
                let down = value >= 64;
                state.sustain = down;
                if !down {
                    self.release_sustained(channel);
                }
            }
            98 | 99 => state.deselect_rpn(),
            100 => state.select_rpn_lsb(value),
            101 => state.select_rpn_msb(value),
            120 => self.for_channel(channel, Voice::kill),
            121 => {
                state.reset_controllers();
                self.release_sustained(channel);
            }
            123 => self.for_channel(channel, Voice::release),
            _ => {}
        }
    }

    fn release_sustained(&mut self, channel: u8) {
        for voice in self.voices.iter_mut() {
            if voice.state() == VoiceState::Sustained && voice.channel() == channel {
                voice.release();
            }
        }
    }

    fn for_channel(&mut self, channel: u8, action: fn(&mut Voice)) {
        self.voices
            .iter_mut()
            .filter(|voice| voice.is_active() && voice.channel() == channel)
            .for_each(action);
    }

    /// Silences every voice immediately and lifts all sustain pedals.
    pub fn panic(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.kill();
        }
        for channel in self.channels.iter_mut() {
            channel.sustain = false;
        }
    }

    /// Renders `frames` frames into `output`, clamped to what the buffers hold.
    pub fn render(&mut self, output: &mut OutputBuffers, frames: usize) {
        let frames = frames.min(output.frames());
        let deep = (self.bank.deep_tremolo, self.bank.deep_vibrato);
        for voice in self.voices.iter_mut().filter(|voice| voice.is_active()) {
            let channel = &self.channels[voice.channel() as usize % CHANNELS];
            voice.prepare(channel, self.sample_rate, deep);
        }

        let emulator = self.emulator;
        let idle = emulator.channel_output(0.0);
        for frame in 0..frames {
            let (tremolo, vibrato) = self.lfo.tick();
            let mut left = 0.0;
            let mut right = 0.0;
            for voice in self.voices.iter_mut() {
                if voice.is_active() {
                    let (l, r) = voice.tick(emulator, tremolo, vibrato);
                    left += l;
                    right += r;
                } else if emulator.idle_channels_sound() {
                    left += idle;
                    right += idle;
                }
            }
            output.set(
                frame,
                emulator.mix_output(left * MASTER_GAIN),
                emulator.mix_output(right * MASTER_GAIN),
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bank::opl3_default;

    const RATE: u32 = 8000;

    fn synth(voices: usize) -> Synth {
        Synth::new(RATE, voices, 1, opl3_default())
    }

    fn render(synth: &mut Synth, frames: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; frames * 2];
        let mut output = OutputBuffers::interleaved(&mut buffer, 2);
        synth.render(&mut output, frames);
        buffer
    }

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    #[test]
    fn test_silent_when_idle() {
        let mut synth = synth(18);
        assert!(render(&mut synth, 256).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_note_sounds_and_releases() {
        let mut synth = synth(18);
        synth.note_on(0, 60, 100);
        assert_eq!(synth.active_voices(), 1);
        assert!(energy(&render(&mut synth, 256)) > 0.0);

        synth.note_off(0, 60);
        render(&mut synth, RATE as usize * 2);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn test_velocity_zero_is_note_off() {
        let mut synth = synth(18);
        synth.note_on(0, 60, 100);
        synth.note_on(0, 60, 0);
        render(&mut synth, RATE as usize * 2);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn test_sustain_pedal_holds_notes() {
        let mut synth = synth(18);
        synth.controller_change(0, 64, 127);
        synth.note_on(0, 60, 100);
        synth.note_off(0, 60);
        render(&mut synth, RATE as usize * 2);
        assert_eq!(synth.active_voices(), 1);

        synth.controller_change(0, 64, 0);
        render(&mut synth, RATE as usize * 2);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn test_voice_stealing_never_grows_pool() {
        let mut synth = synth(4);
        for note in 40..60 {
            synth.note_on(0, note, 100);
        }
        assert_eq!(synth.active_voices(), 4);
        assert_eq!(synth.voices.len(), 4);
    }

    #[test]
    fn test_all_sound_off_only_affects_channel() {
        let mut synth = synth(18);
        synth.note_on(0, 60, 100);
        synth.note_on(1, 64, 100);
        synth.controller_change(0, 120, 0);
        assert_eq!(synth.active_voices(), 1);
    }

    #[test]
    fn test_panic_silences() {
        let mut synth = synth(18);
        synth.controller_change(0, 64, 127);
        for note in 60..70 {
            synth.note_on(0, note, 100);
        }
        synth.panic();
        assert_eq!(synth.active_voices(), 0);
        assert!(!synth.channels[0].sustain);
        assert!(render(&mut synth, 128).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_chip_count_resizes_pool() {
        let mut synth = synth(18);
        assert_eq!(synth.chip_count(), 1);
        synth.note_on(0, 60, 100);
        synth.set_chip_count(3);
        assert_eq!(synth.chip_count(), 3);
        assert_eq!(synth.voices.len(), 54);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn test_program_change_changes_timbre() {
        let mut piano = synth(18);
        let mut organ = synth(18);
        organ.program_change(0, 16);
        piano.note_on(0, 60, 100);
        organ.note_on(0, 60, 100);
        assert_ne!(render(&mut piano, 512), render(&mut organ, 512));
    }

    #[test]
    fn test_percussion_uses_drum_map() {
        let mut synth = synth(18);
        synth.note_on(PERCUSSION_CHANNEL, 20, 100);
        assert_eq!(synth.active_voices(), 0);
        synth.note_on(PERCUSSION_CHANNEL, 36, 100);
        assert_eq!(synth.active_voices(), 1);
    }

    #[test]
    fn test_render_clamps_to_buffer() {
        let mut synth = synth(18);
        synth.note_on(0, 60, 100);
        let mut buffer = vec![0.0; 8];
        let mut output = OutputBuffers::interleaved(&mut buffer, 2);
        synth.render(&mut output, 100);
        assert!(buffer.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_ladder_emulator_adds_offset() {
        let mut synth = synth(6);
        synth.set_emulator(Emulator::Ladder);
        let samples = render(&mut synth, 16);
        assert!(samples.iter().all(|&s| s > 0.0));
    }

    #[test]
    fn test_deterministic() {
        let mut a = synth(18);
        let mut b = synth(18);
        for synth in [&mut a, &mut b] {
            synth.note_on(0, 60, 100);
            synth.pitch_bend(0, 10000);
            synth.controller_change(0, 1, 64);
        }
        assert_eq!(render(&mut a, 1024), render(&mut b, 1024));
    }
}
