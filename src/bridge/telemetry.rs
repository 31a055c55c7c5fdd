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

//! Values written by the real-time thread and read by status displays.
//!
//! Everything here is a plain atomic scalar. Readers may observe values from
//! different blocks; that is fine for display purposes.

use std::array;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Marks "no note played yet" in `last_note`.
const NO_NOTE: u8 = 0xff;

/// An f64 stored as bits.
#[derive(Debug, Default)]
pub(super) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> AtomicF64 {
        AtomicF64(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// What the status display knows about one MIDI channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelInfo {
    /// General MIDI program.
    pub program: u8,
    pub bank_msb: u8,
    pub bank_lsb: u8,
    /// Number of keys currently held.
    pub note_count: u8,
    /// Bit `n` set while key `n` is held.
    pub active_notes: u128,
    pub last_note: Option<u8>,
}

#[derive(Debug)]
struct ChannelSlot {
    program: AtomicU8,
    bank_msb: AtomicU8,
    bank_lsb: AtomicU8,
    note_count: AtomicU8,
    active_notes: [AtomicU64; 2],
    last_note: AtomicU8,
}

impl Default for ChannelSlot {
    fn default() -> Self {
        ChannelSlot {
            program: AtomicU8::new(0),
            bank_msb: AtomicU8::new(0),
            bank_lsb: AtomicU8::new(0),
            note_count: AtomicU8::new(0),
            active_notes: [AtomicU64::new(0), AtomicU64::new(0)],
            last_note: AtomicU8::new(NO_NOTE),
        }
    }
}

impl ChannelSlot {
    fn note_word(&self, key: u8) -> (&AtomicU64, u64) {
        let key = key & 0x7f;
        (&self.active_notes[(key >> 6) as usize], 1u64 << (key & 0x3f))
    }

    fn note_on(&self, key: u8) {
        let (word, bit) = self.note_word(key);
        if word.fetch_or(bit, Ordering::Relaxed) & bit == 0 {
            self.note_count.fetch_add(1, Ordering::Relaxed);
        }
        self.last_note.store(key & 0x7f, Ordering::Relaxed);
    }

    fn note_off(&self, key: u8) {
        let (word, bit) = self.note_word(key);
        if word.fetch_and(!bit, Ordering::Relaxed) & bit != 0 {
            self.note_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    fn clear_notes(&self) {
        self.note_count.store(0, Ordering::Relaxed);
        for word in &self.active_notes {
            word.store(0, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> ChannelInfo {
        let low = self.active_notes[0].load(Ordering::Relaxed) as u128;
        let high = self.active_notes[1].load(Ordering::Relaxed) as u128;
        let last_note = self.last_note.load(Ordering::Relaxed);
        ChannelInfo {
            program: self.program.load(Ordering::Relaxed),
            bank_msb: self.bank_msb.load(Ordering::Relaxed),
            bank_lsb: self.bank_lsb.load(Ordering::Relaxed),
            note_count: self.note_count.load(Ordering::Relaxed),
            active_notes: low | (high << 64),
            last_note: (last_note != NO_NOTE).then_some(last_note),
        }
    }
}

/// Shared telemetry for one active player.
#[derive(Debug)]
pub(super) struct Telemetry {
    levels: [AtomicF64; 2],
    load_ratio: AtomicF64,
    /// Output gain in percent.
    volume: AtomicU8,
    channels: [ChannelSlot; 16],
}

impl Telemetry {
    pub fn new(volume: u8) -> Telemetry {
        Telemetry {
            levels: [AtomicF64::new(0.0), AtomicF64::new(0.0)],
            load_ratio: AtomicF64::new(0.0),
            volume: AtomicU8::new(volume.min(100)),
            channels: array::from_fn(|_| ChannelSlot::default()),
        }
    }

    pub fn levels(&self) -> (f64, f64) {
        (self.levels[0].load(), self.levels[1].load())
    }

    pub fn store_levels(&self, (left, right): (f64, f64)) {
        self.levels[0].store(left);
        self.levels[1].store(right);
    }

    pub fn load_ratio(&self) -> f64 {
        self.load_ratio.load()
    }

    pub fn store_load_ratio(&self, ratio: f64) {
        self.load_ratio.store(ratio);
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, percent: u8) {
        self.volume.store(percent.min(100), Ordering::Relaxed);
    }

    fn slot(&self, channel: u8) -> &ChannelSlot {
        &self.channels[(channel & 0x0f) as usize]
    }

    pub fn channel(&self, channel: u8) -> ChannelInfo {
        self.slot(channel).snapshot()
    }

    pub fn record_program(&self, channel: u8, program: u8) {
        self.slot(channel)
            .program
            .store(program & 0x7f, Ordering::Relaxed);
    }

    pub fn record_bank_msb(&self, channel: u8, value: u8) {
        self.slot(channel).bank_msb.store(value, Ordering::Relaxed);
    }

    pub fn record_bank_lsb(&self, channel: u8, value: u8) {
        self.slot(channel).bank_lsb.store(value, Ordering::Relaxed);
    }

    pub fn record_note_on(&self, channel: u8, key: u8) {
        self.slot(channel).note_on(key);
    }

    pub fn record_note_off(&self, channel: u8, key: u8) {
        self.slot(channel).note_off(key);
    }

    pub fn clear_notes(&self, channel: u8) {
        self.slot(channel).clear_notes();
    }

    pub fn clear_all_notes(&self) {
        for slot in &self.channels {
            slot.clear_notes();
        }
    }
}
