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
use std::path::Path;

use midly::num::{u4, u7};
use midly::PitchBend;

use super::{Backend, Error};
use crate::bank::BankError;
use crate::output::OutputBuffers;

/// Everything the mock backend was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Panic,
    NoteOn(u8, u8, u8),
    NoteOff(u8, u8),
    PolyAftertouch(u8, u8, u8),
    ChannelAftertouch(u8, u8),
    Controller(u8, u8, u8),
    ProgramChange(u8, u8),
    PitchBend(u8, u16),
    SelectEmulator(usize),
    OpenBank(String),
    SetChipCount(usize),
}

/// A backend that records events and renders a constant level.
pub struct Mock {
    events: Vec<Event>,
    emulator: usize,
    chips: usize,
    bank: String,
    /// Rendered on both channels.
    level: f32,
}

impl Mock {
    pub fn events(&self) -> Vec<Event> {
        self.events.clone()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = level;
    }
}

impl Backend for Mock {
    fn init(_: u32) -> Result<Self, Error> {
        Ok(Mock {
            events: Vec::new(),
            emulator: 0,
            chips: 1,
            bank: "Mock bank".to_string(),
            level: 0.0,
        })
    }

    fn enumerate_emulators() -> &'static [&'static str] {
        &["Mock A", "Mock B"]
    }

    fn name(&self) -> &'static str {
        "Mock"
    }

    fn version(&self) -> &'static str {
        "0.0.0"
    }

    fn emulators(&self) -> &'static [&'static str] {
        Self::enumerate_emulators()
    }

    fn current_emulator(&self) -> usize {
        self.emulator
    }

    fn select_emulator(&mut self, id: usize) -> Result<(), Error> {
        self.events.push(Event::SelectEmulator(id));
        let count = self.emulators().len();
        if id >= count {
            return Err(Error::InvalidEmulator { id, count });
        }
        self.emulator = id;
        Ok(())
    }

    /// Accepts any path that exists.
    fn open_bank_file(&mut self, path: &Path) -> Result<(), Error> {
        self.events
            .push(Event::OpenBank(path.to_string_lossy().into_owned()));
        if !path.exists() {
            return Err(BankError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).into());
        }
        self.bank = path.to_string_lossy().into_owned();
        Ok(())
    }

    fn bank_name(&self) -> &str {
        &self.bank
    }

    fn set_chip_count(&mut self, chips: usize) -> Result<(), Error> {
        self.events.push(Event::SetChipCount(chips));
        if chips == 0 {
            return Err(Error::ChipCount {
                requested: chips,
                max: usize::MAX,
            });
        }
        self.chips = chips;
        Ok(())
    }

    fn chip_count(&self) -> usize {
        self.chips
    }

    fn panic(&mut self) {
        self.events.push(Event::Panic);
    }

    fn note_on(&mut self, channel: u4, key: u7, velocity: u7) {
        self.events.push(Event::NoteOn(
            channel.as_int(),
            key.as_int(),
            velocity.as_int(),
        ));
    }

    fn note_off(&mut self, channel: u4, key: u7) {
        self.events
            .push(Event::NoteOff(channel.as_int(), key.as_int()));
    }

    fn poly_aftertouch(&mut self, channel: u4, key: u7, value: u7) {
        self.events.push(Event::PolyAftertouch(
            channel.as_int(),
            key.as_int(),
            value.as_int(),
        ));
    }

    fn channel_aftertouch(&mut self, channel: u4, value: u7) {
        self.events
            .push(Event::ChannelAftertouch(channel.as_int(), value.as_int()));
    }

    fn controller_change(&mut self, channel: u4, controller: u7, value: u7) {
        self.events.push(Event::Controller(
            channel.as_int(),
            controller.as_int(),
            value.as_int(),
        ));
    }

    fn program_change(&mut self, channel: u4, program: u7) {
        self.events
            .push(Event::ProgramChange(channel.as_int(), program.as_int()));
    }

    fn pitch_bend(&mut self, channel: u4, bend: PitchBend) {
        self.events
            .push(Event::PitchBend(channel.as_int(), bend.0.as_int()));
    }

    fn render_block(&mut self, output: &mut OutputBuffers, frames: usize) {
        for frame in 0..frames.min(output.frames()) {
            output.set(frame, self.level, self.level);
        }
    }
}
