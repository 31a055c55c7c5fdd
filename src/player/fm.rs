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
use std::marker::PhantomData;
use std::path::Path;

use midly::num::{u4, u7};
use midly::PitchBend;

use super::{Backend, Error};
use crate::bank::{self, Bank, BankFormat};
use crate::output::OutputBuffers;
use crate::synth::{Emulator, Synth, MAX_CHIPS};

/// Describes one chip family driven by the shared FM engine.
pub trait Chip: Send + 'static {
    const NAME: &'static str;
    const VOICES_PER_CHIP: usize;
    const BANK_FORMAT: BankFormat;
    /// Display names, indexed by emulator id.
    const EMULATOR_NAMES: &'static [&'static str];
    /// Engine settings matching `EMULATOR_NAMES`.
    const EMULATORS: &'static [Emulator];

    fn default_bank() -> Bank;
}

/// A backend for chip family `C`.
pub struct FmBackend<C: Chip> {
    synth: Synth,
    emulator: usize,
    chip: PhantomData<C>,
}

impl<C: Chip> FmBackend<C> {
    /// The engine, for inspection.
    pub fn synth(&self) -> &Synth {
        &self.synth
    }
}

impl<C: Chip> Backend for FmBackend<C> {
    fn init(sample_rate: u32) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::Init(format!(
                "{} needs a positive sample rate",
                C::NAME
            )));
        }
        Ok(FmBackend {
            synth: Synth::new(sample_rate, C::VOICES_PER_CHIP, 1, C::default_bank()),
            emulator: 0,
            chip: PhantomData,
        })
    }

    fn enumerate_emulators() -> &'static [&'static str] {
        C::EMULATOR_NAMES
    }

    fn name(&self) -> &'static str {
        C::NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn emulators(&self) -> &'static [&'static str] {
        C::EMULATOR_NAMES
    }

    fn current_emulator(&self) -> usize {
        self.emulator
    }

    fn select_emulator(&mut self, id: usize) -> Result<(), Error> {
        let emulator = C::EMULATORS
            .get(id)
            .copied()
            .ok_or(Error::InvalidEmulator {
                id,
                count: C::EMULATORS.len(),
            })?;
        self.synth.set_emulator(emulator);
        self.emulator = id;
        Ok(())
    }

    fn open_bank_file(&mut self, path: &Path) -> Result<(), Error> {
        let bank = bank::load(path, C::BANK_FORMAT)?;
        self.synth.set_bank(bank);
        Ok(())
    }

    fn bank_name(&self) -> &str {
        &self.synth.bank().name
    }

    fn set_chip_count(&mut self, chips: usize) -> Result<(), Error> {
        if !(1..=MAX_CHIPS).contains(&chips) {
            return Err(Error::ChipCount {
                requested: chips,
                max: MAX_CHIPS,
            });
        }
        self.synth.set_chip_count(chips);
        Ok(())
    }

    fn chip_count(&self) -> usize {
        self.synth.chip_count()
    }

    fn panic(&mut self) {
        self.synth.panic();
    }

    fn note_on(&mut self, channel: u4, key: u7, velocity: u7) {
        self.synth
            .note_on(channel.as_int(), key.as_int(), velocity.as_int());
    }

    fn note_off(&mut self, channel: u4, key: u7) {
        self.synth.note_off(channel.as_int(), key.as_int());
    }

    fn poly_aftertouch(&mut self, channel: u4, key: u7, value: u7) {
        self.synth
            .poly_aftertouch(channel.as_int(), key.as_int(), value.as_int());
    }

    fn channel_aftertouch(&mut self, channel: u4, value: u7) {
        self.synth.channel_aftertouch(channel.as_int(), value.as_int());
    }

    fn controller_change(&mut self, channel: u4, controller: u7, value: u7) {
        self.synth
            .controller_change(channel.as_int(), controller.as_int(), value.as_int());
    }

    fn program_change(&mut self, channel: u4, program: u7) {
        self.synth.program_change(channel.as_int(), program.as_int());
    }

    fn pitch_bend(&mut self, channel: u4, bend: PitchBend) {
        self.synth.pitch_bend(channel.as_int(), bend.0.as_int());
    }

    fn render_block(&mut self, output: &mut OutputBuffers, frames: usize) {
        self.synth.render(output, frames);
    }
}
