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
use super::fm::{Chip, FmBackend};
use crate::bank::{self, Bank, BankFormat};
use crate::synth::Emulator;

/// The YM2612 family: six four-operator channels per chip.
pub enum Opn2Chip {}

impl Chip for Opn2Chip {
    const NAME: &'static str = "OPN2";
    const VOICES_PER_CHIP: usize = 6;
    const BANK_FORMAT: BankFormat = BankFormat::Wopn;
    const EMULATOR_NAMES: &'static [&'static str] =
        &["Reference (floating point)", "Log-sin table", "YM2612 ladder DAC"];
    const EMULATORS: &'static [Emulator] =
        &[Emulator::Reference, Emulator::LogSinTable, Emulator::Ladder];

    fn default_bank() -> Bank {
        bank::opn2_default()
    }
}

pub type Opn2 = FmBackend<Opn2Chip>;
