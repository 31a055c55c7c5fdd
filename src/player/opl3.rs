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

/// The YMF262 family: 18 two-operator channels per chip, eight waveforms.
pub enum Opl3Chip {}

impl Chip for Opl3Chip {
    const NAME: &'static str = "OPL3";
    const VOICES_PER_CHIP: usize = 18;
    const BANK_FORMAT: BankFormat = BankFormat::Wopl;
    const EMULATOR_NAMES: &'static [&'static str] =
        &["Reference (floating point)", "Log-sin table", "13-bit DAC"];
    const EMULATORS: &'static [Emulator] =
        &[Emulator::Reference, Emulator::LogSinTable, Emulator::Dac13];

    fn default_bank() -> Bank {
        bank::opl3_default()
    }
}

pub type Opl3 = FmBackend<Opl3Chip>;
