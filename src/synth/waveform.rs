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
use std::f32::consts::TAU;
use std::sync::OnceLock;

use crate::bank::Waveform;

/// Entries in the quarter-wave sine table.
const TABLE_SIZE: usize = 256;

/// DC step the YM2612 DAC adds to every channel output.
const LADDER_OFFSET: f32 = 1.0 / 256.0;

/// 13-bit output quantisation step.
const DAC_13_STEP: f32 = 1.0 / 4096.0;

/// How operator sine values are produced and how the summed output is quantised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emulator {
    /// Floating point sine with no output shaping.
    Reference,
    /// Quarter-wave lookup table, as the chips store it.
    LogSinTable,
    /// Lookup table plus 13-bit output quantisation.
    Dac13,
    /// Lookup table plus the YM2612 ladder offset on every channel.
    Ladder,
}

fn table() -> &'static [f32; TABLE_SIZE] {
    static TABLE: OnceLock<[f32; TABLE_SIZE]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0; TABLE_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = ((i as f32 + 0.5) / TABLE_SIZE as f32 * TAU / 4.0).sin();
        }
        table
    })
}

impl Emulator {
    /// Builds any lookup tables so the audio thread never does.
    pub fn prepare(&self) {
        table();
    }

    /// Sine of `phase` cycles.
    #[inline]
    pub fn sine(&self, phase: f32) -> f32 {
        match self {
            Emulator::Reference => (phase * TAU).sin(),
            _ => {
                let phase = phase - phase.floor();
                let position = phase * 4.0 * TABLE_SIZE as f32;
                let index = (position as usize).min(4 * TABLE_SIZE - 1);
                let quadrant = index / TABLE_SIZE;
                let offset = index % TABLE_SIZE;
                let table = table();
                match quadrant {
                    0 => table[offset],
                    1 => table[TABLE_SIZE - 1 - offset],
                    2 => -table[offset],
                    _ => -table[TABLE_SIZE - 1 - offset],
                }
            }
        }
    }

    /// Evaluates an operator waveform at `phase` cycles.
    #[inline]
    pub fn wave(&self, waveform: Waveform, phase: f32) -> f32 {
        let phase = phase - phase.floor();
        let first_half = phase < 0.5;
        match waveform {
            Waveform::Sine => self.sine(phase),
            Waveform::HalfSine => {
                if first_half {
                    self.sine(phase)
                } else {
                    0.0
                }
            }
            Waveform::AbsSine => self.sine(phase).abs(),
            Waveform::PulseSine => {
                if phase % 0.5 < 0.25 {
                    self.sine(phase).abs()
                } else {
                    0.0
                }
            }
            Waveform::AlternatingSine => {
                if first_half {
                    self.sine(phase * 2.0)
                } else {
                    0.0
                }
            }
            Waveform::CamelSine => {
                if first_half {
                    self.sine(phase * 2.0).abs()
                } else {
                    0.0
                }
            }
            Waveform::Square => {
                if first_half {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::LogSaw => {
                if first_half {
                    (-12.0 * phase).exp()
                } else {
                    -(-12.0 * (1.0 - phase)).exp()
                }
            }
        }
    }

    /// Applies per-channel DAC behaviour to one voice output.
    #[inline]
    pub fn channel_output(&self, sample: f32) -> f32 {
        match self {
            Emulator::Ladder => {
                if sample >= 0.0 {
                    sample + LADDER_OFFSET
                } else {
                    sample - LADDER_OFFSET
                }
            }
            _ => sample,
        }
    }

    /// Quantises the mixed output.
    #[inline]
    pub fn mix_output(&self, sample: f32) -> f32 {
        match self {
            Emulator::Dac13 => (sample / DAC_13_STEP).round() * DAC_13_STEP,
            _ => sample,
        }
    }

    /// Whether silent channels still contribute to the output.
    pub fn idle_channels_sound(&self) -> bool {
        matches!(self, Emulator::Ladder)
    }
}
