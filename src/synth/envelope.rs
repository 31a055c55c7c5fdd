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

//! Operator envelope generator working in decibels of attenuation.

use crate::bank::{OperatorPatch, SILENCE_DB};

/// Attenuation below which the attack phase is considered complete.
const ATTACK_END_DB: f32 = 0.1;

/// ln(SILENCE_DB / ATTACK_END_DB): time constants per attack time.
const ATTACK_TIME_CONSTANTS: f32 = 6.867;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Attack,
    Decay,
    Sustain,
    Release,
    Off,
}

#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    stage: Stage,
    /// Current attenuation in dB.
    attenuation: f32,
    /// Fraction of the remaining attenuation removed per sample during attack.
    attack_coeff: f32,
    /// dB per sample.
    decay_step: f32,
    sustain_level: f32,
    sustain_step: f32,
    release_step: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            stage: Stage::Off,
            attenuation: SILENCE_DB,
            attack_coeff: 0.0,
            decay_step: 0.0,
            sustain_level: 0.0,
            sustain_step: 0.0,
            release_step: 0.0,
        }
    }
}

/// dB per sample needed to cover the full range in `seconds`.
fn step(seconds: f32, sample_rate: f32) -> f32 {
    if seconds.is_infinite() {
        0.0
    } else if seconds <= 0.0 {
        SILENCE_DB
    } else {
        SILENCE_DB / (seconds * sample_rate)
    }
}

impl Envelope {
    /// Starts a new note. The attack continues from the current level so retriggers do not click.
    pub fn key_on(&mut self, patch: &OperatorPatch, sample_rate: f32) {
        self.attack_coeff = if patch.attack.is_infinite() {
            0.0
        } else if patch.attack <= 0.0 {
            1.0
        } else {
            1.0 - (-ATTACK_TIME_CONSTANTS / (patch.attack * sample_rate)).exp()
        };
        self.decay_step = step(patch.decay, sample_rate);
        self.sustain_level = patch.sustain.min(SILENCE_DB);
        self.sustain_step = step(patch.sustain_decay, sample_rate);
        self.release_step = step(patch.release, sample_rate);
        self.stage = Stage::Attack;
    }

    pub fn key_off(&mut self) {
        if self.stage != Stage::Off {
            self.stage = Stage::Release;
        }
    }

    /// Silences immediately.
    pub fn kill(&mut self) {
        self.stage = Stage::Off;
        self.attenuation = SILENCE_DB;
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn attenuation(&self) -> f32 {
        self.attenuation
    }

    /// Advances one sample and returns the attenuation in dB.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        match self.stage {
            Stage::Attack => {
                self.attenuation -= self.attenuation * self.attack_coeff;
                if self.attenuation < ATTACK_END_DB {
                    self.attenuation = 0.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.attenuation += self.decay_step;
                if self.attenuation >= self.sustain_level {
                    self.attenuation = self.sustain_level;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => self.attenuation += self.sustain_step,
            Stage::Release => self.attenuation += self.release_step,
            Stage::Off => {}
        }

        if self.stage != Stage::Attack && self.attenuation >= SILENCE_DB {
            self.kill();
        }
        self.attenuation
    }
}
