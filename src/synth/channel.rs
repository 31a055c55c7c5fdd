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

//! Per MIDI channel controller state.

use std::f32::consts::FRAC_PI_2;

const DEFAULT_BEND_RANGE: f32 = 2.0;
const RPN_NONE: (u8, u8) = (0x7f, 0x7f);
const RPN_BEND_RANGE: (u8, u8) = (0, 0);

#[derive(Debug, Clone, Copy)]
pub struct Channel {
    pub program: u8,
    pub bank_msb: u8,
    pub bank_lsb: u8,
    pub volume: u8,
    pub expression: u8,
    pub pan: u8,
    pub modulation: u8,
    pub sustain: bool,
    pub aftertouch: u8,
    /// Semitones, already scaled by the bend range.
    pub bend: f32,
    pub bend_range: f32,
    rpn: (u8, u8),
}

impl Default for Channel {
    fn default() -> Self {
        Channel {
            program: 0,
            bank_msb: 0,
            bank_lsb: 0,
            volume: 100,
            expression: 127,
            pan: 64,
            modulation: 0,
            sustain: false,
            aftertouch: 0,
            bend: 0.0,
            bend_range: DEFAULT_BEND_RANGE,
            rpn: RPN_NONE,
        }
    }
}

impl Channel {
    /// Linear gain from volume and expression, on a squared curve.
    pub fn gain(&self) -> f32 {
        let volume = self.volume as f32 / 127.0;
        let expression = self.expression as f32 / 127.0;
        volume * volume * expression * expression
    }

    /// Constant power pan gains.
    pub fn pan_gains(&self) -> (f32, f32) {
        let position = self.pan.saturating_sub(1) as f32 / 126.0;
        let angle = position * FRAC_PI_2;
        (angle.cos(), angle.sin())
    }

    /// Sets the bend from a 14-bit value centred on 8192.
    pub fn set_pitch_bend(&mut self, value: u16) {
        self.bend = (value as f32 - 8192.0) / 8192.0 * self.bend_range;
    }

    /// Reset All Controllers.
    pub fn reset_controllers(&mut self) {
        *self = Channel {
            program: self.program,
            bank_msb: self.bank_msb,
            bank_lsb: self.bank_lsb,
            volume: self.volume,
            pan: self.pan,
            ..Default::default()
        };
    }

    pub fn select_rpn_msb(&mut self, value: u8) {
        self.rpn.0 = value;
    }

    pub fn select_rpn_lsb(&mut self, value: u8) {
        self.rpn.1 = value;
    }

    /// Any NRPN selection disables RPN data entry.
    pub fn deselect_rpn(&mut self) {
        self.rpn = RPN_NONE;
    }

    pub fn data_entry_msb(&mut self, value: u8) {
        if self.rpn == RPN_BEND_RANGE {
            self.bend_range = value as f32 + self.bend_range.fract();
        }
    }

    pub fn data_entry_lsb(&mut self, value: u8) {
        if self.rpn == RPN_BEND_RANGE {
            self.bend_range = self.bend_range.trunc() + value.min(99) as f32 / 100.0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pitch_bend() {
        let mut channel = Channel::default();
        channel.set_pitch_bend(8192);
        assert_eq!(channel.bend, 0.0);
        channel.set_pitch_bend(0);
        assert_eq!(channel.bend, -2.0);
        channel.set_pitch_bend(16383);
        assert!((channel.bend - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_bend_range_rpn() {
        let mut channel = Channel::default();

        // Data entry without an RPN selected does nothing.
        channel.data_entry_msb(12);
        assert_eq!(channel.bend_range, 2.0);

        channel.select_rpn_msb(0);
        channel.select_rpn_lsb(0);
        channel.data_entry_msb(12);
        channel.data_entry_lsb(50);
        assert_eq!(channel.bend_range, 12.5);

        channel.deselect_rpn();
        channel.data_entry_msb(1);
        assert_eq!(channel.bend_range, 12.5);
    }

    #[test]
    fn test_reset_controllers_keeps_program_and_volume() {
        let mut channel = Channel {
            program: 5,
            volume: 30,
            expression: 10,
            sustain: true,
            modulation: 100,
            ..Default::default()
        };
        channel.set_pitch_bend(0);
        channel.reset_controllers();

        assert_eq!(channel.program, 5);
        assert_eq!(channel.volume, 30);
        assert_eq!(channel.expression, 127);
        assert!(!channel.sustain);
        assert_eq!(channel.modulation, 0);
        assert_eq!(channel.bend, 0.0);
    }

    #[test]
    fn test_pan_gains() {
        let (left, right) = Channel {
            pan: 0,
            ..Default::default()
        }
        .pan_gains();
        assert_eq!((left, right), (1.0, 0.0));

        let (left, right) = Channel::default().pan_gains();
        assert!((left - right).abs() < 0.02);
    }
}
