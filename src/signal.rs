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

//! Post-processing applied to every generated stereo frame.
//!
//! This module provides:
//! - A one-pole DC blocker per output channel
//! - A peak level monitor per output channel, used only for display

mod dc_filter;
mod level;

use std::time::Duration;

pub use dc_filter::DcFilter;
pub use level::LevelMonitor;

/// Default DC blocker cutoff in Hz.
pub const DEFAULT_DC_CUTOFF_HZ: f64 = 5.0;

/// Default level monitor release time.
pub const DEFAULT_LEVEL_RELEASE: Duration = Duration::from_millis(300);

/// Per-channel conditioning state for a stereo stream.
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    /// DC blockers, left then right.
    dc: [DcFilter; 2],
    /// Level monitors, left then right.
    level: [LevelMonitor; 2],
}

impl SignalConditioner {
    /// Creates a conditioner for the given sample rate.
    pub fn new(sample_rate: u32, dc_cutoff_hz: f64, level_release: Duration) -> Self {
        let sample_rate = sample_rate as f64;
        let cutoff = dc_cutoff_hz / sample_rate;
        let release = level_release.as_secs_f64() * sample_rate;
        Self {
            dc: [DcFilter::new(cutoff), DcFilter::new(cutoff)],
            level: [LevelMonitor::new(release), LevelMonitor::new(release)],
        }
    }

    /// Filters one frame and returns the filtered samples along with the current levels.
    #[inline]
    pub fn process(&mut self, left: f64, right: f64) -> ((f64, f64), (f64, f64)) {
        let left = self.dc[0].process(left);
        let right = self.dc[1].process(right);
        let levels = (self.level[0].process(left), self.level[1].process(right));
        ((left, right), levels)
    }

    /// Current levels, left then right.
    pub fn levels(&self) -> (f64, f64) {
        (self.level[0].level(), self.level[1].level())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conditioner_channels_are_independent() {
        let mut conditioner = SignalConditioner::new(44100, 5.0, Duration::from_millis(300));

        let mut last = ((0.0, 0.0), (0.0, 0.0));
        for _ in 0..64 {
            last = conditioner.process(0.5, 0.0);
        }

        let ((left, right), (left_level, right_level)) = last;
        assert!(left > 0.0);
        assert_eq!(right, 0.0);
        assert!(left_level > 0.0);
        assert_eq!(right_level, 0.0);
    }

    #[test]
    fn test_levels_follow_last_frame() {
        let mut conditioner = SignalConditioner::new(48000, 5.0, Duration::from_millis(100));
        assert_eq!(conditioner.levels(), (0.0, 0.0));

        let (_, levels) = conditioner.process(1.0, -0.5);
        assert_eq!(conditioner.levels(), levels);
        assert_eq!(levels, (1.0, 0.5));

        let (_, levels) = conditioner.process(0.0, 0.0);
        assert_eq!(conditioner.levels(), levels);
        assert!(levels.0 < 1.0 && levels.0 > 0.99);
    }
}
