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

/// Peak envelope follower with instantaneous attack and exponential release.
#[derive(Debug, Clone)]
pub struct LevelMonitor {
    /// Per-sample decay multiplier.
    release: f64,
    /// Current level.
    level: f64,
}

impl LevelMonitor {
    /// Creates a monitor whose level decays by 1/e over `release` samples.
    pub fn new(release: f64) -> LevelMonitor {
        let mut monitor = LevelMonitor {
            release: 0.0,
            level: 0.0,
        };
        monitor.set_release(release);
        monitor
    }

    /// Sets the release time in samples.
    pub fn set_release(&mut self, release: f64) {
        self.release = if release > 0.0 {
            (-1.0 / release).exp()
        } else {
            0.0
        };
    }

    /// Feeds one sample and returns the current level.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let input = input.abs();
        let decayed = self.level * self.release;
        self.level = if input > decayed { input } else { decayed };
        self.level
    }

    /// Returns the current level without advancing.
    pub fn level(&self) -> f64 {
        self.level
    }
}
