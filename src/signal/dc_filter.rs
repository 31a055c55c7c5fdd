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

//! One-pole DC blocker.
//!
//! y[n] = x[n] - x[n-1] + R * y[n-1], with R = 1 - 2*pi*fc where fc is the
//! cutoff normalized to the sample rate.

use std::f64::consts::PI;

/// A first-order high-pass filter that removes constant offset.
#[derive(Debug, Clone)]
pub struct DcFilter {
    /// Pole position.
    coeff: f64,
    /// Previous input sample.
    x_prev: f64,
    /// Previous output sample.
    y_prev: f64,
}

impl DcFilter {
    /// Creates a new filter. `cutoff` is the cutoff frequency divided by the sample rate.
    pub fn new(cutoff: f64) -> DcFilter {
        let mut filter = DcFilter {
            coeff: 0.0,
            x_prev: 0.0,
            y_prev: 0.0,
        };
        filter.set_cutoff(cutoff);
        filter
    }

    /// Sets the normalized cutoff frequency.
    pub fn set_cutoff(&mut self, cutoff: f64) {
        self.coeff = (1.0 - 2.0 * PI * cutoff).clamp(0.0, 1.0 - f64::EPSILON);
    }

    /// Returns the pole position.
    #[cfg(test)]
    pub fn coeff(&self) -> f64 {
        self.coeff
    }

    /// Filters a single sample.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = input - self.x_prev + self.coeff * self.y_prev;
        self.x_prev = input;
        // Flush denormals so a long silent tail settles at exactly zero.
        self.y_prev = if output.abs() < 1e-30 { 0.0 } else { output };
        self.y_prev
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_silence_stays_silent() {
        let mut filter = DcFilter::new(5.0 / 44100.0);
        for _ in 0..1_000_000 {
            assert_eq!(filter.process(0.0), 0.0);
        }
    }

    #[test]
    fn test_removes_constant_offset() {
        let mut filter = DcFilter::new(5.0 / 44100.0);
        let mut output = 0.0;
        for _ in 0..44100 * 4 {
            output = filter.process(0.25);
        }
        assert!(output.abs() < 1e-3, "offset should decay, got {output}");
    }

    #[test]
    fn test_passes_audio_band() {
        let sample_rate = 44100.0;
        let mut filter = DcFilter::new(5.0 / sample_rate);
        let mut peak: f64 = 0.0;
        for n in 0..44100 {
            let input = (2.0 * PI * 440.0 * n as f64 / sample_rate).sin();
            let output = filter.process(input);
            if n > 22050 {
                peak = peak.max(output.abs());
            }
        }
        assert!(peak > 0.95, "440 Hz should pass, got peak {peak}");
    }

    #[test]
    fn test_settles_to_zero_after_signal() {
        let mut filter = DcFilter::new(5.0 / 44100.0);
        for _ in 0..1000 {
            filter.process(1.0);
        }
        let mut output = 1.0;
        for _ in 0..44100 * 120 {
            output = filter.process(0.0);
        }
        assert_eq!(output, 0.0);
    }

    #[test]
    fn test_coefficient_is_stable() {
        assert!(DcFilter::new(0.0).coeff() < 1.0);
        assert_eq!(DcFilter::new(1.0).coeff(), 0.0);
    }
}
