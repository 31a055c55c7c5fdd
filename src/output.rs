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

//! Caller-owned stereo output buffers with a per-frame stride.

/// Stereo output provided by the audio host for one processing cycle.
///
/// Frame `i` lives at sample index `i * stride` in its channel; a stride of 2 over a
/// single interleaved buffer and a stride of 1 over two planar buffers are the common cases.
#[derive(Debug)]
pub enum OutputBuffers<'a> {
    /// Left at offset 0 and right at offset 1 of each frame.
    Interleaved {
        samples: &'a mut [f32],
        stride: usize,
    },
    /// Separate channel buffers.
    Planar {
        left: &'a mut [f32],
        right: &'a mut [f32],
        stride: usize,
    },
}

impl<'a> OutputBuffers<'a> {
    /// Interleaved stereo with the given frame stride (at least 2).
    pub fn interleaved(samples: &'a mut [f32], stride: usize) -> Self {
        OutputBuffers::Interleaved {
            samples,
            stride: stride.max(2),
        }
    }

    /// Planar stereo with the given frame stride (at least 1).
    pub fn planar(left: &'a mut [f32], right: &'a mut [f32], stride: usize) -> Self {
        OutputBuffers::Planar {
            left,
            right,
            stride: stride.max(1),
        }
    }

    /// Number of complete frames the buffers can hold.
    pub fn frames(&self) -> usize {
        match self {
            OutputBuffers::Interleaved { samples, stride } => {
                if samples.len() < 2 {
                    0
                } else {
                    (samples.len() - 2) / stride + 1
                }
            }
            OutputBuffers::Planar {
                left,
                right,
                stride,
            } => {
                let len = left.len().min(right.len());
                if len == 0 {
                    0
                } else {
                    (len - 1) / stride + 1
                }
            }
        }
    }

    /// Reads frame `i`.
    #[inline]
    pub fn get(&self, i: usize) -> (f32, f32) {
        match self {
            OutputBuffers::Interleaved { samples, stride } => {
                let base = i * *stride;
                (samples[base], samples[base + 1])
            }
            OutputBuffers::Planar {
                left,
                right,
                stride,
            } => (left[i * *stride], right[i * *stride]),
        }
    }

    /// Writes frame `i`.
    #[inline]
    pub fn set(&mut self, i: usize, l: f32, r: f32) {
        match self {
            OutputBuffers::Interleaved { samples, stride } => {
                let base = i * *stride;
                samples[base] = l;
                samples[base + 1] = r;
            }
            OutputBuffers::Planar {
                left,
                right,
                stride,
            } => {
                left[i * *stride] = l;
                right[i * *stride] = r;
            }
        }
    }

    /// Writes silence into frames `0..frames`.
    pub fn silence(&mut self, frames: usize) {
        for i in 0..frames {
            self.set(i, 0.0, 0.0);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_interleaved_frames() {
        let mut samples = vec![1.0f32; 8];
        let mut out = OutputBuffers::interleaved(&mut samples, 2);
        assert_eq!(out.frames(), 4);

        out.set(1, 0.25, -0.25);
        assert_eq!(out.get(1), (0.25, -0.25));
        out.silence(1);
        assert_eq!(samples, vec![0.0, 0.0, 0.25, -0.25, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_interleaved_wide_stride() {
        // Stereo pair embedded in a 4-channel frame.
        let mut samples = vec![0.0f32; 10];
        let out = OutputBuffers::interleaved(&mut samples, 4);
        assert_eq!(out.frames(), 3);
    }

    #[test]
    fn test_planar_frames() {
        let mut left = vec![0.0f32; 5];
        let mut right = vec![0.0f32; 4];
        let mut out = OutputBuffers::planar(&mut left, &mut right, 1);
        assert_eq!(out.frames(), 4);

        out.set(3, 0.5, 0.75);
        assert_eq!(out.get(3), (0.5, 0.75));
        assert_eq!(left[3], 0.5);
        assert_eq!(right[3], 0.75);
    }

    #[test]
    fn test_empty_buffers() {
        let mut samples: Vec<f32> = Vec::new();
        assert_eq!(OutputBuffers::interleaved(&mut samples, 2).frames(), 0);
    }
}
