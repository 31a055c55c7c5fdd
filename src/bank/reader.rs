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
use super::BankError;

/// Bounds-checked cursor over bank file bytes.
pub(super) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data, pos: 0 }
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], BankError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(BankError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Fails unless at least `len` more bytes are available. Consumes nothing.
    pub fn require(&self, len: usize) -> Result<(), BankError> {
        match self.pos.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(BankError::Truncated(self.data.len())),
        }
    }

    pub fn u8(&mut self) -> Result<u8, BankError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8, BankError> {
        Ok(self.u8()? as i8)
    }

    pub fn u16_be(&mut self) -> Result<u16, BankError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn i16_be(&mut self) -> Result<i16, BankError> {
        Ok(self.u16_be()? as i16)
    }

    pub fn u16_le(&mut self) -> Result<u16, BankError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Peeks whether the upcoming bytes equal `magic`, consuming them if so.
    pub fn magic(&mut self, magic: &[u8]) -> bool {
        if self.data[self.pos..].starts_with(magic) {
            self.pos += magic.len();
            true
        } else {
            false
        }
    }
}

/// OPL-style rate (0-15) to seconds, given the time taken at rate 1.
pub(super) fn opl_rate_seconds(rate: u8, rate_one_ms: f32) -> f32 {
    match rate & 0x0f {
        0 => f32::INFINITY,
        r => rate_one_ms / 1000.0 / (1u32 << (r - 1)) as f32,
    }
}

/// OPN-style rate (0-31) to seconds, given the time taken at rate 1.
pub(super) fn opn_rate_seconds(rate: u8, rate_one_ms: f32) -> f32 {
    match rate & 0x1f {
        0 => f32::INFINITY,
        r => rate_one_ms / 1000.0 / 2f32.powf((r - 1) as f32 / 2.0),
    }
}

/// Attack time at rate 1.
pub(super) const ATTACK_RATE_ONE_MS: f32 = 2826.24;
/// Time per 96 dB of decay at rate 1.
pub(super) const DECAY_RATE_ONE_MS: f32 = 39280.64;

/// Phase feedback in cycles for a 3-bit feedback level.
pub(super) fn feedback_cycles(level: u8) -> f32 {
    match level & 0x07 {
        0 => 0.0,
        n => (1u32 << (n - 1)) as f32 / 32.0,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reader_bounds() {
        let mut reader = Reader::new(&[0x12, 0x34, 0x56]);
        assert_eq!(reader.u16_be().unwrap(), 0x1234);
        assert!(matches!(reader.u16_le(), Err(BankError::Truncated(2))));
        assert_eq!(reader.u8().unwrap(), 0x56);
    }

    #[test]
    fn test_require() {
        let mut reader = Reader::new(&[0x01, 0x02, 0x03]);
        reader.u8().unwrap();
        assert!(reader.require(2).is_ok());
        assert!(matches!(reader.require(3), Err(BankError::Truncated(3))));
        assert!(matches!(reader.require(usize::MAX), Err(BankError::Truncated(3))));
        // Nothing was consumed.
        assert_eq!(reader.u16_be().unwrap(), 0x0203);
    }

    #[test]
    fn test_rates() {
        assert!(opl_rate_seconds(0, ATTACK_RATE_ONE_MS).is_infinite());
        assert!((opl_rate_seconds(1, ATTACK_RATE_ONE_MS) - 2.82624).abs() < 1e-5);
        assert!((opl_rate_seconds(2, DECAY_RATE_ONE_MS) - 19.64032).abs() < 1e-4);
        assert!((opn_rate_seconds(3, ATTACK_RATE_ONE_MS) - 1.41312).abs() < 1e-5);
    }

    #[test]
    fn test_feedback() {
        assert_eq!(feedback_cycles(0), 0.0);
        assert_eq!(feedback_cycles(1), 1.0 / 32.0);
        assert_eq!(feedback_cycles(7), 2.0);
    }
}
