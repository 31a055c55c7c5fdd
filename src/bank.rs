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

//! Instrument banks.
//!
//! This module provides:
//! - A chip-neutral instrument model (`Patch`) the synthesizer plays from
//! - Parsers for WOPL (OPL3) and WOPN (OPN2) bank files
//! - Embedded default banks for each chip family

mod embedded;
mod reader;
mod wopl;
mod wopn;

use std::fs;
use std::path::Path;

pub use embedded::{opl3_default, opn2_default};
pub use wopl::parse as parse_wopl;
pub use wopn::parse as parse_wopn;

#[cfg(test)]
pub(crate) use wopl::write_test_bank as write_test_wopl;
#[cfg(test)]
pub(crate) use wopn::write_test_bank as write_test_wopn;

/// Number of instruments in every melodic or percussion bank.
pub const BANK_SIZE: usize = 128;

/// Decibels of attenuation treated as silence.
pub const SILENCE_DB: f32 = 96.0;

/// Errors raised while reading a bank file.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("Unable to read bank file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a {0} bank file")]
    BadMagic(&'static str),

    #[error("Unsupported {format} bank version {version}")]
    UnsupportedVersion { format: &'static str, version: u16 },

    #[error("Bank data is truncated at offset {0}")]
    Truncated(usize),

    #[error("Bank contains no melodic instruments")]
    Empty,
}

/// OPL3 operator waveforms. OPN2 operators always use `Sine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    HalfSine,
    AbsSine,
    PulseSine,
    AlternatingSine,
    CamelSine,
    Square,
    LogSaw,
}

impl Waveform {
    /// Decodes the OPL3 waveform select register.
    pub fn from_register(value: u8) -> Waveform {
        match value & 0x07 {
            0 => Waveform::Sine,
            1 => Waveform::HalfSine,
            2 => Waveform::AbsSine,
            3 => Waveform::PulseSine,
            4 => Waveform::AlternatingSine,
            5 => Waveform::CamelSine,
            6 => Waveform::Square,
            _ => Waveform::LogSaw,
        }
    }
}

/// One FM operator, in chip-independent units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatorPatch {
    /// Frequency multiple of the voice pitch.
    pub multiple: f32,
    /// Output attenuation in dB.
    pub attenuation: f32,
    /// Seconds to reach full level from silence. Infinite means the operator never sounds.
    pub attack: f32,
    /// Seconds per 96 dB during decay.
    pub decay: f32,
    /// Attenuation in dB at which decay ends.
    pub sustain: f32,
    /// Seconds per 96 dB while sustaining. Infinite holds the level.
    pub sustain_decay: f32,
    /// Seconds per 96 dB after key-off.
    pub release: f32,
    pub waveform: Waveform,
    pub tremolo: bool,
    pub vibrato: bool,
}

impl Default for OperatorPatch {
    fn default() -> Self {
        OperatorPatch {
            multiple: 1.0,
            attenuation: SILENCE_DB,
            attack: 0.0,
            decay: f32::INFINITY,
            sustain: 0.0,
            sustain_decay: f32::INFINITY,
            release: 0.0,
            waveform: Waveform::Sine,
            tremolo: false,
            vibrato: false,
        }
    }
}

/// Signal flow between the four operators of a voice.
///
/// Operators are evaluated in index order; `modulators[i]` is a bit set of lower-indexed
/// operators whose output phase-modulates operator `i`, and `carriers` is the bit set of
/// operators summed into the voice output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub modulators: [u8; 4],
    pub carriers: u8,
    /// Number of operators in use, counted from index 0.
    pub operators: u8,
}

impl Routing {
    /// OPL 2-op: FM (modulator into carrier) or additive.
    pub const fn opl2(additive: bool) -> Routing {
        if additive {
            Routing {
                modulators: [0, 0, 0, 0],
                carriers: 0b0011,
                operators: 2,
            }
        } else {
            Routing {
                modulators: [0, 0b0001, 0, 0],
                carriers: 0b0010,
                operators: 2,
            }
        }
    }

    /// OPL3 4-op, selected by the connection bits of both channel halves.
    pub const fn opl4(first_additive: bool, second_additive: bool) -> Routing {
        match (first_additive, second_additive) {
            (false, false) => Routing {
                modulators: [0, 0b0001, 0b0010, 0b0100],
                carriers: 0b1000,
                operators: 4,
            },
            (true, false) => Routing {
                modulators: [0, 0, 0b0010, 0b0100],
                carriers: 0b1001,
                operators: 4,
            },
            (false, true) => Routing {
                modulators: [0, 0b0001, 0, 0b0100],
                carriers: 0b1010,
                operators: 4,
            },
            (true, true) => Routing {
                modulators: [0, 0, 0b0010, 0],
                carriers: 0b1101,
                operators: 4,
            },
        }
    }

    /// Two independent OPL 2-op pairs sounding together.
    pub const fn pseudo4(first_additive: bool, second_additive: bool) -> Routing {
        Routing {
            modulators: [
                0,
                if first_additive { 0 } else { 0b0001 },
                0,
                if second_additive { 0 } else { 0b0100 },
            ],
            carriers: (if first_additive { 0b0011 } else { 0b0010 })
                | (if second_additive { 0b1100 } else { 0b1000 }),
            operators: 4,
        }
    }

    /// The eight OPN2 algorithms, with operators in slot order S1..S4.
    pub const fn opn(algorithm: u8) -> Routing {
        let (modulators, carriers) = match algorithm & 0x07 {
            0 => ([0, 0b0001, 0b0010, 0b0100], 0b1000),
            1 => ([0, 0, 0b0011, 0b0100], 0b1000),
            2 => ([0, 0, 0b0010, 0b0101], 0b1000),
            3 => ([0, 0b0001, 0, 0b0110], 0b1000),
            4 => ([0, 0b0001, 0, 0b0100], 0b1010),
            5 => ([0, 0b0001, 0b0001, 0b0001], 0b1110),
            6 => ([0, 0b0001, 0, 0], 0b1110),
            _ => ([0, 0, 0, 0], 0b1111),
        };
        Routing {
            modulators,
            carriers,
            operators: 4,
        }
    }
}

/// Everything a voice needs to sound an instrument. `Copy` so note-on never allocates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Patch {
    pub operators: [OperatorPatch; 4],
    pub routing: Routing,
    /// Self-modulation in cycles for operators 0 and 2.
    pub feedback: [f32; 2],
    /// Semitone offsets for operators 0-1 and 2-3.
    pub note_offset: [i16; 2],
    /// Extra semitone detune for operators 2-3.
    pub second_pair_detune: f32,
    pub velocity_offset: i8,
    /// Fixed key for percussion instruments.
    pub percussion_key: Option<u8>,
    /// Blank instruments never sound.
    pub blank: bool,
}

impl Default for Patch {
    fn default() -> Self {
        Patch {
            operators: [OperatorPatch::default(); 4],
            routing: Routing::opl2(false),
            feedback: [0.0; 2],
            note_offset: [0; 2],
            second_pair_detune: 0.0,
            velocity_offset: 0,
            percussion_key: None,
            blank: true,
        }
    }
}

/// A named instrument.
#[derive(Debug, Clone, Default)]
pub struct Instrument {
    pub name: String,
    pub patch: Patch,
}

/// 128 instruments addressed by bank select.
#[derive(Debug, Clone)]
pub struct InstrumentSet {
    pub name: String,
    pub msb: u8,
    pub lsb: u8,
    pub instruments: Vec<Instrument>,
}

impl InstrumentSet {
    /// Creates an empty set for the given bank select.
    pub fn new(name: &str, msb: u8, lsb: u8) -> InstrumentSet {
        InstrumentSet {
            name: name.to_string(),
            msb,
            lsb,
            instruments: vec![Instrument::default(); BANK_SIZE],
        }
    }
}

/// A complete instrument bank.
#[derive(Debug, Clone)]
pub struct Bank {
    pub name: String,
    pub melodic: Vec<InstrumentSet>,
    pub percussion: Vec<InstrumentSet>,
    pub deep_tremolo: bool,
    pub deep_vibrato: bool,
}

static BLANK: Patch = Patch {
    operators: [OperatorPatch {
        multiple: 1.0,
        attenuation: SILENCE_DB,
        attack: 0.0,
        decay: f32::INFINITY,
        sustain: 0.0,
        sustain_decay: f32::INFINITY,
        release: 0.0,
        waveform: Waveform::Sine,
        tremolo: false,
        vibrato: false,
    }; 4],
    routing: Routing::opl2(false),
    feedback: [0.0; 2],
    note_offset: [0; 2],
    second_pair_detune: 0.0,
    velocity_offset: 0,
    percussion_key: None,
    blank: true,
};

impl Bank {
    /// Looks up a melodic instrument, falling back to the first set for unknown banks.
    pub fn melodic(&self, msb: u8, lsb: u8, program: u8) -> &Patch {
        Self::lookup(&self.melodic, msb, lsb, program)
    }

    /// Looks up a percussion instrument by note.
    pub fn percussion(&self, msb: u8, lsb: u8, note: u8) -> &Patch {
        Self::lookup(&self.percussion, msb, lsb, note)
    }

    fn lookup(sets: &[InstrumentSet], msb: u8, lsb: u8, index: u8) -> &Patch {
        let set = sets
            .iter()
            .find(|set| set.msb == msb && set.lsb == lsb)
            .or_else(|| sets.first());
        match set.and_then(|set| set.instruments.get(index as usize & 0x7f)) {
            Some(instrument) => &instrument.patch,
            None => &BLANK,
        }
    }

    /// Counts the non-blank instruments.
    pub fn instrument_count(&self) -> usize {
        self.melodic
            .iter()
            .chain(self.percussion.iter())
            .flat_map(|set| set.instruments.iter())
            .filter(|instrument| !instrument.patch.blank)
            .count()
    }
}

/// The bank file formats understood by the players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankFormat {
    Wopl,
    Wopn,
}

/// Reads and fully parses a bank file. Nothing is returned unless the whole file is valid.
pub fn load(path: &Path, format: BankFormat) -> Result<Bank, BankError> {
    let data = fs::read(path)?;
    let mut bank = match format {
        BankFormat::Wopl => parse_wopl(&data)?,
        BankFormat::Wopn => parse_wopn(&data)?,
    };
    if let Some(stem) = path.file_stem() {
        bank.name = stem.to_string_lossy().into_owned();
    }
    Ok(bank)
}

/// Decodes a fixed-size, NUL-padded instrument or bank name.
pub(crate) fn decode_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_falls_back_to_first_set() {
        let bank = opl3_default();
        let patch = bank.melodic(42, 42, 0);
        assert_eq!(patch, bank.melodic(0, 0, 0));
        assert!(!patch.blank);
    }

    #[test]
    fn test_lookup_empty_bank_is_blank() {
        let bank = Bank {
            name: "empty".to_string(),
            melodic: Vec::new(),
            percussion: Vec::new(),
            deep_tremolo: false,
            deep_vibrato: false,
        };
        assert!(bank.melodic(0, 0, 10).blank);
        assert!(bank.percussion(0, 0, 36).blank);
    }

    #[test]
    fn test_routing_carriers_are_never_modulating_later_ops() {
        for algorithm in 0..8 {
            let routing = Routing::opn(algorithm);
            for (i, mods) in routing.modulators.iter().enumerate() {
                assert_eq!(mods >> i, 0, "algorithm {algorithm} op {i} has forward input");
            }
            assert_ne!(routing.carriers & 0b1000, 0);
        }
    }

    #[test]
    fn test_missing_file() {
        let result = load(Path::new("nonexistent.wopl"), BankFormat::Wopl);
        assert!(matches!(result, Err(BankError::Io(_))));
    }

    #[test]
    fn test_decode_name() {
        assert_eq!(decode_name(b"Grand Piano\0\0\0garbage"), "Grand Piano");
        assert_eq!(decode_name(b"Full"), "Full");
    }
}
