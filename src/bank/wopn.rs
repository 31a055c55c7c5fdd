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

//! WOPN (OPN2) bank files, versions 1 and 2.

use super::reader::{
    feedback_cycles, opn_rate_seconds, Reader, ATTACK_RATE_ONE_MS, DECAY_RATE_ONE_MS,
};
use super::{
    decode_name, Bank, BankError, Instrument, InstrumentSet, OperatorPatch, Patch, Routing,
    BANK_SIZE,
};

const MAGIC_V1: &[u8] = b"WOPN2-BANK\0";
const MAGIC_V2: &[u8] = b"WOPN2-B2NK\0";
const FORMAT: &str = "WOPN";
const LATEST_VERSION: u16 = 2;

/// Parses a complete WOPN bank.
pub fn parse(data: &[u8]) -> Result<Bank, BankError> {
    let mut reader = Reader::new(data);
    let version = if reader.magic(MAGIC_V2) {
        reader.u16_le()?
    } else if reader.magic(MAGIC_V1) {
        1
    } else {
        return Err(BankError::BadMagic(FORMAT));
    };
    if version == 0 || version > LATEST_VERSION {
        return Err(BankError::UnsupportedVersion {
            format: FORMAT,
            version,
        });
    }

    let melodic_count = reader.u16_be()? as usize;
    let percussion_count = reader.u16_be()? as usize;
    if melodic_count == 0 {
        return Err(BankError::Empty);
    }
    let lfo = reader.u8()?;

    // Counts come from the header; check the file can hold them before allocating.
    let instrument_size = if version >= 2 { 69 } else { 65 };
    let metadata_size = if version >= 2 { 34 } else { 0 };
    let set_size = metadata_size + BANK_SIZE * instrument_size;
    reader.require((melodic_count + percussion_count) * set_size)?;

    let mut melodic = read_sets(&mut reader, version, melodic_count)?;
    let mut percussion = read_sets(&mut reader, version, percussion_count)?;

    for set in melodic.iter_mut().chain(percussion.iter_mut()) {
        for slot in set.instruments.iter_mut() {
            *slot = read_instrument(&mut reader, version)?;
        }
    }

    Ok(Bank {
        name: "WOPN".to_string(),
        melodic,
        percussion,
        deep_tremolo: lfo & 0x08 != 0,
        deep_vibrato: lfo & 0x08 != 0,
    })
}

fn read_sets(
    reader: &mut Reader,
    version: u16,
    count: usize,
) -> Result<Vec<InstrumentSet>, BankError> {
    (0..count)
        .map(|index| {
            if version >= 2 {
                let name = decode_name(reader.bytes(32)?);
                let lsb = reader.u8()?;
                let msb = reader.u8()?;
                Ok(InstrumentSet::new(&name, msb, lsb))
            } else {
                Ok(InstrumentSet::new(
                    "",
                    (index >> 7) as u8 & 0x7f,
                    index as u8 & 0x7f,
                ))
            }
        })
        .collect()
}

fn read_instrument(reader: &mut Reader, version: u16) -> Result<Instrument, BankError> {
    let name = decode_name(reader.bytes(32)?);
    let note_offset = reader.i16_be()?;
    let percussion_key = reader.u8()?;
    let fb_alg = reader.u8()?;
    let lfo_sensitivity = reader.u8()?;

    let tremolo_enabled = (lfo_sensitivity >> 4) & 0x03 != 0;
    let vibrato_enabled = lfo_sensitivity & 0x07 != 0;

    // Operators are stored in register order: S1, S3, S2, S4.
    let mut operators = [OperatorPatch::default(); 4];
    for index in [0, 2, 1, 3] {
        let mut operator = read_operator(reader)?;
        operator.tremolo &= tremolo_enabled;
        operator.vibrato = vibrato_enabled;
        operators[index] = operator;
    }

    if version >= 2 {
        let _delay_on_ms = reader.u16_be()?;
        let _delay_off_ms = reader.u16_be()?;
    }

    // A silent carrier set marks unused slots in most WOPN banks.
    let routing = Routing::opn(fb_alg & 0x07);
    let blank = name.is_empty()
        && operators
            .iter()
            .enumerate()
            .filter(|(i, _)| routing.carriers & (1 << i) != 0)
            .all(|(_, op)| op.attack.is_infinite());

    Ok(Instrument {
        name,
        patch: Patch {
            operators,
            routing,
            feedback: [feedback_cycles(fb_alg >> 3), 0.0],
            note_offset: [note_offset, note_offset],
            second_pair_detune: 0.0,
            velocity_offset: 0,
            percussion_key: (percussion_key != 0).then_some(percussion_key & 0x7f),
            blank,
        },
    })
}

fn read_operator(reader: &mut Reader) -> Result<OperatorPatch, BankError> {
    let detune_multiple = reader.u8()?;
    let level = reader.u8()?;
    let scale_attack = reader.u8()?;
    let am_decay1 = reader.u8()?;
    let decay2 = reader.u8()?;
    let sustain_release = reader.u8()?;
    let _ssg_eg = reader.u8()?;

    let multiple = match detune_multiple & 0x0f {
        0 => 0.5,
        n => n as f32,
    };
    let attack_rate = scale_attack & 0x1f;
    Ok(OperatorPatch {
        multiple,
        attenuation: (level & 0x7f) as f32 * 0.75,
        attack: if attack_rate >= 31 {
            0.0
        } else {
            opn_rate_seconds(attack_rate, ATTACK_RATE_ONE_MS)
        },
        decay: opn_rate_seconds(am_decay1 & 0x1f, DECAY_RATE_ONE_MS),
        sustain: match sustain_release >> 4 {
            15 => 93.0,
            n => n as f32 * 3.0,
        },
        sustain_decay: opn_rate_seconds(decay2 & 0x1f, DECAY_RATE_ONE_MS),
        release: opn_rate_seconds(((sustain_release & 0x0f) << 1) | 1, DECAY_RATE_ONE_MS),
        waveform: Default::default(),
        tremolo: am_decay1 & 0x80 != 0,
        vibrato: false,
    })
}

/// Serializes a version 2 bank where the listed programs use the given algorithm.
#[cfg(test)]
pub(crate) fn write_test_bank(programs: &[(u8, u8)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC_V2);
    data.extend_from_slice(&2u16.to_le_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.push(0);

    data.extend_from_slice(&[0u8; 32]);
    data.push(0);
    data.push(0);

    for program in 0..BANK_SIZE as u8 {
        let mut instrument = [0u8; 69];
        if let Some((_, fb_alg)) = programs.iter().find(|(p, _)| *p == program) {
            instrument[0] = b'P';
            instrument[35] = *fb_alg;
            for op in 0..4 {
                let base = 37 + op * 7;
                instrument[base] = 0x01;
                instrument[base + 1] = if op == 3 { 0x00 } else { 0x20 };
                instrument[base + 2] = 0x1f;
                instrument[base + 3] = 0x05;
                instrument[base + 4] = 0x02;
                instrument[base + 5] = 0x27;
            }
        }
        data.extend_from_slice(&instrument);
    }
    data
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_fixture() {
        let data = write_test_bank(&[(0, 0x3C), (1, 0x07)]);
        let bank = parse(&data).unwrap();

        assert_eq!(bank.melodic.len(), 1);
        let first = &bank.melodic[0].instruments[0].patch;
        assert!(!first.blank);
        assert_eq!(first.routing, Routing::opn(4));
        assert_eq!(first.feedback[0], feedback_cycles(7));
        assert_eq!(first.operators[0].multiple, 1.0);
        assert_eq!(first.operators[0].attack, 0.0);
        assert_eq!(first.operators[0].sustain, 6.0);
        // The last stored operator is S4 and has no attenuation.
        assert_eq!(first.operators[3].attenuation, 0.0);
        assert_eq!(first.operators[1].attenuation, 32.0 * 0.75);

        assert_eq!(bank.melodic[0].instruments[1].patch.routing, Routing::opn(7));
        assert!(bank.melodic[0].instruments[2].patch.blank);
    }

    #[test]
    fn test_version_one_magic() {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC_V1);
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.push(0);
        data.extend(std::iter::repeat(0u8).take(65 * 128));

        let bank = parse(&data).unwrap();
        assert_eq!(bank.melodic.len(), 1);
        assert!(bank.melodic[0].instruments.iter().all(|i| i.patch.blank));
    }

    #[test]
    fn test_oversized_set_counts() {
        let mut data = MAGIC_V2.to_vec();
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&0xffffu16.to_be_bytes());
        data.extend_from_slice(&0xffffu16.to_be_bytes());
        data.push(0);
        assert!(matches!(parse(&data), Err(BankError::Truncated(18))));

        let mut data = MAGIC_V1.to_vec();
        data.extend_from_slice(&0xffffu16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.push(0);
        data.extend(std::iter::repeat(0u8).take(65 * 128));
        assert!(matches!(parse(&data), Err(BankError::Truncated(_))));
    }

    #[test]
    fn test_rejects_opl_bank() {
        let data = crate::bank::wopl::write_test_bank(&[]);
        assert!(matches!(parse(&data), Err(BankError::BadMagic("WOPN"))));
    }
}
