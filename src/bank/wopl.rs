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

//! WOPL (OPL3) bank files, versions 1 to 3.
//!
//! Layout: magic, version (LE), melodic and percussion set counts (BE), flags,
//! volume model, set metadata (version 2+), then 128 instruments per set.

use super::reader::{
    feedback_cycles, opl_rate_seconds, Reader, ATTACK_RATE_ONE_MS, DECAY_RATE_ONE_MS,
};
use super::{
    decode_name, Bank, BankError, Instrument, InstrumentSet, OperatorPatch, Patch, Routing,
    Waveform, BANK_SIZE,
};

const MAGIC: &[u8] = b"WOPL3-BANK\0";
const FORMAT: &str = "WOPL";
const LATEST_VERSION: u16 = 3;

const FLAG_FOUR_OP: u8 = 0x01;
const FLAG_PSEUDO_FOUR_OP: u8 = 0x02;
const FLAG_BLANK: u8 = 0x04;

const MULTIPLES: [f32; 16] = [
    0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 10.0, 12.0, 12.0, 15.0, 15.0,
];

/// Parses a complete WOPL bank.
pub fn parse(data: &[u8]) -> Result<Bank, BankError> {
    let mut reader = Reader::new(data);
    if !reader.magic(MAGIC) {
        return Err(BankError::BadMagic(FORMAT));
    }

    let version = reader.u16_le()?;
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
    let flags = reader.u8()?;
    let _volume_model = reader.u8()?;

    // Counts come from the header; check the file can hold them before allocating.
    let instrument_size = if version >= 3 { 66 } else { 62 };
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
        name: "WOPL".to_string(),
        melodic,
        percussion,
        deep_tremolo: flags & 0x01 != 0,
        deep_vibrato: flags & 0x02 != 0,
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
    let note_offset = [reader.i16_be()?, reader.i16_be()?];
    let velocity_offset = reader.i8()?;
    let second_voice_detune = reader.i8()?;
    let percussion_key = reader.u8()?;
    let flags = reader.u8()?;
    let fb_conn = [reader.u8()?, reader.u8()?];

    // File order is carrier 1, modulator 1, carrier 2, modulator 2.
    let mut operators = [OperatorPatch::default(); 4];
    for index in [1, 0, 3, 2] {
        operators[index] = read_operator(reader)?;
    }

    if version >= 3 {
        let _delay_on_ms = reader.u16_be()?;
        let _delay_off_ms = reader.u16_be()?;
    }

    let first_additive = fb_conn[0] & 0x01 != 0;
    let second_additive = fb_conn[1] & 0x01 != 0;
    let (routing, feedback, note_offset) = if flags & FLAG_FOUR_OP != 0 {
        (
            Routing::opl4(first_additive, second_additive),
            [feedback_cycles(fb_conn[0] >> 1), 0.0],
            [note_offset[0], note_offset[0]],
        )
    } else if flags & FLAG_PSEUDO_FOUR_OP != 0 {
        (
            Routing::pseudo4(first_additive, second_additive),
            [
                feedback_cycles(fb_conn[0] >> 1),
                feedback_cycles(fb_conn[1] >> 1),
            ],
            note_offset,
        )
    } else {
        (
            Routing::opl2(first_additive),
            [feedback_cycles(fb_conn[0] >> 1), 0.0],
            note_offset,
        )
    };

    Ok(Instrument {
        name,
        patch: Patch {
            operators,
            routing,
            feedback,
            note_offset,
            // Fine tune is expressed in 1/64ths of a semitone.
            second_pair_detune: second_voice_detune as f32 / 64.0,
            velocity_offset,
            percussion_key: (percussion_key != 0).then_some(percussion_key & 0x7f),
            blank: flags & FLAG_BLANK != 0,
        },
    })
}

fn read_operator(reader: &mut Reader) -> Result<OperatorPatch, BankError> {
    let avekm = reader.u8()?;
    let ksl_level = reader.u8()?;
    let attack_decay = reader.u8()?;
    let sustain_release = reader.u8()?;
    let waveform = reader.u8()?;

    let release = opl_rate_seconds(sustain_release & 0x0f, DECAY_RATE_ONE_MS);
    let sustaining = avekm & 0x20 != 0;
    Ok(OperatorPatch {
        multiple: MULTIPLES[(avekm & 0x0f) as usize],
        attenuation: (ksl_level & 0x3f) as f32 * 0.75,
        attack: attack_seconds(attack_decay >> 4),
        decay: opl_rate_seconds(attack_decay & 0x0f, DECAY_RATE_ONE_MS),
        sustain: sustain_db(sustain_release >> 4),
        sustain_decay: if sustaining { f32::INFINITY } else { release },
        release,
        waveform: Waveform::from_register(waveform),
        tremolo: avekm & 0x80 != 0,
        vibrato: avekm & 0x40 != 0,
    })
}

fn attack_seconds(rate: u8) -> f32 {
    // Rate 15 is instantaneous on the chip.
    if rate >= 15 {
        0.0
    } else {
        opl_rate_seconds(rate, ATTACK_RATE_ONE_MS)
    }
}

fn sustain_db(level: u8) -> f32 {
    match level & 0x0f {
        15 => 93.0,
        n => n as f32 * 3.0,
    }
}

/// Serializes a bank in WOPL version 3 layout. Used to produce fixtures.
#[cfg(test)]
pub(crate) fn write_test_bank(programs: &[(u8, [u8; 5], [u8; 5], u8)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&3u16.to_le_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.push(0);
    data.push(0);

    let mut name = [0u8; 32];
    name[..4].copy_from_slice(b"Test");
    data.extend_from_slice(&name);
    data.push(0);
    data.push(0);

    for program in 0..BANK_SIZE as u8 {
        let mut instrument = [0u8; 66];
        match programs.iter().find(|(p, ..)| *p == program) {
            Some((_, modulator, carrier, fb_conn)) => {
                instrument[0] = b'A' + (program % 26);
                instrument[40] = *fb_conn;
                instrument[42..47].copy_from_slice(carrier);
                instrument[47..52].copy_from_slice(modulator);
            }
            None => instrument[39] = FLAG_BLANK,
        }
        data.extend_from_slice(&instrument);
    }
    data
}

#[cfg(test)]
mod test {
    use super::*;

    const MODULATOR: [u8; 5] = [0x21, 0x10, 0xF2, 0x44, 0x00];
    const CARRIER: [u8; 5] = [0x21, 0x00, 0xF2, 0x44, 0x01];

    #[test]
    fn test_parse_fixture() {
        let data = write_test_bank(&[(0, MODULATOR, CARRIER, 0x0E), (5, MODULATOR, CARRIER, 0x01)]);
        let bank = parse(&data).unwrap();

        assert_eq!(bank.melodic.len(), 1);
        assert_eq!(bank.melodic[0].name, "Test");
        assert!(bank.percussion.is_empty());

        let piano = &bank.melodic[0].instruments[0];
        assert_eq!(piano.name, "A");
        assert!(!piano.patch.blank);
        assert_eq!(piano.patch.routing, Routing::opl2(false));
        assert_eq!(piano.patch.feedback[0], feedback_cycles(7));
        assert_eq!(piano.patch.operators[0].attenuation, 16.0 * 0.75);
        assert_eq!(piano.patch.operators[1].waveform, Waveform::HalfSine);
        assert_eq!(piano.patch.operators[0].multiple, 1.0);
        assert!(piano.patch.operators[0].sustain_decay.is_infinite());
        assert_eq!(piano.patch.operators[0].attack, 0.0);

        assert_eq!(bank.melodic[0].instruments[5].patch.routing, Routing::opl2(true));
        assert!(bank.melodic[0].instruments[1].patch.blank);
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(
            parse(b"WOPN2-BANK\0\x01\x00"),
            Err(BankError::BadMagic("WOPL"))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = write_test_bank(&[]);
        data[11] = 9;
        assert!(matches!(
            parse(&data),
            Err(BankError::UnsupportedVersion { version: 9, .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let data = write_test_bank(&[(0, MODULATOR, CARRIER, 0)]);
        assert!(matches!(
            parse(&data[..data.len() - 10]),
            Err(BankError::Truncated(_))
        ));
    }

    #[test]
    fn test_oversized_set_counts() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0xffffu16.to_be_bytes());
        data.extend_from_slice(&0xffffu16.to_be_bytes());
        data.extend_from_slice(&[0, 0]);
        assert!(matches!(parse(&data), Err(BankError::Truncated(19))));

        // One set short of what the header claims.
        let mut data = write_test_bank(&[]);
        data[14] = 2;
        assert!(matches!(parse(&data), Err(BankError::Truncated(_))));
    }

    #[test]
    fn test_empty() {
        let mut data = write_test_bank(&[]);
        data[13] = 0;
        data[14] = 0;
        assert!(matches!(parse(&data), Err(BankError::Empty)));
    }
}
