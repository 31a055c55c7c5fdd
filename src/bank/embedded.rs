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

//! Built-in General MIDI style banks, generated from one template per program family.

use super::{
    Bank, Instrument, InstrumentSet, OperatorPatch, Patch, Routing, Waveform, SILENCE_DB,
};

/// Family template for a two-operator sound.
struct Template {
    name: &'static str,
    modulator_multiple: f32,
    modulator_level: f32,
    carrier_multiple: f32,
    attack: f32,
    decay: f32,
    sustain: f32,
    sustain_decay: f32,
    release: f32,
    feedback: f32,
    additive: bool,
    waveforms: (Waveform, Waveform),
}

const fn template(
    name: &'static str,
    multiples: (f32, f32),
    modulator_level: f32,
    envelope: (f32, f32, f32, f32, f32),
    feedback: f32,
    additive: bool,
    waveforms: (Waveform, Waveform),
) -> Template {
    Template {
        name,
        modulator_multiple: multiples.0,
        modulator_level,
        carrier_multiple: multiples.1,
        attack: envelope.0,
        decay: envelope.1,
        sustain: envelope.2,
        sustain_decay: envelope.3,
        release: envelope.4,
        feedback,
        additive,
        waveforms,
    }
}

const INF: f32 = f32::INFINITY;

use super::Waveform::{AbsSine, HalfSine, Sine, Square};

const FAMILIES: [Template; 16] = [
    template("Piano", (1.0, 1.0), 18.0, (0.002, 1.2, 12.0, 6.0, 0.3), 0.0625, false, (Sine, Sine)),
    template("Chromatic Percussion", (3.5, 1.0), 14.0, (0.001, 0.8, 30.0, 2.5, 0.4), 0.0, false, (Sine, Sine)),
    template("Organ", (2.0, 1.0), 6.0, (0.005, INF, 0.0, INF, 0.05), 0.0, true, (Sine, AbsSine)),
    template("Guitar", (3.0, 1.0), 16.0, (0.001, 0.9, 18.0, 3.0, 0.2), 0.125, false, (HalfSine, Sine)),
    template("Bass", (1.0, 0.5), 12.0, (0.001, 0.6, 9.0, 4.0, 0.1), 0.25, false, (Sine, Sine)),
    template("Strings", (1.0, 1.0), 22.0, (0.25, 2.0, 3.0, INF, 0.4), 0.125, false, (Sine, Sine)),
    template("Ensemble", (2.0, 1.0), 24.0, (0.3, 2.0, 3.0, INF, 0.5), 0.0625, false, (Sine, Sine)),
    template("Brass", (1.0, 1.0), 10.0, (0.04, 1.5, 3.0, INF, 0.15), 0.25, false, (Sine, Sine)),
    template("Reed", (2.0, 1.0), 14.0, (0.03, 1.5, 3.0, INF, 0.1), 0.125, false, (Sine, Sine)),
    template("Pipe", (1.0, 1.0), 26.0, (0.05, INF, 0.0, INF, 0.1), 0.0, true, (Sine, Sine)),
    template("Synth Lead", (1.0, 1.0), 12.0, (0.005, INF, 0.0, INF, 0.1), 0.5, false, (Square, Sine)),
    template("Synth Pad", (0.5, 1.0), 20.0, (0.6, 3.0, 6.0, INF, 1.2), 0.125, false, (Sine, Sine)),
    template("Synth Effects", (7.0, 1.0), 16.0, (0.2, 4.0, 9.0, 8.0, 1.5), 0.5, false, (Sine, HalfSine)),
    template("Ethnic", (4.0, 1.0), 15.0, (0.001, 0.7, 24.0, 2.0, 0.2), 0.125, false, (Sine, Sine)),
    template("Percussive", (2.5, 1.0), 12.0, (0.001, 0.3, 40.0, 0.8, 0.1), 0.25, false, (Sine, Sine)),
    template("Sound Effects", (9.0, 1.0), 4.0, (0.05, 2.0, 12.0, 4.0, 0.5), 2.0, false, (Sine, Sine)),
];

#[derive(Clone, Copy, PartialEq)]
enum Flavor {
    Opl3,
    Opn2,
}

fn operator(
    multiple: f32,
    attenuation: f32,
    t: &Template,
    waveform: Waveform,
    flavor: Flavor,
) -> OperatorPatch {
    OperatorPatch {
        multiple,
        attenuation,
        attack: t.attack,
        decay: t.decay,
        sustain: t.sustain,
        sustain_decay: t.sustain_decay,
        release: t.release,
        waveform: if flavor == Flavor::Opl3 {
            waveform
        } else {
            Waveform::Sine
        },
        tremolo: false,
        vibrato: false,
    }
}

fn melodic_patch(program: u8, flavor: Flavor) -> Patch {
    let family = &FAMILIES[(program >> 3) as usize];
    let variant = (program & 0x07) as f32;
    let modulator_level = family.modulator_level + variant * 1.5;
    let modulator_multiple = if program & 0x01 != 0 && family.modulator_multiple >= 1.0 {
        family.modulator_multiple * 2.0
    } else {
        family.modulator_multiple
    };

    let modulator = operator(
        modulator_multiple,
        modulator_level,
        family,
        family.waveforms.0,
        flavor,
    );
    let carrier = operator(
        family.carrier_multiple,
        0.0,
        family,
        family.waveforms.1,
        flavor,
    );

    let (operators, routing) = match flavor {
        Flavor::Opl3 => (
            [modulator, carrier, OperatorPatch::default(), OperatorPatch::default()],
            Routing::opl2(family.additive),
        ),
        // OPN2 doubles the pair, with the second pair an octave up and quieter for body.
        Flavor::Opn2 => {
            let mut upper_modulator = modulator;
            upper_modulator.attenuation += 6.0;
            let mut upper_carrier = carrier;
            upper_carrier.multiple *= 2.0;
            upper_carrier.attenuation = 12.0;
            (
                [modulator, carrier, upper_modulator, upper_carrier],
                Routing::opn(if family.additive { 7 } else { 4 }),
            )
        }
    };

    Patch {
        operators,
        routing,
        feedback: [family.feedback, 0.0],
        note_offset: [0, 0],
        second_pair_detune: 0.0,
        velocity_offset: 0,
        percussion_key: None,
        blank: false,
    }
}

/// Drum kinds laid out on the General MIDI percussion map.
fn percussion_patch(note: u8, flavor: Flavor) -> Patch {
    // (key, modulator multiple, modulator level, decay, feedback)
    let (key, multiple, level, decay, feedback) = match note {
        35 | 36 => (30, 1.0, 10.0, 0.25, 0.0),
        38 | 40 => (60, 7.0, 2.0, 0.2, 2.0),
        39 => (64, 9.0, 0.0, 0.15, 2.0),
        42 | 44 => (90, 15.0, 0.0, 0.06, 2.0),
        46 => (90, 15.0, 0.0, 0.4, 2.0),
        41 | 43 | 45 | 47 | 48 | 50 => (note, 1.0, 14.0, 0.4, 0.0625),
        49 | 51 | 52 | 53 | 55 | 57 | 59 => (84, 12.0, 0.0, 2.0, 2.0),
        35..=81 => (note, 2.0, 12.0, 0.3, 0.25),
        _ => return Patch::default(),
    };

    let envelope = template(
        "Drum",
        (multiple, 1.0),
        level,
        (0.0, decay, SILENCE_DB, decay, decay),
        feedback,
        false,
        (Sine, Sine),
    );
    let modulator = operator(multiple, level, &envelope, Sine, flavor);
    let carrier = operator(1.0, 0.0, &envelope, Sine, flavor);
    let (operators, routing) = match flavor {
        Flavor::Opl3 => (
            [modulator, carrier, OperatorPatch::default(), OperatorPatch::default()],
            Routing::opl2(false),
        ),
        Flavor::Opn2 => {
            let mut silent = carrier;
            silent.attenuation = SILENCE_DB;
            ([modulator, carrier, silent, silent], Routing::opn(4))
        }
    };

    Patch {
        operators,
        routing,
        feedback: [feedback, 0.0],
        note_offset: [0, 0],
        second_pair_detune: 0.0,
        velocity_offset: 0,
        percussion_key: Some(key),
        blank: false,
    }
}

fn build(name: &str, flavor: Flavor) -> Bank {
    let mut melodic = InstrumentSet::new("General MIDI", 0, 0);
    for (program, slot) in melodic.instruments.iter_mut().enumerate() {
        let family = &FAMILIES[program >> 3];
        *slot = Instrument {
            name: format!("{} {}", family.name, (program & 0x07) + 1),
            patch: melodic_patch(program as u8, flavor),
        };
    }

    let mut percussion = InstrumentSet::new("Standard Kit", 0, 0);
    for (note, slot) in percussion.instruments.iter_mut().enumerate() {
        *slot = Instrument {
            name: format!("Drum {}", note),
            patch: percussion_patch(note as u8, flavor),
        };
    }

    Bank {
        name: name.to_string(),
        melodic: vec![melodic],
        percussion: vec![percussion],
        deep_tremolo: false,
        deep_vibrato: false,
    }
}

/// The bank OPL3 players start with.
pub fn opl3_default() -> Bank {
    build("Embedded OPL3", Flavor::Opl3)
}

/// The bank OPN2 players start with.
pub fn opn2_default() -> Bank {
    build("Embedded OPN2", Flavor::Opn2)
}
