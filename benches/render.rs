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
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fmbridge::bridge::{initialize_player, InitOptions};
use fmbridge::output::OutputBuffers;
use fmbridge::player::PlayerKind;

const FRAMES: usize = 512;

/// Holds `notes` notes spread across the first eight channels.
fn chord(notes: u8) -> Vec<[u8; 3]> {
    (0..notes)
        .map(|i| [0x90 | (i % 8), 36 + (i * 5) % 60, 100])
        .collect()
}

fn benchmark_generate_outputs(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_outputs");

    for kind in [PlayerKind::Opl3, PlayerKind::Opn2] {
        for notes in [1u8, 8, 32] {
            let (mut realtime, _control) = initialize_player(InitOptions {
                kind,
                chips: 4,
                ..Default::default()
            })
            .unwrap();
            for msg in chord(notes) {
                realtime.play_midi(&msg);
            }

            let mut buffer = vec![0.0f32; FRAMES * 2];
            group.bench_with_input(
                BenchmarkId::new(kind.to_string(), notes),
                &notes,
                |b, _| {
                    b.iter(|| {
                        let mut output = OutputBuffers::interleaved(&mut buffer, 2);
                        realtime.generate_outputs(&mut output, black_box(FRAMES));
                    })
                },
            );
        }
    }

    group.finish();
}

fn benchmark_emulators(c: &mut Criterion) {
    let mut group = c.benchmark_group("emulators");

    let (mut realtime, control) = initialize_player(InitOptions {
        chips: 2,
        ..Default::default()
    })
    .unwrap();

    for (id, name) in control.emulators().iter().enumerate() {
        control.set_emulator_dynamic(id).unwrap();
        for msg in chord(16) {
            realtime.play_midi(&msg);
        }

        let mut left = vec![0.0f32; FRAMES];
        let mut right = vec![0.0f32; FRAMES];
        group.bench_function(*name, |b| {
            b.iter(|| {
                let mut output = OutputBuffers::planar(&mut left, &mut right, 1);
                realtime.generate_outputs(&mut output, black_box(FRAMES));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_generate_outputs, benchmark_emulators);
criterion_main!(benches);
