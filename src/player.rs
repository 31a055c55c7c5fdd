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

//! Player backends.
//!
//! Every synthesis backend implements [`Backend`]. The set of backends is closed:
//! [`Player`] carries exactly one of them, tagged by its [`PlayerKind`].

mod fm;
#[cfg(test)]
pub(crate) mod mock;
mod opl3;
mod opn2;

use std::fmt;
use std::path::Path;

use midly::num::{u4, u7};
use midly::{MidiMessage, PitchBend};
use serde::Deserialize;

use crate::bank::BankError;
use crate::output::OutputBuffers;

pub use fm::FmBackend;
pub use opl3::Opl3;
pub use opn2::Opn2;

/// Errors reported by backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unable to initialize player: {0}")]
    Init(String),

    #[error("Emulator {id} is out of range, {count} available")]
    InvalidEmulator { id: usize, count: usize },

    #[error("Unable to load bank: {0}")]
    BankLoad(#[from] BankError),

    #[error("Chip count {requested} is outside 1..={max}")]
    ChipCount { requested: usize, max: usize },
}

/// Selects which backend is active.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    #[default]
    Opl3,
    Opn2,
    #[cfg(test)]
    #[serde(skip)]
    Mock,
}

impl PlayerKind {
    /// Lists the emulators this kind offers, without creating a player.
    pub fn emulators(&self) -> &'static [&'static str] {
        match self {
            PlayerKind::Opl3 => Opl3::enumerate_emulators(),
            PlayerKind::Opn2 => Opn2::enumerate_emulators(),
            #[cfg(test)]
            PlayerKind::Mock => mock::Mock::enumerate_emulators(),
        }
    }
}

impl fmt::Display for PlayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerKind::Opl3 => write!(f, "OPL3"),
            PlayerKind::Opn2 => write!(f, "OPN2"),
            #[cfg(test)]
            PlayerKind::Mock => write!(f, "Mock"),
        }
    }
}

/// The capabilities every synthesis backend provides.
///
/// Event and render methods run on the real-time thread and must not block,
/// allocate or perform I/O. Everything else is called from the control side.
pub trait Backend: Send {
    /// Creates a backend rendering at `sample_rate` Hz.
    fn init(sample_rate: u32) -> Result<Self, Error>
    where
        Self: Sized;

    /// The emulators this backend offers, indexed by id.
    fn enumerate_emulators() -> &'static [&'static str]
    where
        Self: Sized;

    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str;

    /// The emulator list of this instance.
    fn emulators(&self) -> &'static [&'static str];

    fn current_emulator(&self) -> usize;

    fn current_emulator_name(&self) -> &'static str {
        self.emulators()
            .get(self.current_emulator())
            .copied()
            .unwrap_or_default()
    }

    fn select_emulator(&mut self, id: usize) -> Result<(), Error>;

    /// Loads a bank file. On failure the current bank stays in place.
    fn open_bank_file(&mut self, path: &Path) -> Result<(), Error>;

    fn bank_name(&self) -> &str;

    fn set_chip_count(&mut self, chips: usize) -> Result<(), Error>;

    fn chip_count(&self) -> usize;

    /// Silences every sounding note.
    fn panic(&mut self);

    fn note_on(&mut self, channel: u4, key: u7, velocity: u7);

    fn note_off(&mut self, channel: u4, key: u7);

    fn poly_aftertouch(&mut self, channel: u4, key: u7, value: u7);

    fn channel_aftertouch(&mut self, channel: u4, value: u7);

    fn controller_change(&mut self, channel: u4, controller: u7, value: u7);

    fn program_change(&mut self, channel: u4, program: u7);

    fn pitch_bend(&mut self, channel: u4, bend: PitchBend);

    /// Renders `frames` stereo frames into `output`.
    fn render_block(&mut self, output: &mut OutputBuffers, frames: usize);

    /// Applies one decoded channel message.
    fn apply(&mut self, channel: u4, message: MidiMessage) {
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => self.note_off(channel, key),
            MidiMessage::NoteOn { key, vel } => self.note_on(channel, key, vel),
            MidiMessage::NoteOff { key, .. } => self.note_off(channel, key),
            MidiMessage::Aftertouch { key, vel } => self.poly_aftertouch(channel, key, vel),
            MidiMessage::Controller { controller, value } => {
                self.controller_change(channel, controller, value)
            }
            MidiMessage::ProgramChange { program } => self.program_change(channel, program),
            MidiMessage::ChannelAftertouch { vel } => self.channel_aftertouch(channel, vel),
            MidiMessage::PitchBend { bend } => self.pitch_bend(channel, bend),
        }
    }
}

/// The active backend.
pub enum Player {
    Opl3(Opl3),
    Opn2(Opn2),
    #[cfg(test)]
    Mock(mock::Mock),
}

impl Player {
    /// Creates a backend of the given kind.
    pub fn new(kind: PlayerKind, sample_rate: u32) -> Result<Player, Error> {
        Ok(match kind {
            PlayerKind::Opl3 => Player::Opl3(Opl3::init(sample_rate)?),
            PlayerKind::Opn2 => Player::Opn2(Opn2::init(sample_rate)?),
            #[cfg(test)]
            PlayerKind::Mock => Player::Mock(mock::Mock::init(sample_rate)?),
        })
    }

    pub fn kind(&self) -> PlayerKind {
        match self {
            Player::Opl3(_) => PlayerKind::Opl3,
            Player::Opn2(_) => PlayerKind::Opn2,
            #[cfg(test)]
            Player::Mock(_) => PlayerKind::Mock,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        match self {
            Player::Opl3(backend) => backend,
            Player::Opn2(backend) => backend,
            #[cfg(test)]
            Player::Mock(backend) => backend,
        }
    }

    pub fn backend_mut(&mut self) -> &mut dyn Backend {
        match self {
            Player::Opl3(backend) => backend,
            Player::Opn2(backend) => backend,
            #[cfg(test)]
            Player::Mock(backend) => backend,
        }
    }

    /// The mock backend, if that is what this player holds.
    #[cfg(test)]
    pub fn to_mock(&self) -> Option<&mock::Mock> {
        match self {
            Player::Mock(mock) => Some(mock),
            _ => None,
        }
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = self.backend();
        f.debug_struct("Player")
            .field("kind", &self.kind())
            .field("emulator", &backend.current_emulator_name())
            .field("chips", &backend.chip_count())
            .field("bank", &backend.bank_name())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_kind_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            player: PlayerKind,
        }
        let parsed: Wrapper = Config::builder()
            .add_source(File::from_str("player: opn2", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(parsed.player, PlayerKind::Opn2);
    }

    #[test]
    fn test_player_dispatch() {
        for kind in [PlayerKind::Opl3, PlayerKind::Opn2] {
            let player = Player::new(kind, 44100).unwrap();
            assert_eq!(player.kind(), kind);
            assert_eq!(player.backend().name(), kind.to_string());
            assert_eq!(player.backend().emulators(), kind.emulators());
            assert_eq!(player.backend().version(), env!("CARGO_PKG_VERSION"));
        }
    }

    #[test]
    fn test_init_rejects_zero_sample_rate() {
        assert!(matches!(
            Player::new(PlayerKind::Opl3, 0),
            Err(Error::Init(_))
        ));
    }

    #[test]
    fn test_emulator_round_trip() {
        for kind in [PlayerKind::Opl3, PlayerKind::Opn2] {
            let mut player = Player::new(kind, 44100).unwrap();
            let backend = player.backend_mut();
            let emulators = kind.emulators();
            for (id, name) in emulators.iter().enumerate() {
                backend.select_emulator(id).unwrap();
                assert_eq!(backend.current_emulator_name(), *name);
            }

            let last = emulators.len() - 1;
            assert!(matches!(
                backend.select_emulator(emulators.len()),
                Err(Error::InvalidEmulator { .. })
            ));
            assert_eq!(backend.current_emulator(), last);
        }
    }

    #[test]
    fn test_apply_routes_messages() {
        let mut player = Player::new(PlayerKind::Mock, 44100).unwrap();
        let backend = player.backend_mut();
        let channel = u4::from(3);
        backend.apply(
            channel,
            MidiMessage::NoteOn {
                key: u7::from(60),
                vel: u7::from(0),
            },
        );
        backend.apply(
            channel,
            MidiMessage::PitchBend {
                bend: PitchBend(midly::num::u14::from(0x2000)),
            },
        );
        let mock = player.to_mock().unwrap();
        assert_eq!(
            mock.events(),
            vec![
                mock::Event::NoteOff(3, 60),
                mock::Event::PitchBend(3, 0x2000),
            ]
        );
    }
}
