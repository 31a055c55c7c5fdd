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

//! The bridge between MIDI input, the active player and the audio host.
//!
//! [`initialize_player`] creates the single active player and splits access to it
//! into two halves:
//! - [`Realtime`], owned by the audio thread: MIDI dispatch and block generation
//! - [`Control`], cloneable: reconfiguration and status for everything else
//!
//! Both halves share one lock around the player. The real-time half only ever
//! tries it; the control half waits for it.

mod control;
mod decode;
mod realtime;
mod sysex;
mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{info, span, Level};

use crate::config;
use crate::player::{self, Player, PlayerKind};
use crate::signal::{SignalConditioner, DEFAULT_DC_CUTOFF_HZ, DEFAULT_LEVEL_RELEASE};

pub use control::Control;
pub use realtime::{load_ratio, Realtime};
pub use sysex::{Notification, TextInsert, MAX_TEXT};
pub use telemetry::ChannelInfo;

use telemetry::Telemetry;

/// Pending notifications kept for a slow reader.
const NOTIFICATION_CAPACITY: usize = 64;

/// Startup parameters for the active player.
#[derive(Debug, Clone, PartialEq)]
pub struct InitOptions {
    pub kind: PlayerKind,
    pub sample_rate: u32,
    pub chips: usize,
    /// Bank file to load; the embedded bank is used otherwise.
    pub bank: Option<PathBuf>,
    /// Emulator id; 0 otherwise.
    pub emulator: Option<usize>,
    /// Output gain in percent.
    pub volume: u8,
    pub dc_cutoff_hz: f64,
    pub level_release: Duration,
}

impl Default for InitOptions {
    fn default() -> Self {
        InitOptions {
            kind: PlayerKind::Opl3,
            sample_rate: 44100,
            chips: 2,
            bank: None,
            emulator: None,
            volume: 100,
            dc_cutoff_hz: DEFAULT_DC_CUTOFF_HZ,
            level_release: DEFAULT_LEVEL_RELEASE,
        }
    }
}

/// Startup failures. Nothing is left running when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Player(#[from] player::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

/// State shared by both halves of the bridge.
struct ActivePlayer {
    /// Serializes every use of the backend.
    player: Mutex<Player>,
    kind: PlayerKind,
    sample_rate: u32,
    name: &'static str,
    version: &'static str,
    emulator: AtomicUsize,
    chips: AtomicUsize,
    /// Only touched by the control side.
    bank: Mutex<Option<PathBuf>>,
    telemetry: Telemetry,
    notify_tx: Sender<Notification>,
    notify_rx: Receiver<Notification>,
}

/// Creates and configures the active player.
///
/// The player starts on its embedded bank, then the emulator is selected, the bank
/// file is loaded and the chip count is applied, in that order. Any failure aborts.
pub fn initialize_player(options: InitOptions) -> Result<(Realtime, Control), InitError> {
    let span = span!(Level::INFO, "initialize player");
    let _enter = span.enter();

    let mut player = Player::new(options.kind, options.sample_rate)?;
    let backend = player.backend_mut();
    info!(
        player = backend.name(),
        version = backend.version(),
        "Initializing player."
    );

    let emulator = options.emulator.unwrap_or(0);
    backend.select_emulator(emulator)?;
    info!(emulator = backend.current_emulator_name(), "Using emulator.");

    match &options.bank {
        Some(path) => {
            backend.open_bank_file(path)?;
            info!(bank = %path.display(), "Using bank file.");
        }
        None => info!(bank = backend.bank_name(), "Using embedded bank."),
    }

    backend.set_chip_count(options.chips)?;

    info!(
        dc_cutoff_hz = options.dc_cutoff_hz,
        level_release = ?options.level_release,
        "Signal conditioning configured."
    );
    let conditioner = SignalConditioner::new(
        options.sample_rate,
        options.dc_cutoff_hz,
        options.level_release,
    );

    let name = backend.name();
    let version = backend.version();
    let chips = backend.chip_count();

    let (notify_tx, notify_rx) = crossbeam_channel::bounded(NOTIFICATION_CAPACITY);
    let shared = Arc::new(ActivePlayer {
        kind: options.kind,
        sample_rate: options.sample_rate,
        name,
        version,
        emulator: AtomicUsize::new(emulator),
        chips: AtomicUsize::new(chips),
        bank: Mutex::new(options.bank.clone()),
        telemetry: Telemetry::new(options.volume),
        notify_tx,
        notify_rx,
        player: Mutex::new(player),
    });

    Ok((
        Realtime::new(shared.clone(), conditioner),
        Control::new(shared),
    ))
}

/// Reads a player configuration file and initializes the player from it.
pub fn initialize_from_config(path: &Path) -> Result<(Realtime, Control), InitError> {
    let options = config::Player::deserialize(path)?.init_options()?;
    initialize_player(options)
}
