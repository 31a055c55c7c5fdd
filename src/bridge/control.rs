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
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::MutexGuard;
use tracing::{debug, info, warn};

use super::sysex::Notification;
use super::telemetry::ChannelInfo;
use super::ActivePlayer;
use crate::player::{Error, Player, PlayerKind};

/// The control side of the bridge: reconfiguration and status.
///
/// Reconfiguration waits for the real-time thread to finish its current block,
/// silences every note, then applies the change. Status accessors never wait.
#[derive(Clone)]
pub struct Control {
    pub(super) shared: Arc<ActivePlayer>,
}

impl Control {
    pub(super) fn new(shared: Arc<ActivePlayer>) -> Control {
        Control { shared }
    }

    fn silence(&self, player: &mut Player) {
        player.backend_mut().panic();
        self.shared.telemetry.clear_all_notes();
    }

    /// Takes the player and silences it.
    fn silenced(&self) -> MutexGuard<'_, Player> {
        let mut player = self.shared.player.lock();
        self.silence(&mut player);
        player
    }

    /// Announces that the player is ready for input.
    pub fn player_ready(&self) {
        info!(
            player = self.name(),
            chips = self.chip_count(),
            "Player ready."
        );
    }

    /// Changes the number of emulated chips.
    pub fn set_chip_count_dynamic(&self, chips: usize) -> Result<(), Error> {
        let mut player = self.silenced();
        let result = player.backend_mut().set_chip_count(chips);
        self.shared
            .chips
            .store(player.backend().chip_count(), Ordering::Relaxed);
        match result {
            Ok(()) => {
                debug!(chips, "Changed chip count.");
                Ok(())
            }
            Err(e) => {
                warn!(chips, err = %e, "Unable to change chip count.");
                Err(e)
            }
        }
    }

    /// Switches to emulator `id`. Selecting the emulator the backend already runs does nothing.
    pub fn set_emulator_dynamic(&self, id: usize) -> Result<(), Error> {
        let mut player = self.shared.player.lock();
        if id == player.backend().current_emulator() {
            return Ok(());
        }

        self.silence(&mut player);
        match player.backend_mut().select_emulator(id) {
            Ok(()) => {
                self.shared.emulator.store(id, Ordering::Relaxed);
                debug!(
                    emulator = player.backend().current_emulator_name(),
                    "Switched emulator."
                );
                Ok(())
            }
            Err(e) => {
                warn!(emulator = id, err = %e, "Unable to switch emulator.");
                Err(e)
            }
        }
    }

    /// Loads a bank file. On failure the previous bank keeps playing.
    pub fn load_bank_dynamic(&self, path: &Path) -> Result<(), Error> {
        let mut player = self.silenced();
        match player.backend_mut().open_bank_file(path) {
            Ok(()) => {
                *self.shared.bank.lock() = Some(path.to_path_buf());
                debug!(bank = %path.display(), "Loaded bank.");
                Ok(())
            }
            Err(e) => {
                warn!(bank = %path.display(), err = %e, "Unable to load bank.");
                Err(e)
            }
        }
    }

    pub fn kind(&self) -> PlayerKind {
        self.shared.kind
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    pub fn version(&self) -> &'static str {
        self.shared.version
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    /// Every emulator the active player offers.
    pub fn emulators(&self) -> &'static [&'static str] {
        self.shared.kind.emulators()
    }

    pub fn emulator(&self) -> usize {
        self.shared.emulator.load(Ordering::Relaxed)
    }

    pub fn emulator_name(&self) -> &'static str {
        self.emulators()
            .get(self.emulator())
            .copied()
            .unwrap_or_default()
    }

    pub fn chip_count(&self) -> usize {
        self.shared.chips.load(Ordering::Relaxed)
    }

    /// The bank file in use, if one was loaded.
    pub fn bank_path(&self) -> Option<PathBuf> {
        self.shared.bank.lock().clone()
    }

    /// Output levels after the last block, left and right.
    pub fn levels(&self) -> (f64, f64) {
        self.shared.telemetry.levels()
    }

    /// Generation time over block duration for the last block. Above 1.0 means dropouts.
    pub fn load_ratio(&self) -> f64 {
        self.shared.telemetry.load_ratio()
    }

    pub fn volume(&self) -> u8 {
        self.shared.telemetry.volume()
    }

    /// Sets the output gain in percent, clamped to 100.
    pub fn set_volume(&self, percent: u8) {
        self.shared.telemetry.set_volume(percent);
    }

    /// Program, bank and note state of a MIDI channel (0-15).
    pub fn channel(&self, channel: u8) -> ChannelInfo {
        self.shared.telemetry.channel(channel)
    }

    /// The program last selected on each channel.
    pub fn programs(&self) -> [u8; 16] {
        std::array::from_fn(|channel| self.channel(channel as u8).program)
    }

    /// Receives notifications posted by the real-time thread.
    pub fn notifications(&self) -> Receiver<Notification> {
        self.shared.notify_rx.clone()
    }
}
