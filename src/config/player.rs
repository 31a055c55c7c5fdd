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
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::ConfigError;
use crate::bridge::InitOptions;
use crate::player::PlayerKind;
use crate::signal::{DEFAULT_DC_CUTOFF_HZ, DEFAULT_LEVEL_RELEASE};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHIPS: usize = 2;
const DEFAULT_VOLUME: u8 = 100;

/// A YAML representation of the player configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The synthesis backend (default: opl3).
    #[serde(default)]
    player: PlayerKind,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Number of emulated chips (default: 2)
    chips: Option<usize>,

    /// Bank file to load instead of the embedded bank.
    bank: Option<PathBuf>,

    /// Emulator id (default: 0)
    emulator: Option<usize>,

    /// Output gain in percent (default: 100)
    volume: Option<u8>,

    /// DC blocker cutoff in Hz (default: 5.0)
    dc_cutoff_hz: Option<f64>,

    /// Level meter release time, e.g. "300ms".
    level_release: Option<String>,
}

impl Player {
    /// Reads the configuration from a file. The format follows the extension.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?)
    }

    pub fn player(&self) -> PlayerKind {
        self.player
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn chips(&self) -> usize {
        self.chips.unwrap_or(DEFAULT_CHIPS)
    }

    pub fn bank(&self) -> Option<&Path> {
        self.bank.as_deref()
    }

    pub fn emulator(&self) -> usize {
        self.emulator.unwrap_or(0)
    }

    pub fn volume(&self) -> u8 {
        self.volume.unwrap_or(DEFAULT_VOLUME)
    }

    pub fn dc_cutoff_hz(&self) -> f64 {
        self.dc_cutoff_hz.unwrap_or(DEFAULT_DC_CUTOFF_HZ)
    }

    /// Returns the level meter release time (default: 300ms)
    pub fn level_release(&self) -> Result<Duration, ConfigError> {
        match &self.level_release {
            Some(release) => DurationString::from_string(release.clone())
                .map(Into::into)
                .map_err(|e| ConfigError::Invalid(format!("level_release: {}", e))),
            None => Ok(DEFAULT_LEVEL_RELEASE),
        }
    }

    /// Validates the configuration and converts it into startup options.
    pub fn init_options(&self) -> Result<InitOptions, ConfigError> {
        let sample_rate = self.sample_rate();
        if sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "sample_rate must be positive".to_string(),
            ));
        }
        let chips = self.chips();
        if chips == 0 {
            return Err(ConfigError::Invalid(
                "chips must be at least 1".to_string(),
            ));
        }
        let volume = self.volume();
        if volume > 100 {
            return Err(ConfigError::Invalid(format!(
                "volume must be at most 100, got {}",
                volume
            )));
        }
        let dc_cutoff_hz = self.dc_cutoff_hz();
        if !(dc_cutoff_hz > 0.0 && dc_cutoff_hz.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "dc_cutoff_hz must be positive, got {}",
                dc_cutoff_hz
            )));
        }

        Ok(InitOptions {
            kind: self.player(),
            sample_rate,
            chips,
            bank: self.bank.clone(),
            emulator: Some(self.emulator()),
            volume,
            dc_cutoff_hz,
            level_release: self.level_release()?,
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Player {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = parse("{}").init_options().unwrap();
        assert_eq!(
            options,
            InitOptions {
                emulator: Some(0),
                ..InitOptions::default()
            }
        );
    }

    #[test]
    fn test_full_config() {
        let player = parse(
            r#"
            player: opn2
            sample_rate: 48000
            chips: 4
            bank: /usr/share/banks/gm.wopn
            emulator: 2
            volume: 80
            dc_cutoff_hz: 10
            level_release: 1s
        "#,
        );

        let options = player.init_options().unwrap();
        assert_eq!(options.kind, PlayerKind::Opn2);
        assert_eq!(options.sample_rate, 48000);
        assert_eq!(options.chips, 4);
        assert_eq!(
            options.bank,
            Some(PathBuf::from("/usr/share/banks/gm.wopn"))
        );
        assert_eq!(options.emulator, Some(2));
        assert_eq!(options.volume, 80);
        assert_eq!(options.dc_cutoff_hz, 10.0);
        assert_eq!(options.level_release, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_values() {
        for yaml in [
            "sample_rate: 0",
            "chips: 0",
            "volume: 101",
            "dc_cutoff_hz: 0",
            "dc_cutoff_hz: -3.5",
            "level_release: soon",
        ] {
            let result = parse(yaml).init_options();
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "{} should be rejected",
                yaml
            );
        }
    }

    #[test]
    fn test_unknown_player() {
        let result: Result<Player, _> = Config::builder()
            .add_source(File::from_str("player: sid", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize();
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"player: opl3\nchips: 8\n").unwrap();

        let player = Player::deserialize(file.path()).unwrap();
        assert_eq!(player.player(), PlayerKind::Opl3);
        assert_eq!(player.chips(), 8);
        assert_eq!(player.bank(), None);
    }

    #[test]
    fn test_missing_file() {
        let result = Player::deserialize(Path::new("/nonexistent/fmbridge.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
