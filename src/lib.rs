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

//! A real-time bridge between MIDI input and polyphonic FM synthesis.
//!
//! The audio host creates the player with [`bridge::initialize_player`] (or
//! [`bridge::initialize_from_config`]), hands the [`bridge::Realtime`] half to its
//! callback thread and keeps the [`bridge::Control`] half for everything else.

pub mod bank;
pub mod bridge;
pub mod config;
pub mod output;
pub mod player;
pub mod signal;
pub mod synth;
pub mod thread_priority;
