// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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

//! MIDI-triggered drum sample playback.
//!
//! This module provides:
//! - Kits of in-memory sample buffers, loaded off the real-time path
//! - One-shot voices triggered by note-on events
//! - Per-cycle stereo mixing with bounded, allocation-free work
//! - A background loader that publishes kits atomically

mod engine;
mod kit;
mod loader;
mod voice;

pub use engine::{SamplerEngine, TimedEvent, DEFAULT_BASE_NOTE};
pub use loader::{KitLoader, LoaderStatus};

// These types are exported for external embedding and testing
#[allow(unused_imports)]
pub use kit::{Kit, LoadError, Sample};
#[allow(unused_imports)]
pub use loader::{load_kit, KitLoadError, KitUpdate};
#[allow(unused_imports)]
pub use voice::Voice;
