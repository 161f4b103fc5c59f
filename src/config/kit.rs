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
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::ConfigError;

/// Maximum number of voice slots in a kit.
pub const MAX_VOICES: usize = 32;

/// A YAML representation of a drum kit: a named, ordered mapping of voice
/// slots to sample files. Slot `n` is triggered by MIDI note
/// `base note + n`.
#[derive(Deserialize, Clone, Debug)]
pub struct KitManifest {
    /// The kit name.
    name: String,

    /// An optional free-form description of the kit.
    #[serde(default)]
    description: Option<String>,

    /// The voice slots of this kit.
    voices: Vec<VoiceEntry>,
}

/// A YAML representation of one voice slot.
#[derive(Deserialize, Clone, Debug)]
pub struct VoiceEntry {
    /// The slot this sample is triggered from.
    slot: u8,

    /// The sample file, absolute or relative to the manifest's directory.
    file: String,

    /// An optional display name (e.g. "Kick", "Snare").
    #[serde(default)]
    name: Option<String>,
}

impl VoiceEntry {
    /// Gets the voice slot.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Gets the sample file as written in the manifest.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Gets the display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl KitManifest {
    /// Gets the kit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the kit description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Gets the voice slots of this kit, in manifest order.
    pub fn voices(&self) -> &[VoiceEntry] {
        &self.voices
    }

    /// Checks the structural invariants of the manifest: at least one voice,
    /// and slots that are unique and contiguous from zero (the voice table
    /// is indexed by `note - base note`).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.voices.is_empty() {
            return Err(self.invalid("kit has no voices"));
        }
        if self.voices.len() > MAX_VOICES {
            return Err(self.invalid(format!(
                "kit has {} voices; at most {} are supported",
                self.voices.len(),
                MAX_VOICES
            )));
        }

        let mut seen = [false; MAX_VOICES];
        for voice in &self.voices {
            let slot = voice.slot as usize;
            if slot >= MAX_VOICES {
                return Err(self.invalid(format!(
                    "slot {} is out of range (0-{})",
                    slot,
                    MAX_VOICES - 1
                )));
            }
            if seen[slot] {
                return Err(self.invalid(format!("slot {} is mapped twice", slot)));
            }
            seen[slot] = true;
        }
        if let Some(gap) = seen.iter().take(self.voices.len()).position(|s| !s) {
            return Err(self.invalid(format!(
                "slot {} is unmapped; slots must be contiguous from 0",
                gap
            )));
        }

        Ok(())
    }

    /// Returns `(slot, resolved sample path)` pairs in slot order.
    pub fn sample_paths(&self, base_path: &Path) -> Vec<(usize, PathBuf)> {
        let mut paths: Vec<(usize, PathBuf)> = self
            .voices
            .iter()
            .map(|voice| {
                let file = Path::new(voice.file());
                let path = if file.is_absolute() {
                    file.to_path_buf()
                } else {
                    base_path.join(file)
                };
                (voice.slot() as usize, path)
            })
            .collect();
        paths.sort_by_key(|(slot, _)| *slot);
        paths
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidKit {
            kit: self.name.clone(),
            reason: reason.into(),
        }
    }
}
