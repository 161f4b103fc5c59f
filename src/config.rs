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

//! Kit manifest parsing and discovery.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::error;

mod error;
mod kit;

pub use error::ConfigError;
pub use kit::{KitManifest, VoiceEntry};

// Exported for external embedding
#[allow(unused_imports)]
pub use kit::MAX_VOICES;

/// Parses and validates a kit manifest from a YAML file.
pub fn parse_kit(file: &Path) -> Result<KitManifest, ConfigError> {
    let manifest: KitManifest = serde_yml::from_str(&fs::read_to_string(file)?)?;
    manifest.validate()?;
    Ok(manifest)
}

/// Recurse into the given path and return all valid kit manifests found.
/// Manifests that fail to parse or validate are logged and skipped.
pub fn scan_kits(path: &Path) -> Result<Vec<(PathBuf, KitManifest)>, ConfigError> {
    let mut kits = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            kits.extend(scan_kits(&path)?);
            continue;
        }

        if path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
            match parse_kit(&path) {
                Ok(manifest) => kits.push((path, manifest)),
                Err(e) => error!(path = ?path, error = %e, "Skipping unparseable kit manifest"),
            }
        }
    }

    Ok(kits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_kits_recurses_and_skips_broken_manifests() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).expect("mkdir");

        fs::write(
            dir.path().join("one.yaml"),
            "name: One\nvoices:\n  - slot: 0\n    file: kick.wav\n",
        )
        .expect("write manifest");
        fs::write(
            nested.join("two.yml"),
            "name: Two\nvoices:\n  - slot: 0\n    file: snare.wav\n",
        )
        .expect("write manifest");
        // Broken YAML and a non-manifest file are both skipped.
        fs::write(nested.join("broken.yaml"), "name: [unclosed\n").expect("write manifest");
        fs::write(dir.path().join("notes.txt"), "not a kit").expect("write file");

        let mut kits = scan_kits(dir.path()).expect("scan");
        kits.sort_by(|a, b| a.1.name().cmp(b.1.name()));

        assert_eq!(kits.len(), 2);
        assert_eq!(kits[0].1.name(), "One");
        assert_eq!(kits[1].1.name(), "Two");
    }
}
