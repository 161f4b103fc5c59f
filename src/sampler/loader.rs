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

//! Background kit loading and publication.
//!
//! All file I/O and allocation happens on a dedicated worker thread. A kit
//! is published to the engine as a single unit over a channel, so the
//! real-time path only ever observes the old kit or the new one, never a
//! partially loaded mixture.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info};

use super::kit::{Kit, LoadError, Sample};
use super::voice::Voice;
use crate::config::{self, ConfigError};

/// Error loading a complete kit from a manifest.
#[derive(Debug, thiserror::Error)]
pub enum KitLoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sample(#[from] LoadError),
}

/// Status reports from the loader, delivered off the real-time path.
#[derive(Debug)]
pub enum LoaderStatus {
    /// A kit finished loading and was published.
    Loaded { kit: String },
    /// A kit failed to load; the previously published kit stays in effect.
    Failed { path: PathBuf, error: String },
}

/// A fully loaded kit plus a fresh, inert voice table, published as one
/// unit so installing it costs the real-time path no allocation.
pub struct KitUpdate {
    kit: Arc<Kit>,
    voices: Vec<Voice>,
}

impl KitUpdate {
    /// Creates an update for the given kit, preallocating its voice table.
    pub fn new(kit: Arc<Kit>) -> Self {
        let voices = vec![Voice::new(); kit.voice_count()];
        Self { kit, voices }
    }

    /// Splits the update into the kit and its voice table.
    pub(super) fn into_parts(self) -> (Arc<Kit>, Vec<Voice>) {
        (self.kit, self.voices)
    }
}

/// Handle to the kit loader worker. Dropping the handle closes the request
/// queue and joins the worker.
pub struct KitLoader {
    request_tx: Option<Sender<PathBuf>>,
    worker: Option<JoinHandle<()>>,
}

impl KitLoader {
    /// Spawns the loader worker. Returns the handle plus the kit
    /// publication channel (for the engine) and the status channel.
    pub fn spawn(target_sample_rate: u32) -> (Self, Receiver<KitUpdate>, Receiver<LoaderStatus>) {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<PathBuf>();
        let (kit_tx, kit_rx) = crossbeam_channel::unbounded();
        let (status_tx, status_rx) = crossbeam_channel::unbounded();

        let worker =
            thread::spawn(move || worker_loop(request_rx, kit_tx, status_tx, target_sample_rate));

        (
            Self {
                request_tx: Some(request_tx),
                worker: Some(worker),
            },
            kit_rx,
            status_rx,
        )
    }

    /// Requests a switch to the kit described by the given manifest. A new
    /// request supersedes any switch still in flight: if the superseded load
    /// completes anyway, its result is discarded rather than published.
    pub fn request_switch(&self, manifest: impl Into<PathBuf>) {
        let Some(request_tx) = &self.request_tx else {
            return;
        };
        if request_tx.send(manifest.into()).is_err() {
            error!("Kit loader worker is gone; dropping kit switch request");
        }
    }
}

impl Drop for KitLoader {
    fn drop(&mut self) {
        // Closing the request queue lets the worker run out.
        self.request_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    requests: Receiver<PathBuf>,
    kits: Sender<KitUpdate>,
    status: Sender<LoaderStatus>,
    target_sample_rate: u32,
) {
    while let Ok(mut path) = requests.recv() {
        // Collapse a backlog of requests into the newest one.
        while let Ok(newer) = requests.try_recv() {
            path = newer;
        }

        let result = load_kit(&path, target_sample_rate);

        // A request that arrived while loading wins over this result.
        if !requests.is_empty() {
            debug!(path = ?path, "Discarding superseded kit load");
            continue;
        }

        match result {
            Ok(kit) => {
                let name = kit.name().to_string();
                info!(
                    kit = name,
                    voices = kit.voice_count(),
                    "Kit loaded, publishing"
                );
                if kits.send(KitUpdate::new(Arc::new(kit))).is_err() {
                    // The engine side is gone; nothing left to serve.
                    return;
                }
                let _ = status.send(LoaderStatus::Loaded { kit: name });
            }
            Err(e) => {
                error!(path = ?path, error = %e, "Failed to load kit; keeping current kit");
                let _ = status.send(LoaderStatus::Failed {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Loads every sample of the kit described by the given manifest. Either
/// the whole kit loads, or the first failure aborts the load with nothing
/// published.
pub fn load_kit(manifest_path: &Path, target_sample_rate: u32) -> Result<Kit, KitLoadError> {
    let manifest = config::parse_kit(manifest_path)?;
    let base_path = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut samples = Vec::with_capacity(manifest.voices().len());
    for (slot, path) in manifest.sample_paths(base_path) {
        debug!(slot, path = ?path, "Loading voice sample");
        samples.push(Sample::load(&path, target_sample_rate)?);
    }

    Ok(Kit::new(manifest.name().to_string(), samples))
}
