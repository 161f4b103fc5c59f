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
mod audio;
mod config;
mod sampler;
#[cfg(test)]
mod testutil;

use std::error::Error;
use std::path::Path;

use clap::{crate_version, Parser, Subcommand};

use sampler::{KitLoader, LoaderStatus, SamplerEngine, TimedEvent, DEFAULT_BASE_NOTE};

/// Cycle length used for the check command's dry-run cycles.
const CHECK_CYCLE_FRAMES: usize = 512;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI-triggered drum sample playback engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists all kit manifests found in the given directory.
    Kits {
        /// The path to the kit repository on disk.
        path: String,
    },
    /// Loads a kit and verifies that every voice decodes and mixes.
    Check {
        /// The path to the kit manifest.
        manifest: String,
        /// The sample rate to load the kit at.
        #[arg(short, long, default_value_t = 44100)]
        sample_rate: u32,
        /// The MIDI note mapped to voice slot zero.
        #[arg(short, long, default_value_t = DEFAULT_BASE_NOTE)]
        base_note: u8,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Kits { path } => {
            let mut kits = config::scan_kits(Path::new(&path))?;

            if kits.is_empty() {
                println!("No kits found in {}.", path);
                return Ok(());
            }

            kits.sort_by(|a, b| a.1.name().cmp(b.1.name()));
            println!("Kits (count: {}):", kits.len());
            for (path, manifest) in kits {
                println!(
                    "- {} ({} voices) [{}]",
                    manifest.name(),
                    manifest.voices().len(),
                    path.display()
                );
            }
        }
        Commands::Check {
            manifest,
            sample_rate,
            base_note,
        } => check_kit(Path::new(&manifest), sample_rate, base_note)?,
    }

    Ok(())
}

/// Loads a kit through the background loader and renders a cycle with every
/// voice triggered, the same path a host would drive.
fn check_kit(manifest_path: &Path, sample_rate: u32, base_note: u8) -> Result<(), Box<dyn Error>> {
    let manifest = config::parse_kit(manifest_path)?;
    println!("Kit: {}", manifest.name());
    if let Some(description) = manifest.description() {
        println!("{}", description);
    }

    let (loader, kit_rx, status_rx) = KitLoader::spawn(sample_rate);
    let mut engine = SamplerEngine::new();
    engine.set_base_note(base_note);
    engine.attach_kit_updates(kit_rx);

    loader.request_switch(manifest_path);
    match status_rx.recv() {
        Ok(LoaderStatus::Loaded { .. }) => {}
        Ok(LoaderStatus::Failed { path, error }) => {
            return Err(format!("failed to load {}: {}", path.display(), error).into());
        }
        Err(_) => return Err("kit loader exited unexpectedly".into()),
    }

    // The kit is published before the status report, so one cycle is enough
    // for the engine to observe it.
    let mut left = vec![0.0f32; CHECK_CYCLE_FRAMES];
    let mut right = vec![0.0f32; CHECK_CYCLE_FRAMES];
    engine.run_cycle(&[], &mut left, &mut right);

    let mut entries: Vec<&config::VoiceEntry> = manifest.voices().iter().collect();
    entries.sort_by_key(|entry| entry.slot());
    println!("Voices (count: {}):", engine.kit().voice_count());
    for (entry, sample) in entries.iter().zip(engine.kit().samples()) {
        let layout = if sample.channel_count() == 1 {
            "mono"
        } else {
            "stereo"
        };
        let duration_ms = sample.frame_count() as f64 / sample_rate as f64 * 1000.0;
        println!(
            "- slot {:2} (note {:3}): {} [{}, {} frames, {:.1}ms]",
            entry.slot(),
            base_note as u16 + entry.slot() as u16,
            entry.name().unwrap_or_else(|| entry.file()),
            layout,
            sample.frame_count(),
            duration_ms,
        );
    }

    // Trigger every voice at once and render one cycle to prove the kit
    // actually mixes.
    let triggers: Vec<[u8; 3]> = (0..engine.kit().voice_count())
        .map(|slot| [0x90, base_note.saturating_add(slot as u8), 100])
        .collect();
    let events: Vec<TimedEvent> = triggers
        .iter()
        .map(|data| TimedEvent { frame: 0, data })
        .collect();
    engine.run_cycle(&events, &mut left, &mut right);

    let peak = left
        .iter()
        .chain(right.iter())
        .fold(0.0f32, |peak, sample| peak.max(sample.abs()));
    println!(
        "\nMixed one cycle with every voice triggered: peak {:.3}, {} voices still active.",
        peak,
        engine.active_voices()
    );

    Ok(())
}
