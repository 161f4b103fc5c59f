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

//! Kits and their sample buffers.
//!
//! Samples are decoded entirely into memory at load time for zero-latency
//! playback, and are immutable from then on. The real-time path only ever
//! reads them.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::audio::sample_source::{create_sample_source_from_file, SampleSourceError};

/// Error loading one sample into a kit.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(
        "{}: unsupported channel layout ({} channels); only mono and stereo samples are supported",
        .path.display(),
        .channels
    )]
    UnsupportedChannelLayout { path: PathBuf, channels: u16 },

    #[error("Failed to load sample {}: {}", .path.display(), .source)]
    Decode {
        path: PathBuf,
        source: SampleSourceError,
    },
}

/// One drum voice's source audio: interleaved f32 frames plus the channel
/// layout. Mono and stereo are the only supported layouts.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Interleaved audio data, `frame_count * channel_count` values long.
    data: Vec<f32>,
    /// 1 (mono) or 2 (stereo).
    channel_count: u16,
    /// Length in frames, not raw values.
    frame_count: usize,
}

impl Sample {
    /// Decodes a sample file into memory, resampling it to the target rate
    /// if necessary. Blocking and allocating; never call this from the
    /// real-time path.
    pub fn load(path: &Path, target_sample_rate: u32) -> Result<Sample, LoadError> {
        info!(path = ?path, "Loading sample into memory");

        let decode_err = |source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let mut source = create_sample_source_from_file(path).map_err(decode_err)?;
        let channel_count = source.channel_count();
        if channel_count == 0 || channel_count > 2 {
            return Err(LoadError::UnsupportedChannelLayout {
                path: path.to_path_buf(),
                channels: channel_count,
            });
        }
        let source_sample_rate = source.sample_rate();

        let mut data = Vec::new();
        while let Some(sample) = source.next_sample().map_err(decode_err)? {
            data.push(sample);
        }

        if source_sample_rate != target_sample_rate {
            info!(
                source_rate = source_sample_rate,
                target_rate = target_sample_rate,
                "Resampling sample"
            );
            data = resample(&data, channel_count, source_sample_rate, target_sample_rate);
        }

        // A ragged tail can't form a whole frame; drop it.
        let frame_count = data.len() / channel_count as usize;
        data.truncate(frame_count * channel_count as usize);

        let sample = Sample {
            data,
            channel_count,
            frame_count,
        };
        info!(
            path = ?path,
            channels = channel_count,
            frames = frame_count,
            memory_kb = sample.memory_size() / 1024,
            "Sample loaded"
        );
        Ok(sample)
    }

    /// Gets the interleaved audio data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Gets the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Gets the length in frames.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Gets the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
impl Sample {
    /// Creates a sample directly from interleaved data (test only).
    pub fn from_interleaved(data: Vec<f32>, channel_count: u16) -> Sample {
        let frame_count = data.len() / channel_count as usize;
        Sample {
            data,
            channel_count,
            frame_count,
        }
    }
}

/// A named set of samples mapped to voice slots, the unit the loader swaps
/// in. A kit is either fully loaded or never published; the real-time path
/// never sees a partial one.
#[derive(Debug)]
pub struct Kit {
    name: String,
    samples: Vec<Sample>,
}

impl Kit {
    /// Creates a kit from fully loaded samples, in slot order.
    pub fn new(name: String, samples: Vec<Sample>) -> Self {
        Self { name, samples }
    }

    /// Creates a kit with no voices, the engine's state before anything has
    /// been published.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            samples: Vec::new(),
        }
    }

    /// Gets the kit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the samples, in slot order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Gets the number of voice slots.
    pub fn voice_count(&self) -> usize {
        self.samples.len()
    }
}

/// Resamples interleaved data to another rate using linear interpolation.
/// A band-limited resampler would be higher quality, but linear
/// interpolation is sufficient for drum hits and one-shots.
fn resample(samples: &[f32], channel_count: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
