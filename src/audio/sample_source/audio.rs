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
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_codecs;
use symphonia::default::get_probe;

use super::error::SampleSourceError;
use super::traits::SampleSource;

/// A sample source that reads audio files (WAV, MP3, FLAC, etc.) and yields
/// interleaved f32 samples. Decoding happens one packet at a time; decoded
/// samples are buffered between next_sample calls.
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    is_finished: bool,
    sample_buffer: Vec<f32>,
    buffer_position: usize,
    channels: u16,
    sample_rate: u32,
}

impl SampleSource for AudioSampleSource {
    fn next_sample(&mut self) -> Result<Option<f32>, SampleSourceError> {
        if self.is_finished {
            return Ok(None);
        }

        if self.buffer_position >= self.sample_buffer.len() {
            self.refill_buffer()?;

            // Still empty after a refill means the file is exhausted.
            if self.sample_buffer.is_empty() {
                self.is_finished = true;
                return Ok(None);
            }
        }

        let sample = self.sample_buffer[self.buffer_position];
        self.buffer_position += 1;
        Ok(Some(sample))
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioSampleSource {
    /// Creates a new audio sample source from a file path.
    /// Supports WAV, MP3, FLAC, and other formats supported by symphonia.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SampleSourceError> {
        // Open the file (include path in error so the user sees which file failed)
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SampleSourceError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // A hint helps the format registry guess the container format.
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| {
                SampleSourceError::SampleConversionFailed(format!("'{}': {}", path.display(), e))
            })?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SampleSourceError::SampleConversionFailed(format!(
                    "'{}': no audio track found",
                    path.display()
                ))
            })?;

        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params.sample_rate.ok_or_else(|| {
            SampleSourceError::SampleConversionFailed("Sample rate not specified".to_string())
        })?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .filter(|c| *c > 0)
            .ok_or_else(|| {
                SampleSourceError::SampleConversionFailed("Channels not specified".to_string())
            })?;

        let decoder_opts: DecoderOptions = Default::default();
        let decoder = get_codecs().make(params, &decoder_opts).map_err(|e| {
            SampleSourceError::SampleConversionFailed(format!("'{}': {}", path.display(), e))
        })?;

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            is_finished: false,
            sample_buffer: Vec::new(),
            buffer_position: 0,
            channels,
            sample_rate,
        })
    }

    /// Replaces the sample buffer with the next decoded packet's samples.
    /// Leaves the buffer empty at end of file.
    fn refill_buffer(&mut self) -> Result<(), SampleSourceError> {
        self.sample_buffer.clear();
        self.buffer_position = 0;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(());
                }
                // Some decoders return DecodeError at EOF instead of IoError.
                Err(SymphoniaError::DecodeError(_)) => return Ok(()),
                Err(e) => return Err(SampleSourceError::AudioError(e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    match self.decoder.decode(&packet) {
                        Ok(decoded) => decoded,
                        Err(e) => return Err(SampleSourceError::AudioError(e)),
                    }
                }
                Err(e) => return Err(SampleSourceError::AudioError(e)),
            };

            Self::interleave_decoded(decoded, &mut self.sample_buffer);

            // Header packets (e.g. Ogg/Vorbis) decode to zero PCM frames;
            // keep reading until real audio shows up.
            if !self.sample_buffer.is_empty() {
                return Ok(());
            }
        }
    }

    /// Converts a decoded AudioBufferRef to interleaved f32 samples, scaling
    /// integer formats into [-1, 1].
    fn interleave_decoded(decoded: AudioBufferRef, out: &mut Vec<f32>) {
        match decoded {
            AudioBufferRef::F32(buf) => Self::interleave(&buf, out, |sample| sample),
            AudioBufferRef::F64(buf) => Self::interleave(&buf, out, |sample| sample as f32),
            AudioBufferRef::S8(buf) => Self::interleave(&buf, out, Self::scale_s8),
            AudioBufferRef::S16(buf) => Self::interleave(&buf, out, Self::scale_s16),
            AudioBufferRef::S24(buf) => {
                Self::interleave(&buf, out, |sample| Self::scale_s24(sample.inner()))
            }
            AudioBufferRef::S32(buf) => Self::interleave(&buf, out, Self::scale_s32),
            AudioBufferRef::U8(buf) => Self::interleave(&buf, out, Self::scale_u8),
            AudioBufferRef::U16(buf) => Self::interleave(&buf, out, Self::scale_u16),
            AudioBufferRef::U24(buf) => {
                Self::interleave(&buf, out, |sample| Self::scale_u24(sample.inner()))
            }
            AudioBufferRef::U32(buf) => Self::interleave(&buf, out, Self::scale_u32),
        }
    }

    /// Helper to interleave planar samples from a generic AudioBuffer.
    /// The closure converts one sample value to f32.
    fn interleave<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<f32>, convert: F)
    where
        T: symphonia::core::sample::Sample,
        F: Fn(T) -> f32,
    {
        let frames = buf.frames();
        let channels = buf.spec().channels.count();
        out.reserve(frames * channels);
        let planes = buf.planes();
        for frame_idx in 0..frames {
            for ch_idx in 0..channels {
                out.push(convert(planes.planes()[ch_idx][frame_idx]));
            }
        }
    }

    // Scaling helpers for all integer formats. These are `pub(crate)` so they
    // can be validated directly in unit tests.

    #[inline]
    pub(crate) fn scale_s8(sample: i8) -> f32 {
        sample as f32 / (1i64 << 7) as f32
    }

    #[inline]
    pub(crate) fn scale_s16(sample: i16) -> f32 {
        sample as f32 / (1i64 << 15) as f32
    }

    #[inline]
    pub(crate) fn scale_s24(sample: i32) -> f32 {
        sample as f32 / (1i64 << 23) as f32
    }

    #[inline]
    pub(crate) fn scale_s32(sample: i32) -> f32 {
        sample as f32 / (1i64 << 31) as f32
    }

    #[inline]
    pub(crate) fn scale_u8(sample: u8) -> f32 {
        (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u16(sample: u16) -> f32 {
        (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u24(sample: u32) -> f32 {
        let max = (1u32 << 24) - 1;
        (sample as f32 / max as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u32(sample: u32) -> f32 {
        (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}
