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

//! Decoded notification sounds.
//!
//! Sounds are decoded and resampled once at load time and kept entirely in
//! memory, so triggering playback never touches the disk or a resampler.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

mod decode;
mod resample;

/// Error type for sound decoding and loading.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Decode failed for {0}")]
    DecodeFailed(String),

    #[error("Resampling failed: {0}Hz -> {1}Hz")]
    ResamplingFailed(u32, u32),

    #[error("Audio file error: {0}")]
    AudioError(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A fully decoded sound held in memory.
///
/// Samples are interleaved f32 at the sample rate given to [`Sound::load`].
/// The data sits behind an [`Arc`] so any number of concurrent voices can
/// read it without copying. The sample count is always a whole number of
/// frames (a multiple of the channel count).
#[derive(Clone)]
pub struct Sound {
    /// The interleaved sample data.
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample data.
    channel_count: u16,
    /// Sample rate of the sample data.
    sample_rate: u32,
}

impl Sound {
    /// Loads a sound file into memory, converting it to interleaved f32 at
    /// `target_sample_rate`. Any format symphonia understands works here.
    /// Resampling happens now so that playback never has to.
    pub fn load<P: AsRef<Path>>(path: P, target_sample_rate: u32) -> Result<Sound, DecodeError> {
        let path = path.as_ref();
        debug!(path = ?path, "Loading sound into memory");

        let decoded = decode::decode_file(path)?;

        let (samples, sample_rate) = if decoded.sample_rate != target_sample_rate {
            debug!(
                source_rate = decoded.sample_rate,
                target_rate = target_sample_rate,
                "Resampling sound"
            );
            let resampled = resample::resample(
                &decoded.samples,
                decoded.channel_count,
                decoded.sample_rate,
                target_sample_rate,
            )?;
            (resampled, target_sample_rate)
        } else {
            (decoded.samples, decoded.sample_rate)
        };

        let sound = Sound {
            data: Arc::new(samples),
            channel_count: decoded.channel_count,
            sample_rate,
        };

        info!(
            path = ?path,
            channels = sound.channel_count,
            sample_rate = sound.sample_rate,
            duration_ms = sound.duration().as_millis(),
            memory_kb = sound.memory_size() / 1024,
            "Sound loaded"
        );

        Ok(sound)
    }

    /// Creates a sound from samples already in memory. The samples must be
    /// interleaved and already at the engine sample rate. Useful for
    /// synthesized sounds.
    pub fn from_samples(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Sound {
        Sound {
            data: Arc::new(samples),
            channel_count,
            sample_rate,
        }
    }

    /// The shared sample data, for voices reading from this sound.
    pub(crate) fn data(&self) -> Arc<Vec<f32>> {
        self.data.clone()
    }

    /// Returns the number of frames.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the playback duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sound")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("duration_ms", &self.duration().as_millis())
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}
