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
use std::sync::Arc;

use super::source::FrameSource;
use crate::sound::Sound;

/// Errors that occur when starting a voice.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The sound's channel layout cannot be adapted to the output device.
    #[error("Unsupported channel layout: sound has {sound_channels} channels, output has {output_channels}")]
    UnsupportedChannelLayout {
        sound_channels: u16,
        output_channels: u16,
    },
}

/// How voice frames map onto the output channel layout. Decided once when the
/// voice is created so the playback path stays branch free.
enum ChannelAdapt {
    /// Sound channels match the output, copy frames as-is.
    Passthrough,
    /// Duplicate each mono frame into both stereo channels.
    MonoToStereo,
}

/// A single playback of a sound: a read cursor over the sound's samples,
/// adapted to the output channel layout with a fixed gain.
///
/// Voices never touch the filesystem or allocate while producing frames; all
/// the data they read was loaded when the [Sound] was.
pub struct Voice {
    data: Arc<Vec<f32>>,
    sound_channels: u16,
    output_channels: u16,
    adapt: ChannelAdapt,
    gain: f32,
    position: usize,
}

impl Voice {
    /// Creates a voice playing `sound` into an output with `output_channels`
    /// channels. Fails if the sound's layout cannot be adapted: only matching
    /// layouts and mono into stereo are supported.
    pub fn new(sound: &Sound, output_channels: u16, gain: f32) -> Result<Voice, VoiceError> {
        let sound_channels = sound.channel_count();
        let adapt = if sound_channels == output_channels {
            ChannelAdapt::Passthrough
        } else if sound_channels == 1 && output_channels == 2 {
            ChannelAdapt::MonoToStereo
        } else {
            return Err(VoiceError::UnsupportedChannelLayout {
                sound_channels,
                output_channels,
            });
        };

        Ok(Voice {
            data: sound.data(),
            sound_channels,
            output_channels,
            adapt,
            gain,
            position: 0,
        })
    }
}

impl FrameSource for Voice {
    fn next_block(&mut self, out: &mut [f32], max_frames: usize) -> usize {
        let source_channels = self.sound_channels as usize;
        let total_frames = self.data.len() / source_channels;
        let frames = (total_frames - self.position).min(max_frames);
        if frames == 0 {
            return 0;
        }

        match self.adapt {
            ChannelAdapt::Passthrough => {
                let start = self.position * source_channels;
                let end = start + frames * source_channels;
                for (out_sample, sample) in out.iter_mut().zip(&self.data[start..end]) {
                    *out_sample = sample * self.gain;
                }
            }
            ChannelAdapt::MonoToStereo => {
                let start = self.position;
                for (frame, sample) in self.data[start..start + frames].iter().enumerate() {
                    let value = sample * self.gain;
                    out[frame * 2] = value;
                    out[frame * 2 + 1] = value;
                }
            }
        }

        self.position += frames;
        frames
    }

    fn channel_count(&self) -> u16 {
        self.output_channels
    }
}
