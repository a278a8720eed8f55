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
// Core mixing logic shared by the CPAL and mock audio backends.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::source::FrameSource;

/// Sums active sources into output buffers.
///
/// The mixer is owned by whichever thread runs the output stream and is only
/// ever touched from there. New sources arrive through a queue that is drained
/// once at the start of every block, so producers never contend with the
/// audio callback.
pub struct Mixer {
    /// Sources currently playing.
    active: Vec<Box<dyn FrameSource>>,
    /// Sources queued for pickup on the next block.
    pending: Receiver<Box<dyn FrameSource>>,
    /// Number of output channels.
    channel_count: u16,
    /// Reusable buffer a single source renders into before summing.
    scratch: Vec<f32>,
    /// Live source count, shared with whoever queues sources.
    voice_count: Arc<AtomicUsize>,
}

impl Mixer {
    /// Creates a new mixer reading queued sources from `pending`.
    pub fn new(
        channel_count: u16,
        pending: Receiver<Box<dyn FrameSource>>,
        voice_count: Arc<AtomicUsize>,
    ) -> Mixer {
        Mixer {
            active: Vec::new(),
            pending,
            channel_count,
            scratch: Vec::new(),
            voice_count,
        }
    }

    /// Gets the number of output channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Fills `out` with one block of mixed audio.
    ///
    /// Any queued sources are collected first, then every active source is
    /// summed into the block without normalization. Sources that produce no
    /// frames are dropped and the shared voice count is decremented.
    pub fn fill(&mut self, out: &mut [f32]) {
        while let Ok(source) = self.pending.try_recv() {
            self.active.push(source);
        }

        out.fill(0.0);

        let channels = self.channel_count as usize;
        let max_frames = out.len() / channels;
        if self.scratch.len() < out.len() {
            self.scratch.resize(out.len(), 0.0);
        }

        let scratch = &mut self.scratch;
        let voice_count = &self.voice_count;
        self.active.retain_mut(|source| {
            let frames = source.next_block(scratch, max_frames);
            if frames == 0 {
                voice_count.fetch_sub(1, Ordering::Relaxed);
                return false;
            }

            let samples = frames * channels;
            for (out_sample, sample) in out[..samples].iter_mut().zip(&scratch[..samples]) {
                *out_sample += *sample;
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::voice::Voice;
    use crate::sound::Sound;
    use crossbeam_channel::{unbounded, Sender};

    const OUTPUT_CHANNELS: u16 = 2;

    fn test_mixer() -> (Mixer, Sender<Box<dyn FrameSource>>, Arc<AtomicUsize>) {
        let (tx, rx) = unbounded();
        let voice_count = Arc::new(AtomicUsize::new(0));
        let mixer = Mixer::new(OUTPUT_CHANNELS, rx, voice_count.clone());
        (mixer, tx, voice_count)
    }

    fn queue_voice(
        tx: &Sender<Box<dyn FrameSource>>,
        voice_count: &Arc<AtomicUsize>,
        samples: Vec<f32>,
        channels: u16,
        gain: f32,
    ) {
        let sound = Sound::from_samples(samples, channels, 44100);
        let voice = Voice::new(&sound, OUTPUT_CHANNELS, gain).expect("failed to create voice");
        voice_count.fetch_add(1, Ordering::Relaxed);
        tx.send(Box::new(voice)).expect("failed to queue voice");
    }

    #[test]
    fn test_single_source_fills_block() {
        let (mut mixer, tx, voice_count) = test_mixer();
        queue_voice(&tx, &voice_count, vec![0.5, -0.5, 0.8, -0.8], 2, 1.0);

        let mut out = vec![99.0_f32; 8];
        mixer.fill(&mut out);

        // Two frames of sound, the rest of the block is silence.
        assert_eq!(out, vec![0.5, -0.5, 0.8, -0.8, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sums_sources_without_normalization() {
        let (mut mixer, tx, voice_count) = test_mixer();
        queue_voice(&tx, &voice_count, vec![0.8, 0.8], 2, 1.0);
        queue_voice(&tx, &voice_count, vec![0.8, 0.8], 2, 1.0);

        let mut out = vec![0.0_f32; 2];
        mixer.fill(&mut out);

        // Overlapping sources sum; values past 1.0 are left for the device.
        assert_eq!(out, vec![1.6, 1.6]);
    }

    #[test]
    fn test_mixes_sources_of_different_lengths() {
        let (mut mixer, tx, voice_count) = test_mixer();
        queue_voice(&tx, &voice_count, vec![0.5, 0.3, 0.5, 0.3], 2, 1.0);
        queue_voice(&tx, &voice_count, vec![0.2, 0.1], 2, 1.0);

        let mut out = vec![0.0_f32; 4];
        mixer.fill(&mut out);

        assert_eq!(out[0], 0.7);
        assert_eq!(out[1], 0.4);
        assert_eq!(out[2], 0.5);
        assert_eq!(out[3], 0.3);
    }

    #[test]
    fn test_removes_exhausted_sources() {
        let (mut mixer, tx, voice_count) = test_mixer();
        queue_voice(&tx, &voice_count, vec![0.5, 0.5], 2, 1.0);

        let mut out = vec![0.0_f32; 4];
        mixer.fill(&mut out);
        assert_eq!(voice_count.load(Ordering::Relaxed), 1);

        // The source produced its last frame above, so the next block drops it.
        mixer.fill(&mut out);
        assert_eq!(out, vec![0.0; 4]);
        assert_eq!(voice_count.load(Ordering::Relaxed), 0);

        mixer.fill(&mut out);
        assert_eq!(voice_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_collects_queued_sources_each_block() {
        let (mut mixer, tx, voice_count) = test_mixer();

        let mut out = vec![0.0_f32; 2];
        mixer.fill(&mut out);
        assert_eq!(out, vec![0.0, 0.0]);

        // Queued after the first block, mixed in the second.
        queue_voice(&tx, &voice_count, vec![0.25, -0.25], 2, 1.0);
        mixer.fill(&mut out);
        assert_eq!(out, vec![0.25, -0.25]);
    }

    #[test]
    fn test_mono_source_into_stereo_block() {
        let (mut mixer, tx, voice_count) = test_mixer();
        queue_voice(&tx, &voice_count, vec![0.5, 0.25], 1, 1.0);

        let mut out = vec![0.0_f32; 4];
        mixer.fill(&mut out);
        assert_eq!(out, vec![0.5, 0.5, 0.25, 0.25]);
    }
}
