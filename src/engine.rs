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
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::Sender;
use tracing::info;

use crate::audio::{
    self,
    mixer::Mixer,
    source::FrameSource,
    voice::{Voice, VoiceError},
    AudioError, Device, StreamHandle,
};
use crate::config;
use crate::sound::Sound;

/// Errors from triggering a sound.
#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    /// The voice could not be built for this output.
    #[error(transparent)]
    Voice(#[from] VoiceError),
    /// The output stream is gone, nothing will be played.
    #[error("Playback engine is closed")]
    EngineClosed,
}

/// The playback engine: one open output stream plus the queue feeding it.
///
/// Triggering is fire-and-forget from any thread. Dropping the engine discards
/// queued and playing voices and stops the output stream.
pub struct Engine {
    // Declared first so the stream stops before the queue is torn down.
    _stream: Box<dyn StreamHandle>,
    voice_tx: Sender<Box<dyn FrameSource>>,
    voice_count: Arc<AtomicUsize>,
    channels: u16,
    sample_rate: u32,
}

impl Engine {
    /// Starts an engine on the configured output device. Fails if the device
    /// cannot be found or its output stream cannot be opened.
    pub fn start(config: &config::Audio) -> Result<Engine, AudioError> {
        Engine::with_device(audio::get_device(config)?)
    }

    /// Starts an engine on an already resolved device.
    pub fn with_device(device: Arc<dyn Device>) -> Result<Engine, AudioError> {
        let channels = device.channel_count();
        let sample_rate = device.sample_rate();

        let (voice_tx, voice_rx) = crossbeam_channel::unbounded();
        let voice_count = Arc::new(AtomicUsize::new(0));
        let mixer = Mixer::new(channels, voice_rx, voice_count.clone());
        let stream = device.start(mixer)?;

        info!(
            device = %device,
            channels,
            sample_rate,
            "Playback engine started"
        );

        Ok(Engine {
            _stream: stream,
            voice_tx,
            voice_count,
            channels,
            sample_rate,
        })
    }

    /// Triggers a sound at unity gain.
    pub fn play(&self, sound: &Sound) -> Result<(), PlayError> {
        self.play_with_gain(sound, 1.0)
    }

    /// Triggers a sound. The voice is queued for the mixer and this call
    /// returns immediately; a layout the output cannot take fails only this
    /// trigger.
    pub fn play_with_gain(&self, sound: &Sound, gain: f32) -> Result<(), PlayError> {
        let voice = Voice::new(sound, self.channels, gain)?;
        self.submit(Box::new(voice))
    }

    /// Queues an arbitrary frame source. The source must already produce the
    /// engine's channel layout.
    pub fn play_source(&self, source: Box<dyn FrameSource>) -> Result<(), PlayError> {
        if source.channel_count() != self.channels {
            return Err(PlayError::Voice(VoiceError::UnsupportedChannelLayout {
                sound_channels: source.channel_count(),
                output_channels: self.channels,
            }));
        }
        self.submit(source)
    }

    fn submit(&self, source: Box<dyn FrameSource>) -> Result<(), PlayError> {
        // Counted before sending so active_voices covers queued voices too.
        self.voice_count.fetch_add(1, Ordering::Relaxed);
        if self.voice_tx.send(source).is_err() {
            self.voice_count.fetch_sub(1, Ordering::Relaxed);
            return Err(PlayError::EngineClosed);
        }
        Ok(())
    }

    /// The number of voices queued or playing.
    pub fn active_voices(&self) -> usize {
        self.voice_count.load(Ordering::Relaxed)
    }

    /// Blocks until every queued and playing voice has finished, or until the
    /// timeout passes. Returns whether the engine went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.active_voices() > 0 {
            if start.elapsed() > timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// The channel count voices are adapted to.
    pub fn channel_count(&self) -> u16 {
        self.channels
    }

    /// The sample rate sounds should be loaded at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;
    use crate::testutil::eventually;

    fn mock_engine() -> (Engine, mock::Device) {
        let config = config::Audio::new("mock", 44100, 2);
        let device = mock::Device::get(&config);
        let engine = Engine::with_device(Arc::new(device.clone())).expect("failed to start");
        (engine, device)
    }

    /// A fixed-length source emitting a constant value on every channel.
    struct ConstantSource {
        value: f32,
        channels: u16,
        frames_left: usize,
    }

    impl FrameSource for ConstantSource {
        fn next_block(&mut self, out: &mut [f32], max_frames: usize) -> usize {
            let frames = self.frames_left.min(max_frames);
            out[..frames * self.channels as usize].fill(self.value);
            self.frames_left -= frames;
            frames
        }

        fn channel_count(&self) -> u16 {
            self.channels
        }
    }

    #[test]
    fn test_play_reaches_the_output() {
        let (engine, device) = mock_engine();
        let sound = Sound::from_samples(vec![0.5; 2 * 100], 2, 44100);

        engine.play(&sound).expect("failed to play");
        assert!(engine.wait_idle(Duration::from_secs(3)));

        eventually(
            || device.captured().iter().any(|sample| *sample == 0.5),
            "sound never reached the mock output",
        );
    }

    #[test]
    fn test_overlapping_triggers_sum() {
        let (engine, device) = mock_engine();
        // 50ms of constant level, several mixing blocks long.
        let sound = Sound::from_samples(vec![0.25; 2 * 2205], 2, 44100);

        engine.play(&sound).expect("failed to play");
        engine.play(&sound).expect("failed to play");
        assert!(engine.wait_idle(Duration::from_secs(3)));

        // The two voices overlap, so somewhere the block holds their sum.
        eventually(
            || {
                device
                    .captured()
                    .iter()
                    .any(|sample| (*sample - 0.5).abs() < 1e-6)
            },
            "overlapping voices never summed",
        );
    }

    #[test]
    fn test_concurrent_triggers_are_all_mixed() {
        let (engine, device) = mock_engine();
        let engine = Arc::new(engine);
        let sound = Sound::from_samples(vec![0.1; 2], 2, 44100);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let sound = sound.clone();
                thread::spawn(move || engine.play(&sound))
            })
            .collect();
        for thread in threads {
            thread.join().expect("play thread panicked").expect("failed to play");
        }

        assert!(engine.wait_idle(Duration::from_secs(3)));

        // Every trigger is one frame of 0.1 per channel; whatever blocks they
        // landed in, the total is 8 frames worth.
        eventually(
            || {
                let total: f32 = device.captured().iter().sum();
                (total - 8.0 * 2.0 * 0.1).abs() < 1e-3
            },
            "not all concurrent triggers were mixed",
        );
    }

    #[test]
    fn test_unsupported_layout_fails_only_that_trigger() {
        let (engine, device) = mock_engine();

        let quad = Sound::from_samples(vec![0.5; 4 * 10], 4, 44100);
        assert!(matches!(
            engine.play(&quad),
            Err(PlayError::Voice(VoiceError::UnsupportedChannelLayout { .. }))
        ));
        assert_eq!(engine.active_voices(), 0);

        // The engine keeps playing other sounds.
        let stereo = Sound::from_samples(vec![0.5; 2 * 10], 2, 44100);
        engine.play(&stereo).expect("failed to play");
        assert!(engine.wait_idle(Duration::from_secs(3)));
        eventually(
            || device.captured().iter().any(|sample| *sample == 0.5),
            "engine stopped mixing after a failed trigger",
        );
    }

    #[test]
    fn test_play_source_checks_channel_count() {
        let (engine, device) = mock_engine();

        let mismatched = ConstantSource {
            value: 0.5,
            channels: 1,
            frames_left: 10,
        };
        assert!(matches!(
            engine.play_source(Box::new(mismatched)),
            Err(PlayError::Voice(VoiceError::UnsupportedChannelLayout { .. }))
        ));

        let matching = ConstantSource {
            value: 0.5,
            channels: 2,
            frames_left: 10,
        };
        engine
            .play_source(Box::new(matching))
            .expect("failed to play source");
        assert!(engine.wait_idle(Duration::from_secs(3)));
        eventually(
            || device.captured().iter().any(|sample| *sample == 0.5),
            "source never reached the mock output",
        );
    }

    #[test]
    fn test_wait_idle_times_out_while_playing() {
        let (engine, _device) = mock_engine();
        // A full second of audio cannot drain in 50ms.
        let sound = Sound::from_samples(vec![0.1; 2 * 44100], 2, 44100);

        engine.play(&sound).expect("failed to play");
        assert!(!engine.wait_idle(Duration::from_millis(50)));
        assert_eq!(engine.active_voices(), 1);
    }

    #[test]
    fn test_active_voices_counts_queued_and_playing() {
        let (engine, _device) = mock_engine();
        let sound = Sound::from_samples(vec![0.1; 2 * 44100], 2, 44100);

        assert_eq!(engine.active_voices(), 0);
        engine.play(&sound).expect("failed to play");
        engine.play(&sound).expect("failed to play");
        assert_eq!(engine.active_voices(), 2);
    }
}
