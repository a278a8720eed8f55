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
use std::{fmt, sync::Arc, thread, time::Duration};

#[cfg(test)]
use std::error::Error;

use crossbeam_channel::TryRecvError;
use parking_lot::Mutex;
use tracing::info;

use crate::audio::mixer::Mixer;
use crate::audio::{AudioError, Device as AudioDevice, StreamHandle, ThreadStream};
use crate::config;

/// A mock device. Pulls blocks from the mixer at roughly real time and keeps
/// what it mixed instead of playing it.
#[derive(Clone)]
pub struct Device {
    name: String,
    channels: u16,
    sample_rate: u32,
    captured: Arc<Mutex<Vec<f32>>>,
}

impl Device {
    /// Gets a mock device with the configured output parameters.
    pub fn get(config: &config::Audio) -> Device {
        Device {
            name: config.device().to_string(),
            channels: config.channels(),
            sample_rate: config.sample_rate(),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns everything the device has mixed so far.
    #[cfg(test)]
    pub fn captured(&self) -> Vec<f32> {
        self.captured.lock().clone()
    }
}

impl AudioDevice for Device {
    /// Runs the mixer on a plain thread, pacing blocks with spin_sleep so
    /// timing behaves like a real output stream.
    fn start(&self, mut mixer: Mixer) -> Result<Box<dyn StreamHandle>, AudioError> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let captured = self.captured.clone();

        // Blocks of about 10ms, like a typical device buffer.
        let frames = (self.sample_rate as usize / 100).max(1);
        let block_samples = frames * self.channels as usize;
        let interval = Duration::from_secs_f64(frames as f64 / self.sample_rate as f64);

        info!(
            device = self.name,
            channels = self.channels,
            sample_rate = self.sample_rate,
            "Mock output stream started"
        );

        let join = thread::Builder::new()
            .name("earcon-mock-output".to_string())
            .spawn(move || {
                let mut block = vec![0.0_f32; block_samples];
                loop {
                    match stop_rx.try_recv() {
                        Ok(()) | Err(TryRecvError::Disconnected) => return,
                        Err(TryRecvError::Empty) => {}
                    }

                    mixer.fill(&mut block);
                    captured.lock().extend_from_slice(&block);
                    spin_sleep::sleep(interval);
                }
            })
            .map_err(|e| AudioError::StreamFailed {
                device: self.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(ThreadStream::new(stop_tx, join)))
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
