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
use std::{fmt, sync::Arc, thread};

#[cfg(test)]
use std::error::Error;

use crossbeam_channel::Sender;

use crate::config;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod rt;
pub mod source;
pub mod voice;

use mixer::Mixer;

/// Errors from opening audio devices and their output streams.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No device with the configured name exists.
    #[error("No audio device found with name {0}")]
    DeviceNotFound(String),
    /// The backend failed while enumerating devices.
    #[error("Unable to list audio devices: {0}")]
    ListFailed(String),
    /// The device has fewer channels than the configuration asks for.
    #[error("Audio device {device} supports {max} channels, {requested} requested")]
    TooManyChannels {
        device: String,
        requested: u16,
        max: u16,
    },
    /// The output stream could not be opened or started.
    #[error("Unable to open output stream on {device}: {reason}")]
    StreamFailed { device: String, reason: String },
}

/// An audio output device capable of running a mixed output stream.
pub trait Device: fmt::Display + Send + Sync {
    /// Opens the output stream and starts pulling blocks from `mixer`.
    /// The stream keeps running until the returned handle is dropped.
    fn start(&self, mixer: Mixer) -> Result<Box<dyn StreamHandle>, AudioError>;

    /// The channel count blocks are interleaved to.
    fn channel_count(&self) -> u16;

    /// The sample rate frames are consumed at.
    fn sample_rate(&self) -> u32;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// A handle to a running output stream. The stream stops when the handle is
/// dropped.
pub trait StreamHandle: Send + Sync {}

/// Stream handle backed by the thread that owns the output stream. Dropping
/// it signals the thread and joins it.
pub(crate) struct ThreadStream {
    stop_tx: Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl ThreadStream {
    pub(crate) fn new(stop_tx: Sender<()>, join: thread::JoinHandle<()>) -> ThreadStream {
        ThreadStream {
            stop_tx,
            join: Some(join),
        }
    }
}

impl StreamHandle for ThreadStream {}

impl Drop for ThreadStream {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets the device described by the audio configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(config)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
