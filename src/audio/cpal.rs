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
use std::{fmt, thread};

#[cfg(test)]
use std::{error::Error, sync::Arc};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::audio::mixer::Mixer;
use crate::audio::{rt, AudioError, Device as AudioDevice, StreamHandle, ThreadStream};
use crate::config;

/// A small wrapper around a cpal::Device. Carries the output parameters the
/// stream will be opened with.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The maximum number of output channels the device supports.
    max_channels: u16,
    /// The sample format the device wants by default.
    sample_format: cpal::SampleFormat,
    /// The number of channels the stream will be opened with.
    channels: u16,
    /// The sample rate the stream will be opened with.
    sample_rate: u32,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} channels, {})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can produce output.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy backend output here.
        let _shh_stdout = shh::stdout().map_err(|e| AudioError::ListFailed(e.to_string()))?;
        let _shh_stderr = shh::stderr().map_err(|e| AudioError::ListFailed(e.to_string()))?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id)
                .map_err(|e| AudioError::ListFailed(e.to_string()))?;
            let host_devices = match host.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let name = match device.name() {
                    Ok(name) => name,
                    Err(_) => continue,
                };

                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                let default_config = match device.default_output_config() {
                    Ok(default_config) => default_config,
                    Err(_) => continue,
                };

                if max_channels > 0 {
                    devices.push(Device {
                        name,
                        host_id,
                        max_channels,
                        sample_format: default_config.sample_format(),
                        channels: default_config.channels(),
                        sample_rate: default_config.sample_rate(),
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the cpal device named by the configuration and applies the
    /// configured output parameters to it.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let name = config.device();
        let mut devices = Device::list_cpal_devices()?;

        let position = devices
            .iter()
            .position(|device| device.name.trim() == name)
            .or_else(|| {
                // Nothing is literally named "default" on most hosts, so fall
                // back to the host's default output device.
                if name != "default" {
                    return None;
                }
                let default_name = cpal::default_host()
                    .default_output_device()
                    .and_then(|device| device.name().ok())?;
                devices.iter().position(|device| device.name == default_name)
            });

        let mut device = match position {
            Some(position) => devices.swap_remove(position),
            None => return Err(AudioError::DeviceNotFound(name.to_string())),
        };

        if device.max_channels < config.channels() {
            return Err(AudioError::TooManyChannels {
                device: device.name,
                requested: config.channels(),
                max: device.max_channels,
            });
        }

        device.channels = config.channels();
        device.sample_rate = config.sample_rate();
        Ok(device)
    }
}

impl AudioDevice for Device {
    /// Opens the output stream on a dedicated thread. cpal streams are not
    /// Send, so the thread builds the stream, reports the result back, and
    /// then holds the stream until the handle is dropped.
    fn start(&self, mixer: Mixer) -> Result<Box<dyn StreamHandle>, AudioError> {
        let device = self.device.clone();
        let device_name = self.name.clone();
        let sample_format = self.sample_format;
        let stream_config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let join = thread::Builder::new()
            .name("earcon-output".to_string())
            .spawn(move || {
                let stream = match build_stream(&device, &stream_config, sample_format, mixer) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Hold the stream until the handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| AudioError::StreamFailed {
                device: device_name.clone(),
                reason: e.to_string(),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    device = self.name,
                    channels = self.channels,
                    sample_rate = self.sample_rate,
                    "Output stream started"
                );
                Ok(Box::new(ThreadStream::new(stop_tx, join)))
            }
            Ok(Err(reason)) => {
                let _ = join.join();
                Err(AudioError::StreamFailed {
                    device: device_name,
                    reason,
                })
            }
            Err(_) => {
                let _ = join.join();
                Err(AudioError::StreamFailed {
                    device: device_name,
                    reason: "output thread exited before the stream started".to_string(),
                })
            }
        }
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

/// Builds the output stream for whichever sample format the device wants.
/// The mixer runs inside the stream's data callback.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Mixer,
) -> Result<cpal::Stream, String> {
    match sample_format {
        cpal::SampleFormat::F32 => {
            let mut callback = f32_callback(mixer);
            device
                .build_output_stream(
                    config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback(data),
                    |err| error!("Output stream error: {}", err),
                    None,
                )
                .map_err(|e| e.to_string())
        }
        cpal::SampleFormat::I16 => build_converting_stream::<i16>(device, config, mixer),
        cpal::SampleFormat::U16 => build_converting_stream::<u16>(device, config, mixer),
        other => Err(format!("unsupported sample format {:?}", other)),
    }
}

/// f32 callback: mix directly into the cpal buffer.
fn f32_callback(mut mixer: Mixer) -> impl FnMut(&mut [f32]) + Send + 'static {
    let priority = rt::stream_thread_priority();
    let rt_audio = rt::rt_audio_enabled();
    let mut priority_set = false;

    move |data: &mut [f32]| {
        rt::configure_stream_thread_priority(priority, rt_audio, &mut priority_set);
        mixer.fill(data);
    }
}

/// Integer callback: mix into a reusable f32 buffer and convert.
fn build_converting_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
) -> Result<cpal::Stream, String>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = rt::stream_thread_priority();
    let rt_audio = rt::rt_audio_enabled();
    let mut priority_set = false;
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                rt::configure_stream_thread_priority(priority, rt_audio, &mut priority_set);
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let block = &mut scratch[..data.len()];
                mixer.fill(block);
                for (out_sample, sample) in data.iter_mut().zip(block.iter()) {
                    *out_sample = T::from_sample(*sample);
                }
            },
            |err| error!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| e.to_string())
}
