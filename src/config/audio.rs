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
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;

/// The audio output section of the configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Audio {
    /// The audio device. Names starting with "mock" select the mock output.
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100). Sounds are resampled to
    /// this rate when they are loaded.
    sample_rate: Option<u32>,

    /// Number of output channels, 1 or 2 (default: 2).
    channels: Option<u16>,
}

impl Audio {
    #[cfg(test)]
    pub fn new(device: &str, sample_rate: u32, channels: u16) -> Audio {
        Audio {
            device: Some(device.to_string()),
            sample_rate: Some(sample_rate),
            channels: Some(channels),
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Layouts beyond mono and stereo have no voice adaptation, reject them
    /// up front.
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let channels = self.channels();
        if channels != 1 && channels != 2 {
            return Err(ConfigError::InvalidChannels(channels));
        }
        Ok(())
    }
}
