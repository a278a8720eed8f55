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
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::File;
use serde::Deserialize;
use tracing::warn;

mod audio;
mod error;

pub use self::audio::Audio;
pub use self::error::ConfigError;

/// A sound entry: either just a file path, or a table with options.
#[derive(Deserialize, Clone)]
#[serde(untagged)]
pub enum SoundDefinition {
    /// Shorthand form, only the path to the audio file.
    Path(String),
    /// Full form with per-sound options.
    Full {
        /// The path to the audio file.
        file: String,
        /// Linear gain applied when the sound plays.
        gain: Option<f32>,
    },
}

impl SoundDefinition {
    /// The configured file path, as written in the configuration.
    pub fn file(&self) -> &str {
        match self {
            SoundDefinition::Path(file) => file,
            SoundDefinition::Full { file, .. } => file,
        }
    }

    /// The linear gain for this sound (default: 1.0).
    pub fn gain(&self) -> f32 {
        match self {
            SoundDefinition::Path(_) => 1.0,
            SoundDefinition::Full { gain, .. } => gain.unwrap_or(1.0),
        }
    }
}

/// The top level configuration: the audio output plus the event name to sound
/// mapping.
#[derive(Deserialize, Clone, Default)]
pub struct Config {
    /// The audio output configuration.
    #[serde(default)]
    audio: Audio,

    /// Notification sounds keyed by the event name that triggers them.
    #[serde(default)]
    sounds: HashMap<String, SoundDefinition>,

    /// The directory relative sound paths resolve against. Set at load time.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Config {
    /// Loads a configuration from a YAML or JSON file. Relative sound paths
    /// resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut parsed = config::Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Config>()?;

        parsed.audio.validate()?;
        if parsed.sounds.is_empty() {
            warn!(path = ?path, "Configuration has no sounds");
        }
        parsed.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok(parsed)
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the configured sounds, keyed by event name.
    pub fn sounds(&self) -> &HashMap<String, SoundDefinition> {
        &self.sounds
    }

    /// Resolves a sound path against the config file's directory. Absolute
    /// paths are left alone.
    pub fn resolve_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
