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
use std::cmp;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::sound::Sound;

/// A named sound together with the gain it is played back at.
#[derive(Clone)]
pub struct Entry {
    /// The decoded sound, shared with every voice that plays it.
    pub sound: Arc<Sound>,
    /// Playback gain for this sound.
    pub gain: f32,
}

/// Holds every configured sound, decoded and resampled to the output sample
/// rate up front. Lookups clone an Arc, so triggering a sound never touches
/// the filesystem.
pub struct Library {
    target_rate: u32,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Library {
    /// Decodes every sound named in the config, in parallel. A sound that
    /// fails to decode is skipped with a warning so that one bad file does
    /// not take the rest of the library down with it.
    pub fn load(config: &Config, target_rate: u32) -> Library {
        Library {
            target_rate,
            entries: RwLock::new(load_entries(config, target_rate)),
        }
    }

    /// Returns the entry for the given event name.
    pub fn get(&self, name: &str) -> Option<Entry> {
        self.entries.read().get(name).cloned()
    }

    /// Re-scans the config and swaps in the new set of sounds in one step.
    /// A concurrent lookup sees either the old set or the new one, never a
    /// mix of the two.
    pub fn reload(&self, config: &Config) {
        let entries = load_entries(config, self.target_rate);
        *self.entries.write() = entries;
    }

    /// Returns all loaded event names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of loaded sounds.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the total memory held by the decoded audio, in bytes.
    pub fn memory_size(&self) -> usize {
        self.entries
            .read()
            .values()
            .map(|entry| entry.sound.memory_size())
            .sum()
    }
}

/// Decodes every configured sound and returns the ones that loaded.
fn load_entries(config: &Config, target_rate: u32) -> HashMap<String, Entry> {
    let sounds: Vec<(String, PathBuf, f32)> = config
        .sounds()
        .iter()
        .map(|(name, definition)| {
            (
                name.clone(),
                config.resolve_path(definition.file()),
                definition.gain(),
            )
        })
        .collect();
    if sounds.is_empty() {
        return HashMap::new();
    }

    let start = Instant::now();
    debug!(count = sounds.len(), "Loading sound library");

    let entries: HashMap<String, Entry> = match load_pool(sounds.len()) {
        Ok(pool) => pool.install(|| {
            sounds
                .into_par_iter()
                .filter_map(|(name, path, gain)| load_entry(name, &path, gain, target_rate))
                .collect()
        }),
        Err(e) => {
            warn!(err = %e, "Unable to create load pool, loading sounds serially");
            sounds
                .into_iter()
                .filter_map(|(name, path, gain)| load_entry(name, &path, gain, target_rate))
                .collect()
        }
    };

    info!(
        sounds = entries.len(),
        memory_kb = entries
            .values()
            .map(|entry| entry.sound.memory_size())
            .sum::<usize>()
            / 1024,
        elapsed_ms = start.elapsed().as_millis(),
        "Sound library loaded"
    );
    entries
}

fn load_entry(name: String, path: &Path, gain: f32, target_rate: u32) -> Option<(String, Entry)> {
    match Sound::load(path, target_rate) {
        Ok(sound) => Some((
            name,
            Entry {
                sound: Arc::new(sound),
                gain,
            },
        )),
        Err(e) => {
            warn!(name = %name, path = ?path, err = %e, "Unable to load sound, skipping");
            None
        }
    }
}

/// Builds the pool the library decodes on. Sized to the number of sounds,
/// capped at the available parallelism.
fn load_pool(num_sounds: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    let threads = cmp::min(
        num_sounds.max(1),
        thread::available_parallelism().map_or(4, |n| n.get()),
    );
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("earcon-load-{i}"))
        .build()
}
