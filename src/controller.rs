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
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Instrument, Level};

use crate::config::Config;
use crate::engine::Engine;
use crate::library::Library;

pub mod stdin;

/// Controller events that trigger playback in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Plays the sound configured under the given name.
    Sound(String),
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Turns driver events into playback triggers.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver. The config path is
    /// read again whenever the library is reloaded.
    pub fn new(
        engine: Arc<Engine>,
        library: Arc<Library>,
        config_path: PathBuf,
        driver: Arc<dyn Driver>,
    ) -> Controller {
        Controller {
            handle: tokio::spawn(
                async move {
                    Controller::trigger_events(engine, library, config_path, driver).await
                }
                .instrument(span!(Level::INFO, "controller")),
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers playback by watching the driver and getting events from it.
    /// Returns when the driver closes its event channel.
    async fn trigger_events(
        engine: Arc<Engine>,
        library: Arc<Library>,
        config_path: PathBuf,
        driver: Arc<dyn Driver>,
    ) {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let monitor_handle = driver.monitor_events(events_tx);

        info!(sounds = library.len(), "Controller started.");

        #[cfg(unix)]
        let mut hangup =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(signal) => Some(signal),
                Err(e) => {
                    warn!(err = %e, "Unable to listen for SIGHUP, library reload disabled");
                    None
                }
            };

        loop {
            #[cfg(unix)]
            let event = tokio::select! {
                event = events_rx.recv() => event,
                _ = Self::hangup_received(&mut hangup) => {
                    Self::reload(&library, &config_path).await;
                    continue;
                }
            };
            #[cfg(not(unix))]
            let event = events_rx.recv().await;

            match event {
                Some(event) => Self::handle_event(&engine, &library, event),
                None => break,
            }
        }

        info!("Controller closing.");
        if let Err(e) = monitor_handle.await {
            error!("Error waiting for event monitor to stop: {}", e);
        }
    }

    /// Plays the sound configured for a single event. Unknown names and
    /// playback failures are logged and do not affect later events.
    fn handle_event(engine: &Engine, library: &Library, event: Event) {
        info!(event = ?event, "Received event.");

        match event {
            Event::Sound(name) => match library.get(&name) {
                Some(entry) => {
                    if let Err(e) = engine.play_with_gain(&entry.sound, entry.gain) {
                        error!(sound = %name, err = %e, "Unable to play sound");
                    }
                }
                None => warn!(sound = %name, "No sound configured for event"),
            },
        }
    }

    /// Reads the config file again and swaps the library contents. A config
    /// that fails to load leaves the current library in place.
    async fn reload(library: &Arc<Library>, config_path: &Path) {
        info!(path = ?config_path, "Reloading sound library");
        match Config::load(config_path) {
            Ok(config) => {
                let library = library.clone();
                match tokio::task::spawn_blocking(move || {
                    library.reload(&config);
                    library.len()
                })
                .await
                {
                    Ok(sounds) => info!(sounds, "Sound library reloaded"),
                    Err(e) => error!(err = %e, "Library reload failed"),
                }
            }
            Err(e) => error!(err = %e, "Unable to reload config, keeping current library"),
        }
    }

    /// Completes when a SIGHUP arrives. If the signal stream closes, pends
    /// forever so the select loop falls back to events only.
    #[cfg(unix)]
    async fn hangup_received(hangup: &mut Option<tokio::signal::unix::Signal>) {
        loop {
            let received = match hangup.as_mut() {
                Some(signal) => signal.recv().await,
                None => std::future::pending::<Option<()>>().await,
            };
            match received {
                Some(()) => return,
                None => *hangup = None,
            }
        }
    }
}
