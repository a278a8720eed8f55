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
use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use earcon::audio;
use earcon::config::Config;
use earcon::controller::{stdin, Controller};
use earcon::library::Entry;
use earcon::{Engine, Library, Sound};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A notification sound engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Verifies that every sound in the given config loads.
    Check {
        /// The path to the config file.
        config_path: String,
    },
    /// Plays the given events all at once, then exits when playback finishes.
    Play {
        /// The path to the config file.
        config_path: String,
        /// The event names to trigger.
        #[arg(required = true)]
        events: Vec<String>,
    },
    /// Reads event names from stdin, one per line, and plays them until EOF.
    Listen {
        /// The path to the config file.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No output devices found.");
                return Ok(());
            }

            println!("Output devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Check { config_path } => {
            let config = Config::load(&PathBuf::from(&config_path))?;
            let target_rate = config.audio().sample_rate();

            let mut names: Vec<&String> = config.sounds().keys().collect();
            if names.is_empty() {
                println!("No sounds configured in {}.", config_path);
                return Ok(());
            }
            names.sort();

            let mut failed = 0;
            println!("Sounds (count: {}):", names.len());
            for name in names {
                let definition = &config.sounds()[name];
                match Sound::load(config.resolve_path(definition.file()), target_rate) {
                    Ok(sound) => println!(
                        "- {}: {:.2}s, {} ch, {} KiB, gain {}",
                        name,
                        sound.duration().as_secs_f64(),
                        sound.channel_count(),
                        sound.memory_size() / 1024,
                        definition.gain(),
                    ),
                    Err(e) => {
                        failed += 1;
                        println!("- {}: error: {}", name, e);
                    }
                }
            }

            if failed > 0 {
                return Err(format!("{} sound(s) failed to load", failed).into());
            }
        }
        Commands::Play {
            config_path,
            events,
        } => {
            let config = Config::load(&PathBuf::from(&config_path))?;
            let engine = Engine::start(config.audio())?;
            let library = Library::load(&config, engine.sample_rate());

            let mut entries: Vec<Entry> = Vec::with_capacity(events.len());
            for event in &events {
                match library.get(event) {
                    Some(entry) => entries.push(entry),
                    None => return Err(format!("no sound configured for '{}'", event).into()),
                }
            }

            let longest = entries
                .iter()
                .map(|entry| entry.sound.duration())
                .max()
                .unwrap_or_default();
            for entry in &entries {
                engine.play_with_gain(&entry.sound, entry.gain)?;
            }

            if !engine.wait_idle(longest + Duration::from_secs(2)) {
                return Err("playback did not finish in time".into());
            }
            // The device may still be sounding the final buffer.
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Commands::Listen { config_path } => {
            let config_path = PathBuf::from(config_path);
            let config = Config::load(&config_path)?;
            let engine = Arc::new(Engine::start(config.audio())?);
            let library = Arc::new(Library::load(&config, engine.sample_rate()));

            Controller::new(engine, library, config_path, Arc::new(stdin::Driver::new()))
                .join()
                .await?;
        }
    }

    Ok(())
}
