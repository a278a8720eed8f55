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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, Level};

use super::Event;

/// A driver that reads event names from stdin, one per line. Host
/// applications pipe event names in to trigger sounds.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads event names from the reader until EOF. Blank lines are skipped
    /// and surrounding whitespace is trimmed.
    fn monitor_io<R>(events_tx: &Sender<Event>, reader: R) -> Result<(), io::Error>
    where
        R: io::BufRead,
    {
        for line in reader.lines() {
            let line = line?;
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            events_tx
                .blocking_send(Event::Sound(name.to_string()))
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(())
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "stdin driver");
            let _enter = span.enter();

            info!("Stdin driver started.");
            let result = Self::monitor_io(&events_tx, io::stdin().lock());
            info!("Stdin driver finished.");
            result
        })
    }
}
