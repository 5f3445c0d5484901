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
use std::error::Error;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Level};

use crate::engine::Pattern;
use crate::params::Params;

pub mod keyboard;

/// Controller events that adjust the running arpeggiator.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Sets the speed parameter, in beats per minute.
    SetSpeed(f32),

    /// Sets the speed multiplier.
    SetMultiplier(f32),

    /// Selects the arpeggiation pattern.
    SetPattern(Pattern),

    /// Sets how many octave copies each trigger produces.
    SetOctaveRange(u8),

    /// Silences the arpeggiator and clears the chord.
    Stop,

    /// Shuts the controller down. The arpeggiator itself is stopped by
    /// whoever owns the runner.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Applies operator events to the parameter surface.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(params: Arc<Params>, driver: Arc<dyn Driver>) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(params, driver).await }),
        })
    }

    /// Join will block until the controller finishes, which happens on
    /// a quit event or when the driver closes its channel.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Applies events from the driver to the parameter surface.
    async fn trigger_events(params: Arc<Params>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");

            match event {
                Event::SetSpeed(speed) => params.set_speed(speed),
                Event::SetMultiplier(multiplier) => params.set_multiplier(multiplier),
                Event::SetPattern(pattern) => params.set_pattern(pattern),
                Event::SetOctaveRange(octave_range) => params.set_octave_range(octave_range),
                Event::Stop => params.request_stop(),
                Event::Quit => break,
            }
        }

        info!("Controller closing.");
        if let Err(e) = join_handle.await {
            error!("Error waiting for event monitor to stop: {}", e);
        }
    }
}
