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
use std::fs;
use std::path::Path;
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use crate::engine::Pattern;
use crate::params::{
    Params, DEFAULT_MULTIPLIER, DEFAULT_OCTAVE_RANGE, DEFAULT_SPEED, MULTIPLIER_RANGE,
    OCTAVE_RANGE, SPEED_RANGE,
};
use crate::run::DEFAULT_TICK_INTERVAL;

mod error;

pub use error::ConfigError;

/// The YAML representation of the arpeggiator configuration.
#[derive(Deserialize)]
pub struct Config {
    /// The MIDI device to attach to.
    midi_device: String,

    /// How often the processing cycle runs.
    tick_interval: Option<String>,

    /// The engine parameters.
    #[serde(default)]
    engine: Engine,
}

/// The YAML representation of the engine parameters.
#[derive(Deserialize)]
#[serde(default)]
pub struct Engine {
    /// Tempo-like driver of the trigger interval, in beats per minute.
    speed: f32,

    /// Scales the effective trigger interval.
    speed_multiplier: f32,

    /// The arpeggiation pattern.
    pattern: Pattern,

    /// How many octave copies each trigger produces.
    octave_range: u8,

    /// Whether a note sounds only while its key is still held.
    require_held: bool,
}

impl Default for Engine {
    fn default() -> Engine {
        Engine {
            speed: DEFAULT_SPEED,
            speed_multiplier: DEFAULT_MULTIPLIER,
            pattern: Pattern::default(),
            octave_range: DEFAULT_OCTAVE_RANGE,
            require_held: true,
        }
    }
}

/// Parses the configuration from a YAML file.
pub fn parse(file: &Path) -> Result<Config, ConfigError> {
    let config: Config = serde_yml::from_str(&fs::read_to_string(file)?)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// The name of the MIDI device to attach to.
    pub fn midi_device(&self) -> &str {
        &self.midi_device
    }

    /// The cadence of the processing cycle.
    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        match &self.tick_interval {
            Some(tick_interval) => Ok(DurationString::from_string(tick_interval.clone())
                .map_err(|e| ConfigError::TickInterval(e.to_string()))?
                .into()),
            None => Ok(DEFAULT_TICK_INTERVAL),
        }
    }

    /// Builds the parameter surface from the configured engine values.
    pub fn params(&self) -> Params {
        Params::new(
            self.engine.speed,
            self.engine.speed_multiplier,
            self.engine.pattern,
            self.engine.octave_range,
        )
    }

    /// Whether a note sounds only while its key is still held.
    pub fn require_held(&self) -> bool {
        self.engine.require_held
    }

    /// Rejects out-of-range engine values. Unlike the live parameter
    /// surface, which clamps, a bad config file is an error.
    fn validate(&self) -> Result<(), ConfigError> {
        if !SPEED_RANGE.contains(&self.engine.speed) {
            return Err(ConfigError::range("speed", self.engine.speed, SPEED_RANGE));
        }
        if !MULTIPLIER_RANGE.contains(&self.engine.speed_multiplier) {
            return Err(ConfigError::range(
                "speed_multiplier",
                self.engine.speed_multiplier,
                MULTIPLIER_RANGE,
            ));
        }
        if !OCTAVE_RANGE.contains(&self.engine.octave_range) {
            return Err(ConfigError::range(
                "octave_range",
                f32::from(self.engine.octave_range),
                *OCTAVE_RANGE.start() as f32..=*OCTAVE_RANGE.end() as f32,
            ));
        }
        self.tick_interval().map(|_| ())
    }
}
