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

use std::ops::RangeInclusive;

/// Typed error for config load/parse failures so callers can
/// distinguish e.g. file-not-found from parse errors without string
/// matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing config file: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("invalid tick interval: {0}")]
    TickInterval(String),

    #[error("{name} {value} outside valid range {min}..={max}")]
    Range {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

impl ConfigError {
    pub(super) fn range(name: &'static str, value: f32, range: RangeInclusive<f32>) -> ConfigError {
        ConfigError::Range {
            name,
            value,
            min: *range.start(),
            max: *range.end(),
        }
    }
}
