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
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::engine::Pattern;

pub const SPEED_RANGE: RangeInclusive<f32> = 30.0..=693.0;
pub const MULTIPLIER_RANGE: RangeInclusive<f32> = 0.1..=4.0;
pub const OCTAVE_RANGE: RangeInclusive<u8> = 1..=3;

pub const DEFAULT_SPEED: f32 = 120.0;
pub const DEFAULT_MULTIPLIER: f32 = 1.0;
pub const DEFAULT_OCTAVE_RANGE: u8 = 1;

/// The live parameter surface. Writers (the controller thread, CLI
/// setup) and the reader (the processing cycle) share this through an
/// Arc; every field is an independently-updatable atomic scalar, so no
/// lock is ever taken on the cycle path. There is deliberately no
/// cross-field atomicity: a cycle may observe a new speed with an old
/// multiplier, which is harmless since the interval is recomputed every
/// cycle anyway.
///
/// The f32 parameters are stored as their bit patterns in an AtomicU32.
pub struct Params {
    speed: AtomicU32,
    multiplier: AtomicU32,
    pattern: AtomicU8,
    octave_range: AtomicU8,
    stop: AtomicBool,
}

/// The values one processing cycle runs with.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    pub speed: f32,
    pub multiplier: f32,
    pub pattern: Pattern,
    pub octave_range: u8,
    pub stop: bool,
}

impl Default for Params {
    fn default() -> Params {
        Params::new(
            DEFAULT_SPEED,
            DEFAULT_MULTIPLIER,
            Pattern::default(),
            DEFAULT_OCTAVE_RANGE,
        )
    }
}

impl Params {
    /// Creates a parameter surface with the given initial values,
    /// clamped to their valid ranges.
    pub fn new(speed: f32, multiplier: f32, pattern: Pattern, octave_range: u8) -> Params {
        let params = Params {
            speed: AtomicU32::new(0),
            multiplier: AtomicU32::new(0),
            pattern: AtomicU8::new(0),
            octave_range: AtomicU8::new(0),
            stop: AtomicBool::new(false),
        };
        params.set_speed(speed);
        params.set_multiplier(multiplier);
        params.set_pattern(pattern);
        params.set_octave_range(octave_range);
        params
    }

    pub fn set_speed(&self, speed: f32) {
        let speed = speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end());
        self.speed.store(speed.to_bits(), Ordering::Relaxed);
    }

    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed.load(Ordering::Relaxed))
    }

    pub fn set_multiplier(&self, multiplier: f32) {
        let multiplier = multiplier.clamp(*MULTIPLIER_RANGE.start(), *MULTIPLIER_RANGE.end());
        self.multiplier.store(multiplier.to_bits(), Ordering::Relaxed);
    }

    pub fn multiplier(&self) -> f32 {
        f32::from_bits(self.multiplier.load(Ordering::Relaxed))
    }

    pub fn set_pattern(&self, pattern: Pattern) {
        self.pattern.store(pattern.id(), Ordering::Relaxed);
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::from(self.pattern.load(Ordering::Relaxed))
    }

    pub fn set_octave_range(&self, octave_range: u8) {
        let octave_range = octave_range.clamp(*OCTAVE_RANGE.start(), *OCTAVE_RANGE.end());
        self.octave_range.store(octave_range, Ordering::Relaxed);
    }

    pub fn octave_range(&self) -> u8 {
        self.octave_range.load(Ordering::Relaxed)
    }

    /// Requests that the engine silence and clear itself. The request
    /// stays pending until a cycle consumes it.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Takes the values for one processing cycle. A pending stop
    /// request is consumed here, so exactly one cycle services it; only
    /// the cycle thread should call this.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            speed: self.speed(),
            multiplier: self.multiplier(),
            pattern: self.pattern(),
            octave_range: self.octave_range(),
            stop: self.stop.swap(false, Ordering::AcqRel),
        }
    }
}
