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
use std::time::Instant;

/// Milliseconds between triggers for the given speed and multiplier.
/// Recomputed from the live parameters every cycle so tempo changes
/// take effect on the very next comparison.
pub fn interval_ms(speed: f32, multiplier: f32) -> f64 {
    60_000.0 / (speed as f64 * multiplier as f64)
}

/// A free-running interval timer gating how often the sequencer
/// advances. Triggers fire no earlier than the interval but may fire
/// late depending on how often the cycle runs; no drift correction.
pub struct BeatClock {
    last_trigger: Instant,
}

impl BeatClock {
    pub fn new(now: Instant) -> BeatClock {
        BeatClock { last_trigger: now }
    }

    /// Whether enough time has elapsed since the last trigger. The
    /// comparison is at millisecond resolution, matching the interval
    /// derivation.
    pub fn due(&self, now: Instant, interval_ms: f64) -> bool {
        now.saturating_duration_since(self.last_trigger).as_millis() as f64 >= interval_ms
    }

    /// Records a trigger. Called by the engine whenever `due` fires.
    pub fn trigger(&mut self, now: Instant) {
        self.last_trigger = now;
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use super::{interval_ms, BeatClock};

    #[test]
    fn test_interval_from_speed_and_multiplier() {
        assert_eq!(500.0, interval_ms(120.0, 1.0));
        assert_eq!(250.0, interval_ms(120.0, 2.0));
        assert_eq!(2000.0, interval_ms(30.0, 1.0));
        // Multiplier shortens the interval below a single beat.
        assert!(interval_ms(693.0, 4.0) < 22.0);
    }

    #[test]
    fn test_never_triggers_early() {
        let start = Instant::now();
        let mut clock = BeatClock::new(start);
        let interval = interval_ms(120.0, 1.0);

        assert!(!clock.due(start, interval));
        assert!(!clock.due(start + Duration::from_millis(499), interval));
        assert!(clock.due(start + Duration::from_millis(500), interval));

        // Late cycles still fire, and the next interval is measured
        // from the trigger that was recorded.
        let late = start + Duration::from_millis(750);
        assert!(clock.due(late, interval));
        clock.trigger(late);
        assert!(!clock.due(late + Duration::from_millis(499), interval));
        assert!(clock.due(late + Duration::from_millis(500), interval));
    }

    #[test]
    fn test_tempo_change_applies_to_next_comparison() {
        let start = Instant::now();
        let clock = BeatClock::new(start);

        let now = start + Duration::from_millis(300);
        assert!(!clock.due(now, interval_ms(120.0, 1.0)));
        // Doubling the multiplier makes the same elapsed time due.
        assert!(clock.due(now, interval_ms(120.0, 2.0)));
    }
}
