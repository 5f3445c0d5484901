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
use std::str::FromStr;

use serde::Deserialize;

/// The rule governing which chord note is chosen at each trigger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Walks the chord front to back, wrapping around.
    #[default]
    Ascending,
    /// Walks the chord back to front, wrapping around.
    Descending,
    /// Bounces between both ends of the chord without double-hitting them.
    AscendDescend,
    /// Like ascend-descend, but walks downward first.
    DescendAscend,
    /// Sounds each chord note twice before moving on.
    RepeatTwice,
    /// Sounds each chord note three times before moving on.
    RepeatThrice,
    /// Walks the chord in the order the keys were played.
    PlayedOrder,
}

impl Pattern {
    /// The parameter value this pattern is addressed by.
    pub fn id(&self) -> u8 {
        match self {
            Pattern::Ascending => 0,
            Pattern::Descending => 1,
            Pattern::AscendDescend => 2,
            Pattern::DescendAscend => 3,
            Pattern::RepeatTwice => 4,
            Pattern::RepeatThrice => 5,
            Pattern::PlayedOrder => 6,
        }
    }
}

impl From<u8> for Pattern {
    /// Maps a parameter value to a pattern. Unrecognized values behave
    /// as ascending.
    fn from(id: u8) -> Pattern {
        match id {
            1 => Pattern::Descending,
            2 => Pattern::AscendDescend,
            3 => Pattern::DescendAscend,
            4 => Pattern::RepeatTwice,
            5 => Pattern::RepeatThrice,
            6 => Pattern::PlayedOrder,
            _ => Pattern::Ascending,
        }
    }
}

impl FromStr for Pattern {
    type Err = String;

    /// Parses a pattern from its configuration name or parameter value.
    fn from_str(s: &str) -> Result<Pattern, String> {
        match s {
            "ascending" => Ok(Pattern::Ascending),
            "descending" => Ok(Pattern::Descending),
            "ascend_descend" => Ok(Pattern::AscendDescend),
            "descend_ascend" => Ok(Pattern::DescendAscend),
            "repeat_twice" => Ok(Pattern::RepeatTwice),
            "repeat_thrice" => Ok(Pattern::RepeatThrice),
            "played_order" => Ok(Pattern::PlayedOrder),
            _ => match s.parse::<u8>() {
                Ok(id) if id <= 6 => Ok(Pattern::from(id)),
                _ => Err(format!("unrecognized pattern {}", s)),
            },
        }
    }
}

/// The direction a bounce pattern is currently walking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl Direction {
    fn flip(&mut self) {
        *self = match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        };
    }
}

/// The sequencer cursor and the bookkeeping the bounce and repeat
/// patterns need. The engine owns one of these and threads it through
/// every trigger.
#[derive(Clone, Copy, Debug)]
pub struct StepState {
    cursor: usize,
    direction: Direction,
    repeat_count: u8,
}

impl Default for StepState {
    fn default() -> StepState {
        StepState::new()
    }
}

impl StepState {
    /// Creates a fresh sequencer state: cursor at the front of the
    /// chord, walking upward, no repeats counted.
    pub fn new() -> StepState {
        StepState {
            cursor: 0,
            direction: Direction::Up,
            repeat_count: 0,
        }
    }

    /// Resets to the initial state. Used by the stop/clear path.
    pub fn reset(&mut self) {
        *self = StepState::new();
    }

    /// Keeps the cursor valid after the chord shrinks. Callers must
    /// invoke this before stepping whenever notes may have been removed.
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.cursor = 0;
        } else if self.cursor >= len {
            self.cursor %= len;
        }
    }

    /// Advances the state by one trigger and returns the chord index to
    /// sound. `len` is the current chord size and must be non-zero; the
    /// caller checks emptiness before triggering.
    pub fn step(&mut self, pattern: Pattern, len: usize) -> usize {
        // A single note repeats without touching direction or repeat state.
        if len == 1 {
            self.cursor = 0;
            return 0;
        }

        match pattern {
            Pattern::Ascending | Pattern::PlayedOrder => {
                self.cursor = (self.cursor + 1) % len;
            }
            Pattern::Descending => {
                self.cursor = if self.cursor == 0 {
                    len - 1
                } else {
                    self.cursor - 1
                };
            }
            Pattern::AscendDescend => self.bounce(len, Direction::Up),
            Pattern::DescendAscend => self.bounce(len, Direction::Down),
            Pattern::RepeatTwice => return self.repeat(2, len),
            Pattern::RepeatThrice => return self.repeat(3, len),
        }

        self.cursor
    }

    /// One bounce step. The direction field resets to up, so patterns
    /// that start downward read it mirrored through `initial`. The flip
    /// and the index step happen in the same trigger, which is what
    /// keeps the boundary notes from sounding twice in a row.
    fn bounce(&mut self, len: usize, initial: Direction) {
        let moving_up = (self.direction == Direction::Up) == (initial == Direction::Up);
        if moving_up {
            if self.cursor < len - 1 {
                self.cursor += 1;
            } else {
                self.direction.flip();
                self.cursor -= 1;
            }
        } else if self.cursor > 0 {
            self.cursor -= 1;
        } else {
            self.direction.flip();
            self.cursor += 1;
        }
    }

    /// One repeat step: the cursored note sounds `reps` times in total
    /// before the cursor advances as in ascending.
    fn repeat(&mut self, reps: u8, len: usize) -> usize {
        let index = self.cursor;
        self.repeat_count += 1;
        if self.repeat_count >= reps {
            self.repeat_count = 0;
            self.cursor = (self.cursor + 1) % len;
        }
        index
    }
}

#[cfg(test)]
mod test {
    use super::{Pattern, StepState};

    /// Steps `count` times over a chord of the given size and collects
    /// the visited indices.
    fn visit(state: &mut StepState, pattern: Pattern, len: usize, count: usize) -> Vec<usize> {
        (0..count).map(|_| state.step(pattern, len)).collect()
    }

    #[test]
    fn test_ascending_cycles() {
        let mut state = StepState::new();
        assert_eq!(
            vec![1, 2, 3, 0, 1, 2, 3, 0],
            visit(&mut state, Pattern::Ascending, 4, 8),
        );
    }

    #[test]
    fn test_descending_reverses_ascending() {
        let mut ascending = StepState::new();
        let mut descending = StepState::new();

        let up = visit(&mut ascending, Pattern::Ascending, 5, 5);
        let down = visit(&mut descending, Pattern::Descending, 5, 5);

        let mut reversed = down.clone();
        reversed.reverse();
        // Both walk the same cycle, one in each direction.
        assert_eq!(vec![1, 2, 3, 4, 0], up);
        assert_eq!(vec![4, 3, 2, 1, 0], down);
        assert_eq!(reversed, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_ascend_descend_bounces_without_double_hit() {
        let mut state = StepState::new();
        assert_eq!(
            vec![1, 2, 1, 0, 1, 2, 1, 0],
            visit(&mut state, Pattern::AscendDescend, 3, 8),
        );
    }

    #[test]
    fn test_descend_ascend_walks_down_first() {
        let mut state = StepState::new();
        // From the middle of a 4 note chord the mirror is visible: the
        // walk heads for index 0 before turning around.
        state.cursor = 2;
        assert_eq!(
            vec![1, 0, 1, 2, 3, 2, 1, 0],
            visit(&mut state, Pattern::DescendAscend, 4, 8),
        );
    }

    #[test]
    fn test_repeat_twice_doubles_every_note() {
        let mut state = StepState::new();
        assert_eq!(
            vec![0, 0, 1, 1, 0, 0, 1, 1],
            visit(&mut state, Pattern::RepeatTwice, 2, 8),
        );
    }

    #[test]
    fn test_repeat_thrice_triples_every_note() {
        let mut state = StepState::new();
        assert_eq!(
            vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 0],
            visit(&mut state, Pattern::RepeatThrice, 3, 10),
        );
    }

    #[test]
    fn test_single_note_is_a_fixed_point_for_every_pattern() {
        for id in 0..=6u8 {
            let mut state = StepState::new();
            assert_eq!(
                vec![0; 5],
                visit(&mut state, Pattern::from(id), 1, 5),
                "pattern {} advanced on a single note chord",
                id,
            );
        }
    }

    #[test]
    fn test_unknown_pattern_id_behaves_as_ascending() {
        assert_eq!(Pattern::Ascending, Pattern::from(7));
        assert_eq!(Pattern::Ascending, Pattern::from(255));
    }

    #[test]
    fn test_clamp_keeps_cursor_in_bounds() {
        let mut state = StepState::new();
        for _ in 0..4 {
            state.step(Pattern::Ascending, 5);
        }
        assert_eq!(4, state.cursor);

        state.clamp(3);
        assert!(state.cursor < 3);

        state.clamp(0);
        assert_eq!(0, state.cursor);
    }

    #[test]
    fn test_pattern_names_and_ids_parse() {
        assert_eq!(Ok(Pattern::AscendDescend), "ascend_descend".parse());
        assert_eq!(Ok(Pattern::RepeatThrice), "5".parse());
        assert_eq!(Ok(Pattern::PlayedOrder), "played_order".parse());
        assert!("sideways".parse::<Pattern>().is_err());
        assert!("7".parse::<Pattern>().is_err());
    }
}
