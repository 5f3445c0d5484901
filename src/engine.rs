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

use midly::num::u7;

use crate::params::Snapshot;

mod chord;
mod clock;
mod pattern;

pub use pattern::Pattern;

use chord::Chord;
use clock::BeatClock;
use pattern::StepState;

/// Velocity of every arpeggiated note-on.
const NOTE_ON_VELOCITY: u8 = 100;

/// A note-on or note-off extracted from the device input stream, in
/// arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteInput {
    pub note: u7,
    pub on: bool,
}

/// An event the engine wants on the wire. Note-ons carry the fixed
/// arpeggio velocity; note-offs are velocity zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteOutput {
    On(u7),
    Off(u7),
}

impl NoteOutput {
    pub fn velocity(&self) -> u8 {
        match self {
            NoteOutput::On(_) => NOTE_ON_VELOCITY,
            NoteOutput::Off(_) => 0,
        }
    }
}

/// The arpeggiator engine. Owns all sequencing state and runs one
/// deterministic pass per processing cycle: service a pending stop,
/// apply the cycle's note input, and, when the beat clock fires, choose
/// and emit the next note. The engine performs no I/O, no allocation,
/// and never fails; it only reads the narrow cycle inputs it is handed.
///
/// `require_held` selects whether a chosen note is emitted only while
/// its key is still physically down.
pub struct Engine {
    chord: Chord,
    state: StepState,
    clock: BeatClock,
    require_held: bool,
}

impl Engine {
    pub fn new(require_held: bool) -> Engine {
        Engine {
            chord: Chord::new(),
            state: StepState::new(),
            clock: BeatClock::new(Instant::now()),
            require_held,
        }
    }

    /// Runs one processing cycle. Output events are appended to `out`
    /// in emission order: note-offs for released keys first, then the
    /// octave fan for a triggered note.
    pub fn process(
        &mut self,
        now: Instant,
        inputs: &[NoteInput],
        params: &Snapshot,
        out: &mut Vec<NoteOutput>,
    ) {
        // A stop consumes the whole cycle, input included.
        if params.stop {
            self.silence(out);
            return;
        }

        for input in inputs {
            if input.on {
                self.chord.note_on(input.note);
            } else {
                self.chord.note_off(input.note);
                out.push(NoteOutput::Off(input.note));
            }
        }
        // Removals may have stranded the cursor.
        self.state.clamp(self.chord.len());

        if !self
            .clock
            .due(now, clock::interval_ms(params.speed, params.multiplier))
        {
            return;
        }
        self.clock.trigger(now);

        if self.chord.is_empty() {
            return;
        }

        let index = self.state.step(params.pattern, self.chord.len());
        let note = self.chord.notes()[index];
        if self.require_held && !self.chord.is_held(note) {
            return;
        }

        for octave in 0..params.octave_range {
            let pitch = note.as_int() as u16 + 12 * octave as u16;
            // Octave copies past the MIDI range are dropped.
            if pitch > 127 {
                break;
            }
            out.push(NoteOutput::On(u7::from_int_lossy(pitch as u8)));
        }
    }

    /// The stop/clear path: one note-off per chord note, then all
    /// sequencing state is reset. Safe to call repeatedly; a second
    /// call finds nothing to silence.
    pub fn silence(&mut self, out: &mut Vec<NoteOutput>) {
        for note in self.chord.notes() {
            out.push(NoteOutput::Off(*note));
        }
        self.chord.clear();
        self.state.reset();
    }
}
