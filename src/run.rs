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
use std::{
    error::Error,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::Receiver;
use midly::{live::LiveEvent, MidiMessage};
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{error, info, span, Level};

use crate::{
    engine::{Engine, NoteInput, NoteOutput},
    midi,
    params::Params,
    sync::CancelHandle,
};

/// Default cadence of the processing cycle.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// MIDI channel the arpeggiator emits on.
const OUTPUT_CHANNEL: u8 = 0;

/// Default priority for the cycle thread when ARPLINE_THREAD_PRIORITY is unset.
const DEFAULT_CYCLE_THREAD_PRIORITY: u8 = 70;

/// Runs the arpeggiator engine against a MIDI device. Owns the cycle
/// thread; everything else talks to it through the parameter surface
/// and the cancel handle.
pub struct Runner {
    params: Arc<Params>,
    cancel_handle: CancelHandle,
    device: Arc<dyn midi::Device>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Runner {
    /// Opens the device and starts the processing cycle.
    pub fn start(
        device: Arc<dyn midi::Device>,
        params: Arc<Params>,
        require_held: bool,
        tick_interval: Duration,
    ) -> Result<Runner, Box<dyn Error>> {
        device.open_output()?;

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        device.watch_events(events_tx)?;

        let cancel_handle = CancelHandle::new();
        let handle = {
            let device = device.clone();
            let params = params.clone();
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                cycle_loop(
                    device,
                    events_rx,
                    params,
                    cancel_handle,
                    require_held,
                    tick_interval,
                )
            })
        };

        info!(device = device.name(), "Arpeggiator started.");

        Ok(Runner {
            params,
            cancel_handle,
            device,
            handle: Some(handle),
        })
    }

    /// The shared parameter surface.
    pub fn params(&self) -> Arc<Params> {
        self.params.clone()
    }

    /// Stops the processing cycle and waits for it to silence the
    /// engine and exit. Idempotent.
    pub fn stop(&mut self) {
        self.cancel_handle.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Error while joining the cycle thread!");
            }
            self.device.stop_watch_events();
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The processing cycle. Runs until cancelled: drain input, snapshot
/// parameters, run the engine, forward its output to the device, sleep
/// until the next tick. The engine side of the loop never blocks or
/// allocates; only device emission touches the heap.
fn cycle_loop(
    device: Arc<dyn midi::Device>,
    events_rx: Receiver<Vec<u8>>,
    params: Arc<Params>,
    cancel_handle: CancelHandle,
    require_held: bool,
    tick_interval: Duration,
) {
    let span = span!(Level::INFO, "cycle");
    let _enter = span.enter();

    configure_cycle_thread_priority();

    let mut engine = Engine::new(require_held);
    let mut inputs: Vec<NoteInput> = Vec::with_capacity(128);
    // Worst case for one cycle: an off for every chord note plus the
    // octave fan.
    let mut out: Vec<NoteOutput> = Vec::with_capacity(131);

    let mut next_tick = Instant::now();
    loop {
        if cancel_handle.is_cancelled() {
            out.clear();
            engine.silence(&mut out);
            emit_all(device.as_ref(), &out);
            info!("Processing cycle stopped.");
            return;
        }

        inputs.clear();
        while let Ok(raw_event) = events_rx.try_recv() {
            if let Some(input) = note_input(&raw_event) {
                inputs.push(input);
            }
        }

        out.clear();
        let snapshot = params.snapshot();
        engine.process(Instant::now(), &inputs, &snapshot, &mut out);
        emit_all(device.as_ref(), &out);

        next_tick += tick_interval;
        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            // The cycle overran; restart the cadence rather than
            // bursting to catch up.
            next_tick = now;
        }
    }
}

/// Extracts a note-on/note-off from raw device bytes. Velocity zero
/// note-ons count as note-offs; the channel and any non-note messages
/// are ignored.
fn note_input(raw_event: &[u8]) -> Option<NoteInput> {
    match LiveEvent::parse(raw_event).ok()? {
        LiveEvent::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } => Some(NoteInput {
            note: key,
            on: vel.as_int() > 0,
        }),
        LiveEvent::Midi {
            message: MidiMessage::NoteOff { key, .. },
            ..
        } => Some(NoteInput {
            note: key,
            on: false,
        }),
        _ => None,
    }
}

/// Converts an engine output into the wire event.
fn live_event(event: NoteOutput) -> LiveEvent<'static> {
    let message = match event {
        NoteOutput::On(key) => MidiMessage::NoteOn {
            key,
            vel: event.velocity().into(),
        },
        NoteOutput::Off(key) => MidiMessage::NoteOff {
            key,
            vel: event.velocity().into(),
        },
    };
    LiveEvent::Midi {
        channel: OUTPUT_CHANNEL.into(),
        message,
    }
}

fn emit_all(device: &dyn midi::Device, out: &[NoteOutput]) {
    for event in out {
        if let Err(e) = device.emit(live_event(*event)) {
            error!(err = e.as_ref(), "Error emitting MIDI event.");
        }
    }
}

/// Reads ARPLINE_THREAD_PRIORITY (0-99) once; used when the cycle
/// thread starts so we don't touch env in the hot path.
fn cycle_thread_priority() -> ThreadPriorityValue {
    std::env::var("ARPLINE_THREAD_PRIORITY")
        .ok()
        .and_then(|v| {
            let n = v.parse::<u8>().ok()?;
            (n < 100).then(|| ThreadPriorityValue::try_from(n).ok())?
        })
        .unwrap_or_else(|| ThreadPriorityValue::try_from(DEFAULT_CYCLE_THREAD_PRIORITY).unwrap())
}

/// Boosts the cycle thread, attempting RT (SCHED_FIFO) scheduling on
/// unix. Advanced users can opt out with ARPLINE_DISABLE_RT=1.
fn configure_cycle_thread_priority() {
    let disable_rt = std::env::var("ARPLINE_DISABLE_RT")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let tp = ThreadPriority::Crossplatform(cycle_thread_priority());
    let _ = set_current_thread_priority(tp);

    #[cfg(unix)]
    if !disable_rt {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => {
                info!("Enabled RT SCHED_FIFO for the cycle thread");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to set RT SCHED_FIFO for the cycle thread"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = disable_rt;
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use midly::{live::LiveEvent, num::u7, MidiMessage};

    use crate::{engine::Pattern, midi, params::Params, test::eventually};

    use super::{note_input, Runner};

    fn emitted_contains(device: &midi::test::Device, expected: &LiveEvent<'static>) -> bool {
        device.emitted_events().iter().any(|buf| {
            LiveEvent::parse(buf)
                .map(|event| event == *expected)
                .unwrap_or(false)
        })
    }

    fn note_on_event(key: u8, vel: u8) -> LiveEvent<'static> {
        LiveEvent::Midi {
            channel: 0.into(),
            message: MidiMessage::NoteOn {
                key: u7::from_int_lossy(key),
                vel: u7::from_int_lossy(vel),
            },
        }
    }

    fn note_off_event(key: u8) -> LiveEvent<'static> {
        LiveEvent::Midi {
            channel: 0.into(),
            message: MidiMessage::NoteOff {
                key: u7::from_int_lossy(key),
                vel: u7::from_int_lossy(0),
            },
        }
    }

    #[test]
    fn test_note_input_classification() {
        assert_eq!(
            Some(super::NoteInput {
                note: u7::from_int_lossy(60),
                on: true,
            }),
            note_input(&[0x90, 60, 100]),
        );
        // Velocity zero note-on counts as a note-off.
        assert_eq!(
            Some(super::NoteInput {
                note: u7::from_int_lossy(60),
                on: false,
            }),
            note_input(&[0x90, 60, 0]),
        );
        assert_eq!(
            Some(super::NoteInput {
                note: u7::from_int_lossy(60),
                on: false,
            }),
            note_input(&[0x80, 60, 64]),
        );
        // The channel is not interpreted.
        assert_eq!(
            Some(super::NoteInput {
                note: u7::from_int_lossy(60),
                on: true,
            }),
            note_input(&[0x95, 60, 100]),
        );
        // Non-note messages are ignored, as is garbage.
        assert_eq!(None, note_input(&[0xB0, 1, 64]));
        assert_eq!(None, note_input(&[0x90]));
    }

    #[test]
    fn test_runner_arpeggiates_and_stops() -> Result<(), Box<dyn Error>> {
        let mock = Arc::new(midi::test::Device::get("mock-device"));
        let device: Arc<dyn midi::Device> = mock.clone();
        // Fastest the parameters allow, so triggers land well inside
        // the eventually timeout.
        let params = Arc::new(Params::new(693.0, 4.0, Pattern::Ascending, 1));

        let mut runner = Runner::start(
            device,
            params.clone(),
            true,
            Duration::from_millis(1),
        )?;

        mock.mock_event(&[0x90, 60, 100]);
        eventually(
            || emitted_contains(&mock, &note_on_event(60, 100)),
            "Arpeggiated note-on never emitted",
        );

        // A stop request silences the chord with a single note-off.
        params.request_stop();
        eventually(
            || emitted_contains(&mock, &note_off_event(60)),
            "Stop never emitted a note-off",
        );

        mock.reset_emitted_events();
        runner.stop();

        // After the cycle thread exits, nothing else is emitted.
        let emitted = mock.emitted_events().len();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(emitted, mock.emitted_events().len());

        Ok(())
    }

    #[test]
    fn test_runner_silences_on_shutdown() -> Result<(), Box<dyn Error>> {
        let mock = Arc::new(midi::test::Device::get("mock-device"));
        let device: Arc<dyn midi::Device> = mock.clone();
        let params = Arc::new(Params::new(693.0, 4.0, Pattern::Ascending, 1));

        let mut runner = Runner::start(
            device,
            params.clone(),
            true,
            Duration::from_millis(1),
        )?;

        mock.mock_event(&[0x90, 72, 100]);
        eventually(
            || emitted_contains(&mock, &note_on_event(72, 100)),
            "Arpeggiated note-on never emitted",
        );

        runner.stop();
        assert!(emitted_contains(&mock, &note_off_event(72)));

        Ok(())
    }
}
