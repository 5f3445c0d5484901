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
use tracing::{info, span, warn, Level};

use crate::engine::Pattern;

use super::Event;

const SPEED: &str = "speed";
const MULT: &str = "mult";
const PATTERN: &str = "pattern";
const OCTAVES: &str = "octaves";
const STOP: &str = "stop";
const QUIT: &str = "quit";

/// A controller that adjusts the arpeggiator from the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and dispatches one command. Returns false once monitoring
    /// should stop.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <bpm>, {} <x>, {} <name|id>, {} <1-3>, {}, {}): ",
            SPEED, MULT, PATTERN, OCTAVES, STOP, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            // EOF behaves like quit.
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        let input = input.trim().to_lowercase();
        let mut fields = input.split_whitespace();
        let event = match (fields.next(), fields.next()) {
            (Some(SPEED), Some(value)) => value.parse::<f32>().ok().map(Event::SetSpeed),
            (Some(MULT), Some(value)) => value.parse::<f32>().ok().map(Event::SetMultiplier),
            (Some(PATTERN), Some(value)) => value.parse::<Pattern>().ok().map(Event::SetPattern),
            (Some(OCTAVES), Some(value)) => value.parse::<u8>().ok().map(Event::SetOctaveRange),
            (Some(STOP), None) => Some(Event::Stop),
            (Some(QUIT), None) => Some(Event::Quit),
            _ => None,
        };

        let keep_monitoring = !matches!(&event, Some(Event::Quit));
        match event {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => {
                warn!(input = input, "Unrecognized input");
            }
        }

        Ok(keep_monitoring)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::engine::Pattern;

    use super::{Driver, Event};

    fn get_event(command: &str) -> Result<(Option<Event>, bool), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(command.as_bytes());
        let writer = BufWriter::new(Vec::new());
        let keep_monitoring = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((receiver.blocking_recv(), keep_monitoring))
    }

    #[test]
    fn test_keyboard_commands() -> Result<(), io::Error> {
        assert_eq!(
            (Some(Event::SetSpeed(240.0)), true),
            get_event("speed 240\n")?
        );
        assert_eq!(
            (Some(Event::SetMultiplier(0.5)), true),
            get_event("mult 0.5\n")?
        );
        assert_eq!(
            (Some(Event::SetPattern(Pattern::AscendDescend)), true),
            get_event("pattern ascend_descend\n")?
        );
        assert_eq!(
            (Some(Event::SetPattern(Pattern::RepeatThrice)), true),
            get_event("pattern 5\n")?
        );
        assert_eq!(
            (Some(Event::SetOctaveRange(2)), true),
            get_event("octaves 2\n")?
        );
        assert_eq!((Some(Event::Stop), true), get_event("stop\n")?);
        assert_eq!((Some(Event::Quit), false), get_event("quit\n")?);
        Ok(())
    }

    #[test]
    fn test_unrecognized_input_keeps_monitoring() -> Result<(), io::Error> {
        assert_eq!((None, true), get_event("faster\n")?);
        assert_eq!((None, true), get_event("speed fast\n")?);
        assert_eq!((None, true), get_event("pattern sideways\n")?);
        assert_eq!((None, true), get_event("stop now\n")?);
        assert_eq!((None, true), get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_eof_quits() -> Result<(), io::Error> {
        assert_eq!((Some(Event::Quit), false), get_event("")?);
        Ok(())
    }
}
