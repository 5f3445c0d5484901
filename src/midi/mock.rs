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
    fmt,
    sync::{Arc, Mutex},
};

use crossbeam_channel::Sender;
use midly::live::LiveEvent;

/// A mock device. Input events are injected by tests and everything
/// emitted is recorded instead of reaching hardware.
#[derive(Clone)]
pub struct Device {
    name: String,
    watcher: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    emitted: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            watcher: Arc::new(Mutex::new(None)),
            emitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Injects raw MIDI input as if the hardware had produced it.
    #[cfg(test)]
    pub fn mock_event(&self, raw_event: &[u8]) {
        let watcher = self.watcher.lock().expect("unable to get watcher lock");
        if let Some(sender) = watcher.as_ref() {
            sender
                .send(raw_event.to_vec())
                .expect("error sending mock event");
        }
    }

    /// Returns everything emitted so far, in order.
    #[cfg(test)]
    pub fn emitted_events(&self) -> Vec<Vec<u8>> {
        self.emitted
            .lock()
            .expect("unable to get emitted lock")
            .clone()
    }

    /// Forgets recorded emissions.
    #[cfg(test)]
    pub fn reset_emitted_events(&self) {
        self.emitted
            .lock()
            .expect("unable to get emitted lock")
            .clear();
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), Box<dyn Error>> {
        let mut watcher = self.watcher.lock().expect("unable to get watcher lock");
        if watcher.is_some() {
            return Err("Already watching events.".into());
        }
        *watcher = Some(sender);
        Ok(())
    }

    fn stop_watch_events(&self) {
        self.watcher
            .lock()
            .expect("unable to get watcher lock")
            .take();
    }

    fn open_output(&self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn emit(&self, event: LiveEvent<'_>) -> Result<(), Box<dyn Error>> {
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        event.write(&mut buf)?;
        self.emitted
            .lock()
            .expect("unable to get emitted lock")
            .push(buf);
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use midly::{live::LiveEvent, num::u7, MidiMessage};

    use crate::midi::Device as _;

    use super::Device;

    #[test]
    fn test_injected_events_reach_the_watcher() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device");
        let (sender, receiver) = crossbeam_channel::unbounded();
        device.watch_events(sender)?;

        device.mock_event(&[0x90, 60, 100]);
        assert_eq!(vec![0x90, 60, 100], receiver.recv()?);

        device.stop_watch_events();
        // With the watcher gone, injection is a silent no-op.
        device.mock_event(&[0x90, 60, 100]);
        assert!(receiver.try_recv().is_err());

        Ok(())
    }

    #[test]
    fn test_emissions_are_recorded() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device");
        device.open_output()?;

        device.emit(LiveEvent::Midi {
            channel: 0.into(),
            message: MidiMessage::NoteOn {
                key: u7::from_int_lossy(60),
                vel: u7::from_int_lossy(100),
            },
        })?;

        assert_eq!(vec![vec![0x90, 60, 100]], device.emitted_events());

        device.reset_emitted_events();
        assert!(device.emitted_events().is_empty());

        Ok(())
    }
}
