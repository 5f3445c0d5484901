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
mod config;
mod controller;
mod engine;
mod midi;
mod params;
mod run;
mod sync;
#[cfg(test)]
mod test;

use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::controller::Controller;
use crate::engine::Pattern;
use crate::params::Params;
use crate::run::Runner;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=MIDI arpeggiator

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/arpline
ExecStart=/usr/local/bin/arpline start "$ARPLINE_CONFIG"
ExecReload=/bin/kill -HUP $MAINPID

[Install]
WantedBy=multi-user.target
Alias=arpline.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A live MIDI arpeggiator."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI input/output devices.
    MidiDevices {},
    /// Runs the arpeggiator against a MIDI device with inline options.
    Run {
        /// The MIDI device name to attach to.
        device_name: String,
        /// The tempo driving the trigger interval, in beats per minute.
        #[arg(short, long, default_value_t = params::DEFAULT_SPEED)]
        speed: f32,
        /// Scales the effective trigger interval.
        #[arg(short = 'm', long, default_value_t = params::DEFAULT_MULTIPLIER)]
        speed_multiplier: f32,
        /// The arpeggiation pattern, by name or id.
        #[arg(short, long, default_value = "ascending")]
        pattern: String,
        /// The number of octave copies per trigger.
        #[arg(short, long, default_value_t = params::DEFAULT_OCTAVE_RANGE)]
        octave_range: u8,
        /// Also sound notes whose keys have already been released.
        #[arg(long)]
        no_require_held: bool,
    },
    /// Start will start the arpeggiator from a config file.
    Start {
        /// The path to the arpeggiator config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Run {
            device_name,
            speed,
            speed_multiplier,
            pattern,
            octave_range,
            no_require_held,
        } => {
            let pattern = pattern.parse::<Pattern>()?;
            let device = midi::get_device(&device_name)?;
            let params = Arc::new(Params::new(speed, speed_multiplier, pattern, octave_range));
            serve(device, params, !no_require_held, run::DEFAULT_TICK_INTERVAL).await?;
        }
        Commands::Start { config_path } => {
            let config = config::parse(&PathBuf::from(config_path))?;
            let device = midi::get_device(config.midi_device())?;
            let params = Arc::new(config.params());
            let tick_interval = config.tick_interval()?;
            serve(device, params, config.require_held(), tick_interval).await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}

/// Runs the arpeggiator until the keyboard controller quits, then
/// silences it.
async fn serve(
    device: Arc<dyn midi::Device>,
    params: Arc<Params>,
    require_held: bool,
    tick_interval: Duration,
) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::start(device, params, require_held, tick_interval)?;
    let driver = Arc::new(controller::keyboard::Driver::new());
    let mut controller = Controller::new(runner.params(), driver)?;

    controller.join().await?;
    runner.stop();

    Ok(())
}
