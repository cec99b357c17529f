#[macro_use]
extern crate clap;

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{App, Arg};
use log::{info, warn};
use mcp7940::{linux, MCP7940Error};

fn main() -> Result<()> {
    env_logger::init();
    let matches = App::new("set_time")
        .version(crate_version!())
        .about("Set the MCP7940 clock and enable battery backup")
        .arg(linux::bus_arg())
        .arg(
            Arg::with_name("TIME")
                .required(true)
                .help("Local time, e.g. \"Tue 06 Feb 2024 09:37:00\""),
        )
        .get_matches();

    let time = matches.value_of("TIME").context("no time given")?;
    let datetime = linux::parse_time(time).with_context(|| {
        format!(
            "cannot parse {:?}, expected format {:?}",
            time,
            linux::TIME_FORMAT
        )
    })?;

    let bus = matches.value_of("bus").unwrap_or(linux::DEFAULT_BUS);
    let mut rtc = linux::open(bus).with_context(|| format!("failed to open {}", bus))?;

    rtc.clear_power_fail()
        .context("failed to clear the power-fail flag")?;
    rtc.set_battery_backup(true)
        .context("failed to enable battery backup")?;

    loop {
        match rtc.start_oscillator() {
            Ok(()) => break,
            Err(MCP7940Error::OscillatorStart) => {
                warn!("oscillator not running yet, retrying");
                thread::sleep(Duration::from_secs(1));
            }
            Err(e) => return Err(e).context("failed to start the oscillator"),
        }
    }

    rtc.set_datetime(&datetime)
        .context("failed to set the clock")?;
    info!("clock set to {}", datetime);
    Ok(())
}
