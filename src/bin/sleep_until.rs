#[macro_use]
extern crate clap;

use anyhow::{Context, Result};
use clap::{App, Arg};
use mcp7940::linux::{self, SystemShutdown};
use mcp7940::wake::PowerOff;

fn main() -> Result<()> {
    env_logger::init();
    let matches = App::new("sleep_until")
        .version(crate_version!())
        .about("Arm the MCP7940 wake pulse and power the system off")
        .arg(linux::bus_arg())
        .arg(
            Arg::with_name("TIME")
                .required(true)
                .help("Wake time, e.g. \"06 Feb 2024 09:37:00\""),
        )
        .get_matches();

    let time = matches.value_of("TIME").context("no wake time given")?;
    let target = linux::parse_wake_time(time).with_context(|| {
        format!(
            "cannot parse {:?}, expected format {:?}",
            time,
            linux::WAKE_FORMAT
        )
    })?;

    let bus = matches.value_of("bus").unwrap_or(linux::DEFAULT_BUS);
    let mut rtc = linux::open(bus).with_context(|| format!("failed to open {}", bus))?;

    let schedule = rtc
        .schedule_wake(&target)
        .context("failed to schedule the wake-up")?;
    eprintln!("{}", linux::armed_message(&schedule));
    SystemShutdown
        .power_off()
        .context("alarms armed but shutdown failed")?;
    Ok(())
}
