#[macro_use]
extern crate clap;

use anyhow::{Context, Result};
use clap::App;
use mcp7940::linux;

fn main() -> Result<()> {
    env_logger::init();
    let matches = App::new("clear_alarms")
        .version(crate_version!())
        .about("Clear and disable both MCP7940 alarms")
        .arg(linux::bus_arg())
        .get_matches();

    let bus = matches.value_of("bus").unwrap_or(linux::DEFAULT_BUS);
    let mut rtc = linux::open(bus).with_context(|| format!("failed to open {}", bus))?;
    rtc.clear_alarms().context("failed to clear the alarms")?;
    Ok(())
}
