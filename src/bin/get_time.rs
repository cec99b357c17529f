#[macro_use]
extern crate clap;

use anyhow::{Context, Result};
use clap::App;
use mcp7940::linux;

fn main() -> Result<()> {
    env_logger::init();
    let matches = App::new("get_time")
        .version(crate_version!())
        .about("Print the date and time held by the MCP7940")
        .arg(linux::bus_arg())
        .get_matches();

    let bus = matches.value_of("bus").unwrap_or(linux::DEFAULT_BUS);
    let mut rtc = linux::open(bus).with_context(|| format!("failed to open {}", bus))?;
    let now = rtc.datetime().context("failed to read the clock")?;
    println!("{}", now.format(linux::TIME_FORMAT));
    Ok(())
}
