//! Linux glue for the command line utilities.
//!
//! Opens the chip through `/dev/i2c-N` and powers the host off with `shutdown -h now`.

use std::format;
use std::string::String;
use std::io;
use std::process::Command;

use chrono::NaiveDateTime;
use clap::Arg;
use linux_embedded_hal::{Delay, I2cdev};

use crate::wake::{PowerOff, WakeSchedule};
use crate::MCP7940;

pub use linux_embedded_hal::i2cdev::linux::LinuxI2CError;

/// Bus the RTC hangs off on the reference board.
pub const DEFAULT_BUS: &str = "/dev/i2c-2";

/// Format printed by `get_time` and accepted by `set_time`, e.g. `Tue 06 Feb 2024 09:37:00`.
pub const TIME_FORMAT: &str = "%a %d %b %Y %H:%M:%S";

/// Format accepted by `sleep_until`, e.g. `06 Feb 2024 09:37:00`.
pub const WAKE_FORMAT: &str = "%d %b %Y %H:%M:%S";

/// Driver bound to a Linux I2C character device.
pub type LinuxMCP7940 = MCP7940<I2cdev, Delay>;

/// Opens the I2C character device at `path`.
pub fn open(path: &str) -> Result<LinuxMCP7940, LinuxI2CError> {
    debug!("opening {}", path);
    let i2c = I2cdev::new(path)?;
    Ok(MCP7940::new(i2c, Delay))
}

/// The `--bus` option shared by every utility.
pub fn bus_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("bus")
        .short("b")
        .long("bus")
        .takes_value(true)
        .value_name("DEVICE")
        .default_value(DEFAULT_BUS)
        .help("I2C character device the RTC is attached to")
}

/// Parses a time in [`TIME_FORMAT`].
pub fn parse_time(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), TIME_FORMAT)
}

/// Parses a wake time in [`WAKE_FORMAT`].
pub fn parse_wake_time(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), WAKE_FORMAT)
}

/// Line printed by `sleep_until` once the alarms are armed and before power is removed.
pub fn armed_message(schedule: &WakeSchedule) -> String {
    format!(
        "wake pulse armed at {} and {}, shutting down",
        schedule.pre_pulse.format(TIME_FORMAT),
        schedule.target.format(TIME_FORMAT)
    )
}

/// Powers the host off through the system shutdown command.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdown;

impl PowerOff for SystemShutdown {
    type Error = io::Error;

    fn power_off(&mut self) -> Result<(), Self::Error> {
        info!("running shutdown -h now");
        let status = Command::new("shutdown").args(["-h", "now"]).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("shutdown exited with {status}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::string::ToString;

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("Tue 06 Feb 2024 09:37:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 6)
                .unwrap()
                .and_hms_opt(9, 37, 0)
                .unwrap()
        );
        assert!(parse_time("06 Feb 2024 09:37:00").is_err());
    }

    #[test]
    fn test_parse_wake_time() {
        assert_eq!(
            parse_wake_time("01 Jan 2024 00:00:01\n").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 1)
                .unwrap()
        );
        assert!(parse_wake_time("31 Feb 2024 00:00:00").is_err());
    }

    #[test]
    fn test_armed_message() {
        let target = parse_wake_time("06 Feb 2024 09:37:00").unwrap();
        let schedule = WakeSchedule::pulse(target).unwrap();
        assert_eq!(
            armed_message(&schedule),
            "wake pulse armed at Tue 06 Feb 2024 09:36:57 and Tue 06 Feb 2024 09:37:00, shutting down"
        );
    }

    #[test]
    fn test_time_format_output() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 5)
            .unwrap()
            .and_hms_opt(9, 37, 0)
            .unwrap();
        assert_eq!(dt.format(TIME_FORMAT).to_string(), "Mon 05 Feb 2024 09:37:00");
    }
}
