//! `DateTime` conversion and register utilities for the MCP7940 RTC.
//!
//! This module provides the internal representation and conversion logic for the MCP7940's
//! timekeeping registers. It enables safe, validated conversion between the chip's BCD-encoded
//! registers and chrono's `NaiveDateTime`.
//!
//! # Register Model
//!
//! The MCP7940 stores date and time in 7 consecutive registers starting at `0x00`:
//! - Seconds, Minutes, Hours, Weekday, Date, Month, Year
//!
//! Several of those bytes share space with control and status flags (the oscillator start bit
//! in seconds, OSCRUN/PWRFAIL/VBATEN in weekday, LPYR in month), so every field is masked
//! before it is decoded.
//!
//! # Weekday numbering
//!
//! The weekday register is a free-running counter whose meaning is chosen by the user. This
//! driver always stores 1 = Monday through 7 = Sunday, on both the timekeeping and the alarm
//! registers.
//!
//! # Error Handling
//!
//! Conversion errors are reported via [`DateTimeError`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::bcd::{bcd_to_int, make_bcd};
use crate::{Date, Hours, Minutes, Month, Seconds, Weekday, Year};

pub(crate) const SECONDS_MASK: u8 = 0x7F;
pub(crate) const MINUTES_MASK: u8 = 0x7F;
pub(crate) const HOURS_MASK: u8 = 0x3F;
pub(crate) const WEEKDAY_MASK: u8 = 0x07;
pub(crate) const DATE_MASK: u8 = 0x3F;
pub(crate) const MONTH_MASK: u8 = 0x1F;

/// First year representable by the two-digit year register.
pub const EPOCH_YEAR: i32 = 2000;

/// Internal representation of the MCP7940 timekeeping registers.
///
/// Flag bits that share a byte with a time field (ST, OSCRUN, PWRFAIL, VBATEN, LPYR) are always
/// clear in values built by [`MCP7940DateTime::from_datetime`]; the driver merges the weekday
/// flags back in with a read-modify-write.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct MCP7940DateTime {
    seconds: Seconds,
    minutes: Minutes,
    hours: Hours,
    weekday: Weekday,
    date: Date,
    month: Month,
    year: Year,
}

impl MCP7940DateTime {
    fn convert_seconds(seconds: u32) -> Result<Seconds, DateTimeError> {
        let (ones, tens) = make_bcd(seconds, 59)?;
        let mut value = Seconds::default();
        value.set_seconds(ones);
        value.set_ten_seconds(tens);
        Ok(value)
    }

    fn convert_minutes(minutes: u32) -> Result<Minutes, DateTimeError> {
        let (ones, tens) = make_bcd(minutes, 59)?;
        let mut value = Minutes::default();
        value.set_minutes(ones);
        value.set_ten_minutes(tens);
        Ok(value)
    }

    pub(crate) fn convert_hours(hours: u32) -> Result<Hours, DateTimeError> {
        let (ones, tens) = make_bcd(hours, 23)?;
        let mut value = Hours::default();
        value.set_twelve_hour(false);
        value.set_hours(ones);
        value.set_ten_hours(tens);
        Ok(value)
    }

    fn convert_weekday(weekday: chrono::Weekday) -> Weekday {
        let mut value = Weekday::default();
        value.set_weekday(weekday_to_register(weekday));
        value
    }

    pub(crate) fn convert_date(date: u32) -> Result<Date, DateTimeError> {
        if date == 0 {
            return Err(DateTimeError::OutOfRange(0));
        }
        let (ones, tens) = make_bcd(date, 31)?;
        let mut value = Date::default();
        value.set_date(ones);
        value.set_ten_date(tens);
        Ok(value)
    }

    pub(crate) fn convert_month(month: u32) -> Result<Month, DateTimeError> {
        if month == 0 {
            return Err(DateTimeError::OutOfRange(0));
        }
        let (ones, tens) = make_bcd(month, 12)?;
        let mut value = Month::default();
        value.set_month(ones);
        value.set_ten_month(tens);
        Ok(value)
    }

    fn convert_year(year: i32) -> Result<Year, DateTimeError> {
        if year > 2099 {
            error!("Year {} is too late! must be before 2100", year);
            return Err(DateTimeError::YearNotBefore2100);
        }
        if year < EPOCH_YEAR {
            error!("Year {} is too early! must be greater than 1999", year);
            return Err(DateTimeError::YearNotAfter1999);
        }
        let offset = u32::try_from(year - EPOCH_YEAR).map_err(|_| DateTimeError::InvalidDateTime)?;
        let (ones, tens) = make_bcd(offset, 99)?;
        let mut value = Year::default();
        value.set_year(ones);
        value.set_ten_year(tens);
        Ok(value)
    }

    /// Encodes a `NaiveDateTime` into register values, 24-hour mode, weekday 1 = Monday.
    pub(crate) fn from_datetime(datetime: &NaiveDateTime) -> Result<Self, DateTimeError> {
        let raw = MCP7940DateTime {
            seconds: Self::convert_seconds(datetime.second())?,
            minutes: Self::convert_minutes(datetime.minute())?,
            hours: Self::convert_hours(datetime.hour())?,
            weekday: Self::convert_weekday(datetime.weekday()),
            date: Self::convert_date(datetime.day())?,
            month: Self::convert_month(datetime.month())?,
            year: Self::convert_year(datetime.year())?,
        };

        debug!("raw={:?}", raw);

        Ok(raw)
    }

    /// Decodes the register values, ignoring any flag bits.
    pub(crate) fn into_datetime(self) -> Result<NaiveDateTime, DateTimeError> {
        let seconds = bcd_to_int(u8::from(self.seconds) & SECONDS_MASK);
        let minutes = bcd_to_int(u8::from(self.minutes) & MINUTES_MASK);
        let hours = bcd_to_int(u8::from(self.hours) & HOURS_MASK);
        let date = bcd_to_int(u8::from(self.date) & DATE_MASK);
        let month = bcd_to_int(u8::from(self.month) & MONTH_MASK);
        let year = EPOCH_YEAR + i32::from(bcd_to_int(u8::from(self.year)));
        debug!(
            "decoded {}-{}-{} {}:{}:{}",
            year, month, date, hours, minutes, seconds
        );

        NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(date))
            .and_then(|d| {
                d.and_hms_opt(u32::from(hours), u32::from(minutes), u32::from(seconds))
            })
            .ok_or(DateTimeError::InvalidDateTime)
    }

    pub(crate) fn seconds(&self) -> Seconds {
        self.seconds
    }

    pub(crate) fn minutes(&self) -> Minutes {
        self.minutes
    }

    pub(crate) fn hours(&self) -> Hours {
        self.hours
    }

    pub(crate) fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub(crate) fn date(&self) -> Date {
        self.date
    }

    pub(crate) fn month(&self) -> Month {
        self.month
    }

    pub(crate) fn year(&self) -> Year {
        self.year
    }
}

impl From<[u8; 7]> for MCP7940DateTime {
    fn from(data: [u8; 7]) -> Self {
        MCP7940DateTime {
            seconds: Seconds(data[0]),
            minutes: Minutes(data[1]),
            hours: Hours(data[2]),
            weekday: Weekday(data[3]),
            date: Date(data[4]),
            month: Month(data[5]),
            year: Year(data[6]),
        }
    }
}

impl From<&MCP7940DateTime> for [u8; 7] {
    fn from(dt: &MCP7940DateTime) -> [u8; 7] {
        [
            dt.seconds.0,
            dt.minutes.0,
            dt.hours.0,
            dt.weekday.0,
            dt.date.0,
            dt.month.0,
            dt.year.0,
        ]
    }
}

/// Converts a chrono weekday into the register value (1 = Monday ... 7 = Sunday).
#[must_use]
pub fn weekday_to_register(weekday: chrono::Weekday) -> u8 {
    // number_from_monday() is always 1..=7
    weekday.number_from_monday() as u8
}

/// Converts a weekday register value (1 = Monday ... 7 = Sunday) into a chrono weekday.
///
/// # Errors
///
/// Returns [`DateTimeError::InvalidDateTime`] for 0 or values above 7.
pub fn weekday_from_register(value: u8) -> Result<chrono::Weekday, DateTimeError> {
    match value {
        1 => Ok(chrono::Weekday::Mon),
        2 => Ok(chrono::Weekday::Tue),
        3 => Ok(chrono::Weekday::Wed),
        4 => Ok(chrono::Weekday::Thu),
        5 => Ok(chrono::Weekday::Fri),
        6 => Ok(chrono::Weekday::Sat),
        7 => Ok(chrono::Weekday::Sun),
        _ => Err(DateTimeError::InvalidDateTime),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur during MCP7940 date/time conversion or validation.
pub enum DateTimeError {
    /// A field value does not fit its two-digit BCD register
    OutOfRange(u8),
    /// The decoded registers do not form a valid calendar date/time
    InvalidDateTime,
    /// The year is not before 2100 (the MCP7940 only stores years 2000-2099)
    YearNotBefore2100,
    /// The year is not after 1999
    YearNotAfter1999,
}
