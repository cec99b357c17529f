//! Alarm configuration utilities for the MCP7940 RTC.
//!
//! The MCP7940 has two independent alarm comparators. Each owns a six-register block: seconds,
//! minutes, hours, a packed weekday/control register, date and month. Alarm 1's block sits 7
//! addresses above alarm 0's.
//!
//! # Alarm Types
//!
//! The 3-bit `ALMxMSK` field in the packed weekday register selects which fields must match:
//! - `Seconds` - Triggers when seconds match
//! - `Minutes` - Triggers when minutes match
//! - `Hours` - Triggers when hours match
//! - `Weekday` - Triggers when the day of week matches
//! - `Date` - Triggers when the date of month matches
//! - `All` - Triggers when seconds, minutes, hours, weekday, date and month all match
//!
//! Mask values 5 and 6 are undefined on the chip and rejected with
//! [`AlarmError::InvalidAlarmType`].
//!
//! # Packed control register
//!
//! ```text
//! bit 7    ALMPOL   output polarity (writable in alarm 0 only)
//! bit 6:4  ALMxMSK  alarm type
//! bit 3    ALMxIF   interrupt flag
//! bit 2:0  WKDAY    weekday to match (1 = Monday)
//! ```

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::{
    bcd::{bcd_to_int, make_bcd},
    datetime::{
        weekday_to_register, DateTimeError, MCP7940DateTime, DATE_MASK, HOURS_MASK, MINUTES_MASK,
        MONTH_MASK, SECONDS_MASK, WEEKDAY_MASK,
    },
    AlarmPolarity, AlarmWeekday, Date, Hours, Minutes, Month, RegAddr, Seconds,
};

/// Error type for alarm configuration operations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmError {
    /// Alarm slot number is not 0 or 1
    InvalidSlot(u8),
    /// Alarm type is above 7 or one of the undefined values 5 and 6
    InvalidAlarmType(u8),
    /// A match field is out of range
    InvalidMatch(&'static str),
    /// `DateTime` conversion error
    DateTime(DateTimeError),
}

impl From<DateTimeError> for AlarmError {
    fn from(e: DateTimeError) -> Self {
        AlarmError::DateTime(e)
    }
}

/// One of the two alarm comparators.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmSlot {
    /// Alarm 0, registers `0x0A..=0x0F`
    Alarm0 = 0,
    /// Alarm 1, registers `0x11..=0x16`
    Alarm1 = 1,
}

impl TryFrom<u8> for AlarmSlot {
    type Error = AlarmError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AlarmSlot::Alarm0),
            1 => Ok(AlarmSlot::Alarm1),
            _ => Err(AlarmError::InvalidSlot(v)),
        }
    }
}

impl From<AlarmSlot> for u8 {
    fn from(v: AlarmSlot) -> Self {
        v as u8
    }
}

/// Register addresses of one alarm block.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AlarmRegisters {
    /// ALMxSEC
    pub seconds: RegAddr,
    /// ALMxMIN
    pub minutes: RegAddr,
    /// ALMxHOUR
    pub hours: RegAddr,
    /// ALMxWKDAY
    pub weekday: RegAddr,
    /// ALMxDATE
    pub date: RegAddr,
    /// ALMxMTH
    pub month: RegAddr,
}

const ALARM0_REGISTERS: AlarmRegisters = AlarmRegisters {
    seconds: RegAddr::Alarm0Seconds,
    minutes: RegAddr::Alarm0Minutes,
    hours: RegAddr::Alarm0Hours,
    weekday: RegAddr::Alarm0Weekday,
    date: RegAddr::Alarm0Date,
    month: RegAddr::Alarm0Month,
};

const ALARM1_REGISTERS: AlarmRegisters = AlarmRegisters {
    seconds: RegAddr::Alarm1Seconds,
    minutes: RegAddr::Alarm1Minutes,
    hours: RegAddr::Alarm1Hours,
    weekday: RegAddr::Alarm1Weekday,
    date: RegAddr::Alarm1Date,
    month: RegAddr::Alarm1Month,
};

impl AlarmSlot {
    /// Both slots, in register order.
    pub const ALL: [AlarmSlot; 2] = [AlarmSlot::Alarm0, AlarmSlot::Alarm1];

    /// Returns the register block owned by this slot.
    #[must_use]
    pub const fn registers(self) -> &'static AlarmRegisters {
        match self {
            AlarmSlot::Alarm0 => &ALARM0_REGISTERS,
            AlarmSlot::Alarm1 => &ALARM1_REGISTERS,
        }
    }
}

/// Alarm mask (`ALMxMSK`), selecting which fields must match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmType {
    /// Seconds match
    Seconds = 0b000,
    /// Minutes match
    Minutes = 0b001,
    /// Hours match
    Hours = 0b010,
    /// Day of week match
    Weekday = 0b011,
    /// Date of month match
    Date = 0b100,
    /// Seconds, minutes, hours, weekday, date and month match
    All = 0b111,
}

impl TryFrom<u8> for AlarmType {
    type Error = AlarmError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0b000 => Ok(AlarmType::Seconds),
            0b001 => Ok(AlarmType::Minutes),
            0b010 => Ok(AlarmType::Hours),
            0b011 => Ok(AlarmType::Weekday),
            0b100 => Ok(AlarmType::Date),
            0b111 => Ok(AlarmType::All),
            _ => Err(AlarmError::InvalidAlarmType(v)),
        }
    }
}

impl From<AlarmType> for u8 {
    fn from(v: AlarmType) -> Self {
        v as u8
    }
}

/// State of the multifunction output pin (MFP).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MfpState {
    /// Static output, driven low
    Low,
    /// Static output, driven high
    High,
    /// Driven by one or both alarm comparators
    Alarm,
    /// Driven by the square wave generator
    SquareWave,
}

/// Alarm match pattern.
///
/// Every field is always written to the chip; [`AlarmType`] decides which of them take part in
/// the comparison. `weekday` uses 1 = Monday ... 7 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmConfig {
    /// Which fields must match
    pub alarm_type: AlarmType,
    /// Seconds value (0-59)
    pub seconds: u8,
    /// Minutes value (0-59)
    pub minutes: u8,
    /// Hours value (0-23)
    pub hours: u8,
    /// Day of week (1-7, where 1=Monday)
    pub weekday: u8,
    /// Date of month (1-31)
    pub date: u8,
    /// Month (1-12)
    pub month: u8,
}

impl AlarmConfig {
    /// Builds a match pattern from a calendar date/time. The year is ignored, the chip has no
    /// alarm year register.
    #[must_use]
    pub fn from_datetime(alarm_type: AlarmType, datetime: &NaiveDateTime) -> Self {
        // chrono keeps every component below 60, so the narrowing casts are lossless
        Self {
            alarm_type,
            seconds: datetime.second() as u8,
            minutes: datetime.minute() as u8,
            hours: datetime.hour() as u8,
            weekday: weekday_to_register(datetime.weekday()),
            date: datetime.day() as u8,
            month: datetime.month() as u8,
        }
    }

    /// Validates the alarm configuration and returns any errors.
    ///
    /// # Errors
    ///
    /// Returns an error if any match field is out of valid range.
    pub fn validate(&self) -> Result<(), AlarmError> {
        if self.seconds > 59 {
            return Err(AlarmError::InvalidMatch("seconds must be 0-59"));
        }
        if self.minutes > 59 {
            return Err(AlarmError::InvalidMatch("minutes must be 0-59"));
        }
        if self.hours > 23 {
            return Err(AlarmError::InvalidMatch("hours must be 0-23"));
        }
        if self.weekday == 0 || self.weekday > 7 {
            return Err(AlarmError::InvalidMatch("weekday must be 1-7"));
        }
        if self.date == 0 || self.date > 31 {
            return Err(AlarmError::InvalidMatch("date must be 1-31"));
        }
        if self.month == 0 || self.month > 12 {
            return Err(AlarmError::InvalidMatch("month must be 1-12"));
        }
        Ok(())
    }
}

/// Decoded state of one alarm slot.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm {
    /// Match pattern currently programmed
    pub config: AlarmConfig,
    /// `ALMxIF`, set once the alarm has fired
    pub interrupt_flag: bool,
    /// `ALMPOL` as seen from this slot's register
    pub polarity: AlarmPolarity,
    /// `ALMxEN` in the control register
    pub enabled: bool,
}

/// Internal representation of one MCP7940 alarm register block.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MCP7940Alarm {
    seconds: Seconds,
    minutes: Minutes,
    hours: Hours,
    weekday: AlarmWeekday,
    date: Date,
    month: Month,
}

impl MCP7940Alarm {
    /// Creates alarm register values from an `AlarmConfig`.
    ///
    /// The interrupt flag and polarity bits of the weekday register are left clear; use
    /// [`MCP7940Alarm::merge_weekday`] to carry them over from the chip.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or contains out-of-range values.
    pub fn from_config(config: &AlarmConfig) -> Result<Self, AlarmError> {
        config.validate()?;

        let (sec_ones, sec_tens) = make_bcd(u32::from(config.seconds), 59)?;
        let mut seconds = Seconds::default();
        seconds.set_seconds(sec_ones);
        seconds.set_ten_seconds(sec_tens);

        let (min_ones, min_tens) = make_bcd(u32::from(config.minutes), 59)?;
        let mut minutes = Minutes::default();
        minutes.set_minutes(min_ones);
        minutes.set_ten_minutes(min_tens);

        let hours = MCP7940DateTime::convert_hours(u32::from(config.hours))?;

        let mut weekday = AlarmWeekday::default();
        weekday.set_alarm_mask(u8::from(config.alarm_type));
        weekday.set_weekday(config.weekday);

        Ok(Self {
            seconds,
            minutes,
            hours,
            weekday,
            date: MCP7940DateTime::convert_date(u32::from(config.date))?,
            month: MCP7940DateTime::convert_month(u32::from(config.month))?,
        })
    }

    /// Converts the register values back to an `AlarmConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError::InvalidAlarmType`] when the mask holds an undefined value, or
    /// [`AlarmError::InvalidMatch`] when a decoded field is out of range.
    pub fn to_config(&self) -> Result<AlarmConfig, AlarmError> {
        let config = AlarmConfig {
            alarm_type: AlarmType::try_from(self.weekday.alarm_mask())?,
            seconds: bcd_to_int(u8::from(self.seconds) & SECONDS_MASK),
            minutes: bcd_to_int(u8::from(self.minutes) & MINUTES_MASK),
            hours: bcd_to_int(u8::from(self.hours) & HOURS_MASK),
            weekday: u8::from(self.weekday) & WEEKDAY_MASK,
            date: bcd_to_int(u8::from(self.date) & DATE_MASK),
            month: bcd_to_int(u8::from(self.month) & MONTH_MASK),
        };
        config.validate()?;
        Ok(config)
    }

    /// Combines the new alarm type and weekday with the interrupt flag and polarity bits of the
    /// register currently on the chip.
    #[must_use]
    pub fn merge_weekday(&self, current: AlarmWeekday) -> AlarmWeekday {
        let mut merged = self.weekday;
        merged.set_interrupt_flag(current.interrupt_flag());
        merged.set_polarity(current.polarity());
        merged
    }

    /// Gets the alarm seconds register
    #[must_use]
    pub fn seconds(&self) -> Seconds {
        self.seconds
    }

    /// Gets the alarm minutes register
    #[must_use]
    pub fn minutes(&self) -> Minutes {
        self.minutes
    }

    /// Gets the alarm hours register
    #[must_use]
    pub fn hours(&self) -> Hours {
        self.hours
    }

    /// Gets the alarm weekday register
    #[must_use]
    pub fn weekday(&self) -> AlarmWeekday {
        self.weekday
    }

    /// Gets the alarm date register
    #[must_use]
    pub fn date(&self) -> Date {
        self.date
    }

    /// Gets the alarm month register
    #[must_use]
    pub fn month(&self) -> Month {
        self.month
    }
}

impl From<[u8; 6]> for MCP7940Alarm {
    fn from(data: [u8; 6]) -> Self {
        MCP7940Alarm {
            seconds: Seconds(data[0]),
            minutes: Minutes(data[1]),
            hours: Hours(data[2]),
            weekday: AlarmWeekday(data[3]),
            date: Date(data[4]),
            month: Month(data[5]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(alarm_type: AlarmType) -> AlarmConfig {
        AlarmConfig {
            alarm_type,
            seconds: 57,
            minutes: 36,
            hours: 9,
            weekday: 2,
            date: 6,
            month: 2,
        }
    }

    #[test]
    fn test_alarm_slot_try_from() {
        assert_eq!(AlarmSlot::try_from(0).unwrap(), AlarmSlot::Alarm0);
        assert_eq!(AlarmSlot::try_from(1).unwrap(), AlarmSlot::Alarm1);
        assert_eq!(AlarmSlot::try_from(2), Err(AlarmError::InvalidSlot(2)));
        assert_eq!(AlarmSlot::try_from(255), Err(AlarmError::InvalidSlot(255)));
    }

    #[test]
    fn test_alarm_slot_register_blocks() {
        let alarm0 = AlarmSlot::Alarm0.registers();
        let alarm1 = AlarmSlot::Alarm1.registers();
        assert_eq!(alarm0.seconds as u8, 0x0A);
        assert_eq!(alarm0.weekday as u8, 0x0D);
        assert_eq!(alarm0.month as u8, 0x0F);
        // alarm 1 sits 7 registers above alarm 0
        assert_eq!(alarm1.seconds as u8, alarm0.seconds as u8 + 7);
        assert_eq!(alarm1.minutes as u8, alarm0.minutes as u8 + 7);
        assert_eq!(alarm1.hours as u8, alarm0.hours as u8 + 7);
        assert_eq!(alarm1.weekday as u8, alarm0.weekday as u8 + 7);
        assert_eq!(alarm1.date as u8, alarm0.date as u8 + 7);
        assert_eq!(alarm1.month as u8, alarm0.month as u8 + 7);
    }

    #[test]
    fn test_alarm_type_try_from() {
        for (raw, expected) in [
            (0, AlarmType::Seconds),
            (1, AlarmType::Minutes),
            (2, AlarmType::Hours),
            (3, AlarmType::Weekday),
            (4, AlarmType::Date),
            (7, AlarmType::All),
        ] {
            assert_eq!(AlarmType::try_from(raw).unwrap(), expected);
            assert_eq!(u8::from(expected), raw);
        }
        assert_eq!(AlarmType::try_from(5), Err(AlarmError::InvalidAlarmType(5)));
        assert_eq!(AlarmType::try_from(6), Err(AlarmError::InvalidAlarmType(6)));
        assert_eq!(AlarmType::try_from(8), Err(AlarmError::InvalidAlarmType(8)));
    }

    #[test]
    fn test_config_from_datetime() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 6)
            .unwrap()
            .and_hms_opt(9, 36, 57)
            .unwrap();
        assert_eq!(
            AlarmConfig::from_datetime(AlarmType::All, &dt),
            config(AlarmType::All)
        );
    }

    #[test]
    fn test_from_config_register_values() {
        let alarm = MCP7940Alarm::from_config(&config(AlarmType::All)).unwrap();
        assert_eq!(u8::from(alarm.seconds()), 0x57);
        assert_eq!(u8::from(alarm.minutes()), 0x36);
        assert_eq!(u8::from(alarm.hours()), 0x09);
        assert_eq!(u8::from(alarm.weekday()), 0b0111_0010);
        assert_eq!(u8::from(alarm.date()), 0x06);
        assert_eq!(u8::from(alarm.month()), 0x02);
    }

    #[test]
    fn test_to_config_round_trip() {
        for alarm_type in [
            AlarmType::Seconds,
            AlarmType::Minutes,
            AlarmType::Hours,
            AlarmType::Weekday,
            AlarmType::Date,
            AlarmType::All,
        ] {
            let expected = config(alarm_type);
            let alarm = MCP7940Alarm::from_config(&expected).unwrap();
            assert_eq!(alarm.to_config().unwrap(), expected);
        }
    }

    #[test]
    fn test_to_config_ignores_flag_bits() {
        // ALMPOL and ALM0IF set, mask 0b100, weekday 3
        let alarm = MCP7940Alarm::from([0x30, 0x15, 0x23, 0b1100_1011, 0x31, 0x12]);
        let config = alarm.to_config().unwrap();
        assert_eq!(config.alarm_type, AlarmType::Date);
        assert_eq!(config.seconds, 30);
        assert_eq!(config.minutes, 15);
        assert_eq!(config.hours, 23);
        assert_eq!(config.weekday, 3);
        assert_eq!(config.date, 31);
        assert_eq!(config.month, 12);
    }

    #[test]
    fn test_to_config_undefined_mask() {
        let alarm = MCP7940Alarm::from([0x00, 0x00, 0x00, 0b0101_0001, 0x01, 0x01]);
        assert_eq!(alarm.to_config(), Err(AlarmError::InvalidAlarmType(5)));
        let alarm = MCP7940Alarm::from([0x00, 0x00, 0x00, 0b0110_0001, 0x01, 0x01]);
        assert_eq!(alarm.to_config(), Err(AlarmError::InvalidAlarmType(6)));
    }

    #[test]
    fn test_to_config_unprogrammed_registers() {
        // power-on reset value: weekday 0, date 0, month 0
        let alarm = MCP7940Alarm::from([0; 6]);
        assert!(matches!(
            alarm.to_config(),
            Err(AlarmError::InvalidMatch(_))
        ));
    }

    #[test]
    fn test_merge_weekday_keeps_flag_and_polarity() {
        let alarm = MCP7940Alarm::from_config(&config(AlarmType::All)).unwrap();
        // chip holds ALMPOL=1, IF=1, mask 0, weekday 5
        let merged = alarm.merge_weekday(AlarmWeekday(0b1000_1101));
        assert_eq!(u8::from(merged), 0b1111_1010);

        let merged = alarm.merge_weekday(AlarmWeekday(0b0000_0000));
        assert_eq!(u8::from(merged), 0b0111_0010);
    }

    #[test]
    fn test_validation_errors() {
        let mut bad = config(AlarmType::All);
        bad.seconds = 60;
        assert_eq!(
            bad.validate(),
            Err(AlarmError::InvalidMatch("seconds must be 0-59"))
        );

        let mut bad = config(AlarmType::All);
        bad.minutes = 60;
        assert_eq!(
            bad.validate(),
            Err(AlarmError::InvalidMatch("minutes must be 0-59"))
        );

        let mut bad = config(AlarmType::All);
        bad.hours = 24;
        assert_eq!(
            bad.validate(),
            Err(AlarmError::InvalidMatch("hours must be 0-23"))
        );

        let mut bad = config(AlarmType::All);
        bad.weekday = 0;
        assert_eq!(
            bad.validate(),
            Err(AlarmError::InvalidMatch("weekday must be 1-7"))
        );

        let mut bad = config(AlarmType::All);
        bad.date = 32;
        assert_eq!(
            bad.validate(),
            Err(AlarmError::InvalidMatch("date must be 1-31"))
        );

        let mut bad = config(AlarmType::All);
        bad.month = 13;
        assert_eq!(
            bad.validate(),
            Err(AlarmError::InvalidMatch("month must be 1-12"))
        );
        assert!(MCP7940Alarm::from_config(&bad).is_err());
    }

    #[test]
    fn test_alarm_error_from_datetime_error() {
        let err: AlarmError = DateTimeError::OutOfRange(100).into();
        assert_eq!(err, AlarmError::DateTime(DateTimeError::OutOfRange(100)));
    }
}
