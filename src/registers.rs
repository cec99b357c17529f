//! Register definitions and bitfield structures for the MCP7940 RTC.
//!
//! This module contains all register addresses, bitfield definitions, and
//! related types for interacting with the MCP7940 Real-Time Clock registers.

use bitfield::bitfield;

/// Fixed 7-bit I2C address of the MCP7940 RTCC block.
pub const DEVICE_ADDRESS: u8 = 0x6F;

/// Register addresses for the MCP7940 RTC.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register (0-59) and oscillator start bit
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (0-23)
    Hours = 0x02,
    /// Weekday register (1-7) with oscillator, power-fail and battery flags
    Weekday = 0x03,
    /// Date register (1-31)
    Date = 0x04,
    /// Month register (1-12) with leap year flag
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
    /// Control register
    Control = 0x07,
    /// Oscillator digital trim register
    OscTrim = 0x08,
    /// Alarm 0 seconds register
    Alarm0Seconds = 0x0A,
    /// Alarm 0 minutes register
    Alarm0Minutes = 0x0B,
    /// Alarm 0 hours register
    Alarm0Hours = 0x0C,
    /// Alarm 0 weekday, mask, interrupt flag and polarity register
    Alarm0Weekday = 0x0D,
    /// Alarm 0 date register
    Alarm0Date = 0x0E,
    /// Alarm 0 month register
    Alarm0Month = 0x0F,
    /// Alarm 1 seconds register
    Alarm1Seconds = 0x11,
    /// Alarm 1 minutes register
    Alarm1Minutes = 0x12,
    /// Alarm 1 hours register
    Alarm1Hours = 0x13,
    /// Alarm 1 weekday, mask and interrupt flag register
    Alarm1Weekday = 0x14,
    /// Alarm 1 date register
    Alarm1Date = 0x15,
    /// Alarm 1 month register
    Alarm1Month = 0x16,
    /// Power-down timestamp minutes
    PowerDownMinutes = 0x18,
    /// Power-down timestamp hours
    PowerDownHours = 0x19,
    /// Power-down timestamp date
    PowerDownDate = 0x1A,
    /// Power-down timestamp weekday and month
    PowerDownMonth = 0x1B,
    /// Power-up timestamp minutes
    PowerUpMinutes = 0x1C,
    /// Power-up timestamp hours
    PowerUpHours = 0x1D,
    /// Power-up timestamp date
    PowerUpDate = 0x1E,
    /// Power-up timestamp weekday and month
    PowerUpMonth = 0x1F,
}

/// Square wave output frequency options (SQWFS bits).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SquareWaveFrequency {
    /// 1 Hz square wave output
    Hz1 = 0b00,
    /// 4.096 kHz square wave output
    Hz4096 = 0b01,
    /// 8.192 kHz square wave output
    Hz8192 = 0b10,
    /// 32.768 kHz square wave output
    Hz32768 = 0b11,
}
impl From<u8> for SquareWaveFrequency {
    /// Creates a `SquareWaveFrequency` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0b00, 0b01, 0b10, or 0b11.
    fn from(v: u8) -> Self {
        match v {
            0b00 => SquareWaveFrequency::Hz1,
            0b01 => SquareWaveFrequency::Hz4096,
            0b10 => SquareWaveFrequency::Hz8192,
            0b11 => SquareWaveFrequency::Hz32768,
            _ => panic!("Invalid value for SquareWaveFrequency: {}", v),
        }
    }
}
impl From<SquareWaveFrequency> for u8 {
    /// Converts a `SquareWaveFrequency` to its raw register value.
    fn from(v: SquareWaveFrequency) -> Self {
        v as u8
    }
}

/// Alarm output polarity (ALMPOL bit).
///
/// Only `ALM0WKDAY` holds a writable copy; the bit in `ALM1WKDAY` mirrors it.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmPolarity {
    /// ALMPOL = 0, asserted alarm output is a logic low
    Low = 0,
    /// ALMPOL = 1, asserted alarm output is a logic high
    High = 1,
}
impl From<u8> for AlarmPolarity {
    /// Creates an `AlarmPolarity` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => AlarmPolarity::Low,
            1 => AlarmPolarity::High,
            _ => panic!("Invalid value for AlarmPolarity: {}", v),
        }
    }
}
impl From<AlarmPolarity> for u8 {
    /// Converts an `AlarmPolarity` to its raw register value.
    fn from(v: AlarmPolarity) -> Self {
        v as u8
    }
}

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Seconds register (0-59) with BCD encoding and the oscillator start bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Seconds(u8);
    impl Debug;
    /// Start oscillator (ST)
    pub start_oscillator, set_start_oscillator: 7;
    /// Tens place of seconds (0-5)
    pub ten_seconds, set_ten_seconds: 6, 4;
    /// Ones place of seconds (0-9)
    pub seconds, set_seconds: 3, 0;
}
from_register_u8!(Seconds);

#[cfg(feature = "defmt")]
impl defmt::Format for Seconds {
    fn format(&self, f: defmt::Formatter) {
        let seconds = 10 * self.ten_seconds() + self.seconds();
        defmt::write!(f, "Seconds({}s", seconds);
        if self.start_oscillator() {
            defmt::write!(f, ", ST");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Minutes register (0-59) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Minutes(u8);
    impl Debug;
    /// Tens place of minutes (0-5)
    pub ten_minutes, set_ten_minutes: 6, 4;
    /// Ones place of minutes (0-9)
    pub minutes, set_minutes: 3, 0;
}
from_register_u8!(Minutes);

#[cfg(feature = "defmt")]
impl defmt::Format for Minutes {
    fn format(&self, f: defmt::Formatter) {
        let minutes = 10 * self.ten_minutes() + self.minutes();
        defmt::write!(f, "Minutes({}m)", minutes);
    }
}

bitfield! {
    /// Hours register with BCD encoding. The driver always runs in 24-hour mode.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Hours(u8);
    impl Debug;
    /// 12-hour mode select (12/24)
    pub twelve_hour, set_twelve_hour: 6;
    /// Tens place of hours (0-2)
    pub ten_hours, set_ten_hours: 5, 4;
    /// Ones place of hours (0-9)
    pub hours, set_hours: 3, 0;
}
from_register_u8!(Hours);

#[cfg(feature = "defmt")]
impl defmt::Format for Hours {
    fn format(&self, f: defmt::Formatter) {
        let hours = 10 * self.ten_hours() + self.hours();
        if self.twelve_hour() {
            defmt::write!(f, "Hours({}h 12h)", hours);
        } else {
            defmt::write!(f, "Hours({}h)", hours);
        }
    }
}

bitfield! {
    /// Weekday register (1-7, 1 = Monday) sharing its byte with status flags.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Weekday(u8);
    impl Debug;
    /// Oscillator running (OSCRUN), read-only
    pub oscillator_running, set_oscillator_running: 5;
    /// Power failure latched (PWRFAIL)
    pub power_fail, set_power_fail: 4;
    /// Battery backup supply enable (VBATEN)
    pub battery_enable, set_battery_enable: 3;
    /// Day of week (1-7)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(Weekday);

#[cfg(feature = "defmt")]
impl defmt::Format for Weekday {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Weekday({}", self.weekday());
        if self.oscillator_running() {
            defmt::write!(f, ", OSCRUN");
        }
        if self.power_fail() {
            defmt::write!(f, ", PWRFAIL");
        }
        if self.battery_enable() {
            defmt::write!(f, ", VBATEN");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Date register (1-31) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Date(u8);
    impl Debug;
    /// Tens place of date (0-3)
    pub ten_date, set_ten_date: 5, 4;
    /// Ones place of date (0-9)
    pub date, set_date: 3, 0;
}
from_register_u8!(Date);

#[cfg(feature = "defmt")]
impl defmt::Format for Date {
    fn format(&self, f: defmt::Formatter) {
        let date = 10 * self.ten_date() + self.date();
        defmt::write!(f, "Date({})", date);
    }
}

bitfield! {
    /// Month register (1-12) with leap year flag and BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Month(u8);
    impl Debug;
    /// Leap year (LPYR), read-only
    pub leap_year, set_leap_year: 5;
    /// Tens place of month (0-1)
    pub ten_month, set_ten_month: 4, 4;
    /// Ones place of month (0-9)
    pub month, set_month: 3, 0;
}
from_register_u8!(Month);

#[cfg(feature = "defmt")]
impl defmt::Format for Month {
    fn format(&self, f: defmt::Formatter) {
        let month = 10 * self.ten_month() + self.month();
        defmt::write!(f, "Month({}", month);
        if self.leap_year() {
            defmt::write!(f, ", leap year");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Year register (0-99, offset from 2000) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Year(u8);
    impl Debug;
    /// Tens place of year (0-9)
    pub ten_year, set_ten_year: 7, 4;
    /// Ones place of year (0-9)
    pub year, set_year: 3, 0;
}
from_register_u8!(Year);

#[cfg(feature = "defmt")]
impl defmt::Format for Year {
    fn format(&self, f: defmt::Formatter) {
        let year = 10 * self.ten_year() + self.year();
        defmt::write!(f, "Year({})", year);
    }
}

bitfield! {
    /// Control register for output pin, alarms and oscillator source.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Control(u8);
    impl Debug;
    /// Static MFP output level when no alarm or square wave drives it (OUT)
    pub output, set_output: 7;
    /// Square wave output enable (SQWEN)
    pub square_wave_enable, set_square_wave_enable: 6;
    /// Alarm 1 module enable (ALM1EN)
    pub alarm1_enable, set_alarm1_enable: 5;
    /// Alarm 0 module enable (ALM0EN)
    pub alarm0_enable, set_alarm0_enable: 4;
    /// External 32.768 kHz clock input (EXTOSC)
    pub external_oscillator, set_external_oscillator: 3;
    /// Coarse trim mode (CRSTRIM)
    pub coarse_trim, set_coarse_trim: 2;
    /// Square wave frequency select (SQWFS)
    pub from into SquareWaveFrequency, square_wave_frequency, set_square_wave_frequency: 1, 0;
}
from_register_u8!(Control);

#[cfg(feature = "defmt")]
impl defmt::Format for Control {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Control(OUT={}", u8::from(self.output()));
        if self.square_wave_enable() {
            defmt::write!(f, ", SQWEN {}", self.square_wave_frequency());
        }
        if self.alarm0_enable() {
            defmt::write!(f, ", ALM0EN");
        }
        if self.alarm1_enable() {
            defmt::write!(f, ", ALM1EN");
        }
        if self.external_oscillator() {
            defmt::write!(f, ", EXTOSC");
        }
        if self.coarse_trim() {
            defmt::write!(f, ", CRSTRIM");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Oscillator digital trim register, sign and magnitude.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct OscTrim(u8);
    impl Debug;
    /// Trim sign (SIGN)
    pub sign, set_sign: 7;
    /// Trim magnitude (0-127)
    pub trim, set_trim: 6, 0;
}
from_register_u8!(OscTrim);

#[cfg(feature = "defmt")]
impl defmt::Format for OscTrim {
    fn format(&self, f: defmt::Formatter) {
        let sign = if self.sign() { "-" } else { "+" };
        defmt::write!(f, "OscTrim({}{})", sign, self.trim());
    }
}

bitfield! {
    /// Alarm weekday register: match weekday, interrupt flag, alarm mask and polarity.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct AlarmWeekday(u8);
    impl Debug;
    /// Alarm output polarity (ALMPOL), writable in alarm 0 only
    pub from into AlarmPolarity, polarity, set_polarity: 7, 7;
    /// Alarm mask (ALMxMSK), see [`crate::alarm::AlarmType`]
    pub alarm_mask, set_alarm_mask: 6, 4;
    /// Alarm interrupt flag (ALMxIF)
    pub interrupt_flag, set_interrupt_flag: 3;
    /// Day of week to match (1-7)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(AlarmWeekday);

#[cfg(feature = "defmt")]
impl defmt::Format for AlarmWeekday {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "AlarmWeekday(day {}, mask {}, {}",
            self.weekday(),
            self.alarm_mask(),
            self.polarity()
        );
        if self.interrupt_flag() {
            defmt::write!(f, ", IF");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Power-fail timestamp month register with the weekday in the upper bits.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct PowerMonth(u8);
    impl Debug;
    /// Day of week (1-7)
    pub weekday, set_weekday: 7, 5;
    /// Tens place of month (0-1)
    pub ten_month, set_ten_month: 4, 4;
    /// Ones place of month (0-9)
    pub month, set_month: 3, 0;
}
from_register_u8!(PowerMonth);

#[cfg(feature = "defmt")]
impl defmt::Format for PowerMonth {
    fn format(&self, f: defmt::Formatter) {
        let month = 10 * self.ten_month() + self.month();
        defmt::write!(f, "PowerMonth({}, day {})", month, self.weekday());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_wave_frequency_conversions() {
        assert_eq!(SquareWaveFrequency::from(0b00), SquareWaveFrequency::Hz1);
        assert_eq!(SquareWaveFrequency::from(0b01), SquareWaveFrequency::Hz4096);
        assert_eq!(SquareWaveFrequency::from(0b10), SquareWaveFrequency::Hz8192);
        assert_eq!(
            SquareWaveFrequency::from(0b11),
            SquareWaveFrequency::Hz32768
        );
        assert_eq!(u8::from(SquareWaveFrequency::Hz32768), 0b11);
    }

    #[test]
    #[should_panic(expected = "Invalid value for SquareWaveFrequency: 4")]
    fn test_invalid_square_wave_frequency_conversion() {
        let _ = SquareWaveFrequency::from(4);
    }

    #[test]
    fn test_alarm_polarity_conversions() {
        assert_eq!(AlarmPolarity::from(0), AlarmPolarity::Low);
        assert_eq!(AlarmPolarity::from(1), AlarmPolarity::High);
        assert_eq!(u8::from(AlarmPolarity::High), 1);
    }

    #[test]
    #[should_panic(expected = "Invalid value for AlarmPolarity: 2")]
    fn test_invalid_alarm_polarity_conversion() {
        let _ = AlarmPolarity::from(2);
    }

    #[test]
    fn test_seconds_register_start_bit() {
        let seconds = Seconds::from(0xD9); // ST set, 59 seconds
        assert!(seconds.start_oscillator());
        assert_eq!(seconds.ten_seconds(), 5);
        assert_eq!(seconds.seconds(), 9);

        let mut seconds = Seconds::from(0x30);
        assert!(!seconds.start_oscillator());
        seconds.set_start_oscillator(true);
        assert_eq!(u8::from(seconds), 0xB0);
    }

    #[test]
    fn test_hours_register_conversions() {
        let hours = Hours::from(0x23);
        assert!(!hours.twelve_hour());
        assert_eq!(hours.ten_hours(), 2);
        assert_eq!(hours.hours(), 3);

        let hours = Hours::from(0x52); // 12-hour bit with 12
        assert!(hours.twelve_hour());
        assert_eq!(hours.ten_hours(), 1);
        assert_eq!(hours.hours(), 2);
    }

    #[test]
    fn test_weekday_register_flags() {
        let weekday = Weekday::from(0b0011_1010);
        assert!(weekday.oscillator_running());
        assert!(weekday.power_fail());
        assert!(weekday.battery_enable());
        assert_eq!(weekday.weekday(), 2);

        let mut weekday = Weekday::from(0b0010_1001);
        weekday.set_weekday(7);
        assert_eq!(u8::from(weekday), 0b0010_1111);
        assert!(weekday.oscillator_running());
        assert!(!weekday.power_fail());
    }

    #[test]
    fn test_month_register_leap_year() {
        let month = Month::from(0x22); // LPYR set, February
        assert!(month.leap_year());
        assert_eq!(month.ten_month(), 0);
        assert_eq!(month.month(), 2);

        let month = Month::from(0x12);
        assert!(!month.leap_year());
        assert_eq!(month.ten_month(), 1);
        assert_eq!(month.month(), 2);
    }

    #[test]
    fn test_control_register_fields() {
        let control = Control::from(0b1101_0011);
        assert!(control.output());
        assert!(control.square_wave_enable());
        assert!(!control.alarm1_enable());
        assert!(control.alarm0_enable());
        assert!(!control.external_oscillator());
        assert!(!control.coarse_trim());
        assert_eq!(
            control.square_wave_frequency(),
            SquareWaveFrequency::Hz32768
        );

        let mut control = Control::default();
        control.set_alarm1_enable(true);
        control.set_square_wave_frequency(SquareWaveFrequency::Hz4096);
        assert_eq!(u8::from(control), 0b0010_0001);
    }

    #[test]
    fn test_alarm_weekday_register_fields() {
        let reg = AlarmWeekday::from(0b1111_1010);
        assert_eq!(reg.polarity(), AlarmPolarity::High);
        assert_eq!(reg.alarm_mask(), 0b111);
        assert!(reg.interrupt_flag());
        assert_eq!(reg.weekday(), 2);

        let mut reg = AlarmWeekday::default();
        reg.set_alarm_mask(4);
        reg.set_weekday(5);
        reg.set_interrupt_flag(true);
        assert_eq!(u8::from(reg), 0b0100_1101);
    }

    #[test]
    fn test_osc_trim_register() {
        let mut trim = OscTrim::default();
        trim.set_sign(true);
        trim.set_trim(42);
        assert_eq!(u8::from(trim), 0x80 | 42);
        assert_eq!(OscTrim::from(0x7F).trim(), 127);
    }

    #[test]
    fn test_power_month_register() {
        let reg = PowerMonth::from(0b1101_0010); // weekday 6, month 12
        assert_eq!(reg.weekday(), 6);
        assert_eq!(reg.ten_month(), 1);
        assert_eq!(reg.month(), 2);
    }

    #[test]
    fn test_year_register_conversions() {
        let year = Year::from(0x24);
        assert_eq!(year.ten_year(), 2);
        assert_eq!(year.year(), 4);
        assert_eq!(u8::from(year), 0x24);
    }
}
