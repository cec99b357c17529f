//! Wake scheduling on top of the two alarm comparators.
//!
//! A host that cuts its own power relies on the MFP pin to switch it back on. A single alarm
//! edge can be missed while the supply is still collapsing, so the wake is armed as a pulse:
//! alarm 0 fires [`PULSE_OFFSET_SECS`] seconds before the target and alarm 1 fires at the
//! target itself. Both match on every field ([`AlarmType::All`]).
//!
//! ```text
//!   pre_pulse          target
//!       |<--- 3 s --->|
//!   ALM0 fires     ALM1 fires
//! ```

use chrono::{NaiveDateTime, TimeDelta};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::alarm::{AlarmSlot, AlarmType};
use crate::datetime::DateTimeError;
use crate::{AlarmPolarity, MCP7940Error, MCP7940};

/// Seconds between the pre-pulse alarm and the target alarm.
pub const PULSE_OFFSET_SECS: i64 = 3;

/// The pair of alarm times making up one wake pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeSchedule {
    /// Alarm 0 match time
    pub pre_pulse: NaiveDateTime,
    /// Alarm 1 match time
    pub target: NaiveDateTime,
}

impl WakeSchedule {
    /// Derives the schedule for `target`, carrying across minute, hour, day, month and year
    /// boundaries.
    ///
    /// # Errors
    /// Returns [`DateTimeError::InvalidDateTime`] if the pre-pulse falls outside chrono's range.
    pub fn pulse(target: NaiveDateTime) -> Result<Self, DateTimeError> {
        let pre_pulse = TimeDelta::try_seconds(PULSE_OFFSET_SECS)
            .and_then(|offset| target.checked_sub_signed(offset))
            .ok_or(DateTimeError::InvalidDateTime)?;
        Ok(Self { pre_pulse, target })
    }
}

/// Something that can remove power from the host once the wake is armed.
pub trait PowerOff {
    /// Error reported when power cannot be removed
    type Error;

    /// Requests the power-off. Implementations may return if the shutdown is asynchronous.
    fn power_off(&mut self) -> Result<(), Self::Error>;
}

/// Error returned by [`MCP7940::sleep_until`].
#[derive(Debug)]
pub enum WakeError<I2CE, PE> {
    /// Arming the alarms failed, power was left on
    Rtc(MCP7940Error<I2CE>),
    /// The alarms are armed but power-off failed
    PowerOff(PE),
}

impl<I2CE: core::fmt::Debug, PE: core::fmt::Debug> core::fmt::Display for WakeError<I2CE, PE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WakeError::Rtc(e) => write!(f, "failed to arm wake alarms: {e}"),
            WakeError::PowerOff(e) => write!(f, "failed to power off: {e:?}"),
        }
    }
}

#[cfg(feature = "linux")]
impl<I2CE: core::fmt::Debug, PE: core::fmt::Debug> std::error::Error for WakeError<I2CE, PE> {}

impl<I2C: I2c, D: DelayNs> MCP7940<I2C, D> {
    /// Arms the wake pulse for `target`.
    ///
    /// Both interrupt flags are cleared, ALMPOL is set to [`AlarmPolarity::Low`], then alarm 0
    /// is programmed for the pre-pulse and alarm 1 for the target, both enabled. The first
    /// failure aborts the sequence.
    pub fn schedule_wake(
        &mut self,
        target: &NaiveDateTime,
    ) -> Result<WakeSchedule, MCP7940Error<I2C::Error>> {
        let schedule = WakeSchedule::pulse(*target).map_err(MCP7940Error::DateTime)?;

        for slot in AlarmSlot::ALL {
            self.clear_alarm_interrupt(slot)?;
        }
        self.set_alarm_polarity(AlarmPolarity::Low)?;
        self.set_alarm(AlarmSlot::Alarm0, AlarmType::All, &schedule.pre_pulse, true)?;
        self.set_alarm(AlarmSlot::Alarm1, AlarmType::All, &schedule.target, true)?;

        info!("MCP7940: wake pulse armed");
        Ok(schedule)
    }

    /// Arms the wake pulse for `target` and powers the host off.
    ///
    /// Power-off is only requested once both alarms are armed.
    pub fn sleep_until<P: PowerOff>(
        &mut self,
        target: &NaiveDateTime,
        power: &mut P,
    ) -> Result<WakeSchedule, WakeError<I2C::Error, P::Error>> {
        let schedule = self.schedule_wake(target).map_err(WakeError::Rtc)?;
        info!("MCP7940: powering off");
        power.power_off().map_err(WakeError::PowerOff)?;
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use crate::{OscillatorPolling, RegAddr, DEVICE_ADDRESS};
    use alloc::vec;
    use alloc::vec::Vec;
    use chrono::NaiveDate;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn read(reg: RegAddr, value: u8) -> I2cTrans {
        I2cTrans::write_read(DEVICE_ADDRESS, vec![reg as u8], vec![value])
    }

    fn write(reg: RegAddr, value: u8) -> I2cTrans {
        I2cTrans::write(DEVICE_ADDRESS, vec![reg as u8, value])
    }

    /// Bus traffic for arming Tuesday 2024-02-06 09:37:00 on a chip whose oscillator runs.
    fn schedule_transactions() -> Vec<I2cTrans> {
        vec![
            // clear both interrupt flags
            read(RegAddr::Alarm0Weekday, 0xF9),
            write(RegAddr::Alarm0Weekday, 0xF1),
            read(RegAddr::Alarm1Weekday, 0x79),
            write(RegAddr::Alarm1Weekday, 0x71),
            // ALMPOL = 0
            read(RegAddr::Alarm0Weekday, 0xF1),
            write(RegAddr::Alarm0Weekday, 0x71),
            // alarm 0 at 09:36:57
            read(RegAddr::Seconds, 0x80),
            read(RegAddr::Weekday, 0x28),
            read(RegAddr::Control, 0x30),
            write(RegAddr::Control, 0x20),
            read(RegAddr::Alarm0Weekday, 0x71),
            write(RegAddr::Alarm0Weekday, 0x72),
            write(RegAddr::Alarm0Seconds, 0x57),
            write(RegAddr::Alarm0Minutes, 0x36),
            write(RegAddr::Alarm0Hours, 0x09),
            write(RegAddr::Alarm0Date, 0x06),
            write(RegAddr::Alarm0Month, 0x02),
            read(RegAddr::Control, 0x20),
            write(RegAddr::Control, 0x30),
            // alarm 1 at 09:37:00
            read(RegAddr::Seconds, 0x80),
            read(RegAddr::Weekday, 0x28),
            read(RegAddr::Control, 0x30),
            write(RegAddr::Control, 0x10),
            read(RegAddr::Alarm1Weekday, 0x71),
            write(RegAddr::Alarm1Weekday, 0x72),
            write(RegAddr::Alarm1Seconds, 0x00),
            write(RegAddr::Alarm1Minutes, 0x37),
            write(RegAddr::Alarm1Hours, 0x09),
            write(RegAddr::Alarm1Date, 0x06),
            write(RegAddr::Alarm1Month, 0x02),
            read(RegAddr::Control, 0x10),
            write(RegAddr::Control, 0x30),
        ]
    }

    #[derive(Default)]
    struct FakePower {
        calls: usize,
        fail: bool,
    }

    impl PowerOff for FakePower {
        type Error = &'static str;

        fn power_off(&mut self) -> Result<(), Self::Error> {
            self.calls += 1;
            if self.fail {
                Err("shutdown refused")
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_pulse_within_minute() {
        let schedule = WakeSchedule::pulse(dt(2024, 2, 6, 9, 37, 0)).unwrap();
        assert_eq!(schedule.pre_pulse, dt(2024, 2, 6, 9, 36, 57));
        assert_eq!(schedule.target, dt(2024, 2, 6, 9, 37, 0));
    }

    #[test]
    fn test_pulse_carries_across_year() {
        let schedule = WakeSchedule::pulse(dt(2024, 1, 1, 0, 0, 1)).unwrap();
        assert_eq!(schedule.pre_pulse, dt(2023, 12, 31, 23, 59, 58));
    }

    #[test]
    fn test_pulse_carries_into_leap_day() {
        let schedule = WakeSchedule::pulse(dt(2024, 3, 1, 0, 0, 0)).unwrap();
        assert_eq!(schedule.pre_pulse, dt(2024, 2, 29, 23, 59, 57));
    }

    #[test]
    fn test_pulse_underflow() {
        assert_eq!(
            WakeSchedule::pulse(NaiveDateTime::MIN),
            Err(DateTimeError::InvalidDateTime)
        );
    }

    #[test]
    fn test_schedule_wake_sequence() {
        let mut dev = MCP7940::new(I2cMock::new(&schedule_transactions()), NoopDelay::new());
        let schedule = dev.schedule_wake(&dt(2024, 2, 6, 9, 37, 0)).unwrap();
        assert_eq!(schedule.pre_pulse, dt(2024, 2, 6, 9, 36, 57));
        dev.i2c.done();
    }

    #[test]
    fn test_sleep_until_powers_off_after_arming() {
        let mut dev = MCP7940::new(I2cMock::new(&schedule_transactions()), NoopDelay::new());
        let mut power = FakePower::default();
        dev.sleep_until(&dt(2024, 2, 6, 9, 37, 0), &mut power)
            .unwrap();
        assert_eq!(power.calls, 1);
        dev.i2c.done();
    }

    #[test]
    fn test_sleep_until_power_off_failure() {
        let mut dev = MCP7940::new(I2cMock::new(&schedule_transactions()), NoopDelay::new());
        let mut power = FakePower {
            calls: 0,
            fail: true,
        };
        assert!(matches!(
            dev.sleep_until(&dt(2024, 2, 6, 9, 37, 0), &mut power),
            Err(WakeError::PowerOff("shutdown refused"))
        ));
        assert_eq!(power.calls, 1);
        dev.i2c.done();
    }

    #[test]
    fn test_sleep_until_keeps_power_when_arming_fails() {
        let mut dev = MCP7940::new(
            I2cMock::new(&[
                read(RegAddr::Alarm0Weekday, 0x00),
                write(RegAddr::Alarm0Weekday, 0x00),
                read(RegAddr::Alarm1Weekday, 0x00),
                write(RegAddr::Alarm1Weekday, 0x00),
                read(RegAddr::Alarm0Weekday, 0x00),
                write(RegAddr::Alarm0Weekday, 0x00),
                // oscillator never starts
                read(RegAddr::Seconds, 0x00),
                write(RegAddr::Seconds, 0x80),
                read(RegAddr::Weekday, 0x00),
                read(RegAddr::Weekday, 0x00),
            ]),
            NoopDelay::new(),
        )
        .with_polling(OscillatorPolling {
            attempts: 2,
            interval_ms: 1000,
        });
        let mut power = FakePower::default();
        assert!(matches!(
            dev.sleep_until(&dt(2024, 2, 6, 9, 37, 0), &mut power),
            Err(WakeError::Rtc(MCP7940Error::OscillatorStart))
        ));
        assert_eq!(power.calls, 0);
        dev.i2c.done();
    }
}
