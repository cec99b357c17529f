//! A platform-agnostic driver for the MCP7940 battery-backed real-time clock.
//!
//! The driver talks to the chip through the `embedded-hal` [`I2c`] trait and covers:
//! - reading and setting the calendar time (BCD registers, 24-hour mode, years 2000-2099)
//! - starting and stopping the crystal oscillator with bounded polling
//! - programming the two alarm comparators and the multifunction output pin
//! - power-fail timestamps, battery backup and digital trim
//! - the dual-alarm wake pulse used to power a host back on (see [`wake`])
//!
//! An async version of the driver lives in [`asynch`] behind the `async` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp7940::{MCP7940, alarm::AlarmSlot};
//!
//! let mut rtc = MCP7940::new(i2c, delay);
//! rtc.start_oscillator()?;
//! let now = rtc.datetime()?;
//! rtc.clear_alarm_interrupt(AlarmSlot::Alarm0)?;
//! ```

#![no_std]

#[cfg(feature = "linux")]
extern crate std;

#[macro_use]
mod fmt;

pub mod alarm;
#[cfg(feature = "async")]
pub mod asynch;
pub mod bcd;
pub mod datetime;
#[cfg(feature = "linux")]
pub mod linux;
mod registers;
pub mod wake;

use chrono::NaiveDateTime;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use paste::paste;

use crate::alarm::{Alarm, AlarmConfig, AlarmError, AlarmSlot, AlarmType, MCP7940Alarm, MfpState};
use crate::bcd::bcd_to_int;
use crate::datetime::{
    weekday_from_register, DateTimeError, MCP7940DateTime, DATE_MASK, HOURS_MASK, MINUTES_MASK,
};
pub use crate::registers::*;

/// VBATEN, bit 3 of the weekday register.
pub(crate) const BATTERY_ENABLE_BIT: u8 = 3;
/// PWRFAIL, bit 4 of the weekday register.
pub(crate) const POWER_FAIL_BIT: u8 = 4;
/// ALMxIF, bit 3 of the alarm weekday registers.
pub(crate) const ALARM_INTERRUPT_BIT: u8 = 3;

/// Device configuration applied by [`MCP7940::configure`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Drive the MFP pin from the square wave generator (SQWEN)
    pub square_wave_enable: bool,
    /// Square wave frequency (SQWFS)
    pub square_wave_frequency: SquareWaveFrequency,
    /// Static MFP level when neither the alarms nor the square wave drive it (OUT)
    pub output: bool,
    /// Use an external 32.768 kHz clock instead of the crystal (EXTOSC)
    pub external_oscillator: bool,
    /// Keep timekeeping alive from VBAT when main power is lost (VBATEN)
    pub battery_backup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            square_wave_enable: false,
            square_wave_frequency: SquareWaveFrequency::Hz1,
            output: false,
            external_oscillator: false,
            battery_backup: true,
        }
    }
}

/// How long [`MCP7940::start_oscillator`] and [`MCP7940::stop_oscillator`] wait for OSCRUN.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OscillatorPolling {
    /// Number of OSCRUN reads before giving up; 0 is treated as 1
    pub attempts: u8,
    /// Delay between two reads, in milliseconds
    pub interval_ms: u32,
}

impl Default for OscillatorPolling {
    fn default() -> Self {
        Self {
            attempts: 255,
            interval_ms: 1000,
        }
    }
}

/// Oscillator state as reported by OSCRUN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscillatorState {
    /// OSCRUN clear
    Stopped,
    /// OSCRUN set
    Running,
}

impl From<bool> for OscillatorState {
    fn from(running: bool) -> Self {
        if running {
            OscillatorState::Running
        } else {
            OscillatorState::Stopped
        }
    }
}

/// Time stamp latched by the chip when main power goes down or comes back.
///
/// The chip records no seconds and no year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerTimestamp {
    /// Minute (0-59)
    pub minute: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Date of month (1-31)
    pub date: u8,
    /// Day of week (1-7, 1 = Monday)
    pub weekday: u8,
    /// Month (1-12)
    pub month: u8,
}

impl From<[u8; 4]> for PowerTimestamp {
    fn from(data: [u8; 4]) -> Self {
        let month = PowerMonth(data[3]);
        PowerTimestamp {
            minute: bcd_to_int(data[0] & MINUTES_MASK),
            hour: bcd_to_int(data[1] & HOURS_MASK),
            date: bcd_to_int(data[2] & DATE_MASK),
            weekday: month.weekday(),
            month: 10 * month.ten_month() + month.month(),
        }
    }
}

/// Error type for MCP7940 operations.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MCP7940Error<I2CE> {
    /// I2C bus error
    I2c(I2CE),
    /// Date/time value cannot be encoded or decoded
    DateTime(DateTimeError),
    /// Alarm slot, type or match pattern is invalid
    Alarm(AlarmError),
    /// OSCRUN did not set within the polling budget
    OscillatorStart,
    /// OSCRUN did not clear within the polling budget
    OscillatorStop,
    /// Trim value -128 has no sign-magnitude encoding
    InvalidTrim,
}

impl<I2CE> From<I2CE> for MCP7940Error<I2CE> {
    fn from(e: I2CE) -> Self {
        MCP7940Error::I2c(e)
    }
}

impl<I2CE: core::fmt::Debug> core::fmt::Display for MCP7940Error<I2CE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MCP7940Error::I2c(e) => write!(f, "i2c error: {e:?}"),
            MCP7940Error::DateTime(e) => write!(f, "date/time error: {e:?}"),
            MCP7940Error::Alarm(e) => write!(f, "alarm error: {e:?}"),
            MCP7940Error::OscillatorStart => write!(f, "oscillator did not start"),
            MCP7940Error::OscillatorStop => write!(f, "oscillator did not stop"),
            MCP7940Error::InvalidTrim => write!(f, "trim value out of range"),
        }
    }
}

#[cfg(feature = "linux")]
impl<I2CE: core::fmt::Debug> std::error::Error for MCP7940Error<I2CE> {}

/// MCP7940 Real-Time Clock driver.
///
/// Owns the I2C bus and a delay provider; [`MCP7940::release`] hands both back. The driver
/// keeps no copy of chip state, every call goes to the bus.
pub struct MCP7940<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    polling: OscillatorPolling,
}

impl<I2C: I2c, D: DelayNs> MCP7940<I2C, D> {
    /// Creates a new driver at the fixed address [`DEVICE_ADDRESS`].
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            address: DEVICE_ADDRESS,
            polling: OscillatorPolling::default(),
        }
    }

    /// Replaces the oscillator polling budget.
    #[must_use]
    pub fn with_polling(mut self, polling: OscillatorPolling) -> Self {
        self.polling = polling;
        self
    }

    /// Consumes the driver and returns the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Writes a single register.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::I2c`] if the bus transaction fails.
    pub fn write_register(
        &mut self,
        addr: RegAddr,
        value: u8,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        trace!("MCP7940: write {:?} <- {:#x}", addr, value);
        self.i2c.write(self.address, &[addr as u8, value])?;
        Ok(())
    }

    /// Reads `buf.len()` consecutive registers starting at `addr`.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::I2c`] if the bus transaction fails.
    pub fn read_registers(
        &mut self,
        addr: RegAddr,
        buf: &mut [u8],
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        self.i2c.write_read(self.address, &[addr as u8], buf)?;
        Ok(())
    }

    /// Reads a single register.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::I2c`] if the bus transaction fails.
    pub fn read_register(&mut self, addr: RegAddr) -> Result<u8, MCP7940Error<I2C::Error>> {
        let mut data = [0];
        self.read_registers(addr, &mut data)?;
        trace!("MCP7940: read {:?} -> {:#x}", addr, data[0]);
        Ok(data[0])
    }

    /// Sets one bit of a register with a read-modify-write.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::I2c`] if either bus transaction fails.
    pub fn set_register_bit(&mut self, addr: RegAddr, bit: u8) -> Result<(), MCP7940Error<I2C::Error>> {
        let value = self.read_register(addr)?;
        self.write_register(addr, value | (1 << bit))
    }

    /// Clears one bit of a register with a read-modify-write.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::I2c`] if either bus transaction fails.
    pub fn clear_register_bit(
        &mut self,
        addr: RegAddr,
        bit: u8,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let value = self.read_register(addr)?;
        self.write_register(addr, value & !(1 << bit))
    }

    /// Reads the current date and time.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::DateTime`] when the registers do not hold a valid date.
    pub fn datetime(&mut self) -> Result<NaiveDateTime, MCP7940Error<I2C::Error>> {
        let mut data = [0; 7];
        self.read_registers(RegAddr::Seconds, &mut data)?;
        MCP7940DateTime::from(data)
            .into_datetime()
            .map_err(MCP7940Error::DateTime)
    }

    /// Reads the weekday counter (1 = Monday).
    ///
    /// # Errors
    /// Returns [`MCP7940Error::DateTime`] when the counter holds 0, as it does after a cold start.
    pub fn weekday(&mut self) -> Result<chrono::Weekday, MCP7940Error<I2C::Error>> {
        let reg = self.weekday_register()?;
        weekday_from_register(reg.weekday()).map_err(MCP7940Error::DateTime)
    }

    /// Sets the date and time.
    ///
    /// The oscillator is stopped while the registers are written and restarted afterwards.
    /// The flag bits sharing the weekday register are preserved.
    ///
    /// # Errors
    /// Fails without touching the bus if the date cannot be stored (years outside 2000-2099).
    /// Fails with [`MCP7940Error::OscillatorStop`] or [`MCP7940Error::OscillatorStart`] when
    /// OSCRUN does not follow. Once ST has been cleared, any failure restarts the oscillator
    /// before the original error is returned.
    pub fn set_datetime(&mut self, datetime: &NaiveDateTime) -> Result<(), MCP7940Error<I2C::Error>> {
        let raw = MCP7940DateTime::from_datetime(datetime).map_err(MCP7940Error::DateTime)?;

        let written = match self.stop_oscillator() {
            Ok(()) => self.write_datetime_registers(&raw),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!("MCP7940: time write aborted, restarting oscillator");
            if self.start_oscillator().is_err() {
                error!("MCP7940: oscillator left stopped");
            }
            return Err(e);
        }

        self.start_oscillator()
    }

    fn write_datetime_registers(
        &mut self,
        raw: &MCP7940DateTime,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        self.write_register(RegAddr::Seconds, raw.seconds().into())?;
        self.write_register(RegAddr::Minutes, raw.minutes().into())?;
        self.write_register(RegAddr::Hours, raw.hours().into())?;

        let mut weekday = self.weekday_register()?;
        weekday.set_weekday(raw.weekday().weekday());
        self.set_weekday_register(weekday)?;

        self.write_register(RegAddr::Date, raw.date().into())?;
        self.write_register(RegAddr::Month, raw.month().into())?;
        self.write_register(RegAddr::Year, raw.year().into())
    }

    /// Reads OSCRUN.
    pub fn oscillator_state(&mut self) -> Result<OscillatorState, MCP7940Error<I2C::Error>> {
        Ok(self.weekday_register()?.oscillator_running().into())
    }

    /// Reports whether the ST bit is set, i.e. the oscillator has been asked to run.
    pub fn is_started(&mut self) -> Result<bool, MCP7940Error<I2C::Error>> {
        Ok(self.seconds()?.start_oscillator())
    }

    /// Sets ST and waits for OSCRUN.
    ///
    /// Returns immediately when the oscillator already runs.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::OscillatorStart`] after `polling.attempts` reads without OSCRUN.
    pub fn start_oscillator(&mut self) -> Result<(), MCP7940Error<I2C::Error>> {
        let mut seconds = self.seconds()?;
        if !seconds.start_oscillator() {
            debug!("MCP7940: setting ST");
            seconds.set_start_oscillator(true);
            self.set_seconds(seconds)?;
        }
        if self.poll_oscillator(OscillatorState::Running)? {
            Ok(())
        } else {
            error!("MCP7940: oscillator failed to start");
            Err(MCP7940Error::OscillatorStart)
        }
    }

    /// Clears ST and waits for OSCRUN to drop.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::OscillatorStop`] after `polling.attempts` reads with OSCRUN set.
    pub fn stop_oscillator(&mut self) -> Result<(), MCP7940Error<I2C::Error>> {
        let mut seconds = self.seconds()?;
        if seconds.start_oscillator() {
            debug!("MCP7940: clearing ST");
            seconds.set_start_oscillator(false);
            self.set_seconds(seconds)?;
        }
        if self.poll_oscillator(OscillatorState::Stopped)? {
            Ok(())
        } else {
            error!("MCP7940: oscillator failed to stop");
            Err(MCP7940Error::OscillatorStop)
        }
    }

    fn poll_oscillator(&mut self, wanted: OscillatorState) -> Result<bool, MCP7940Error<I2C::Error>> {
        let OscillatorPolling {
            attempts,
            interval_ms,
        } = self.polling;
        // OSCRUN is always read at least once
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            if self.oscillator_state()? == wanted {
                return Ok(true);
            }
            debug!("MCP7940: waiting for {:?} ({}/{})", wanted, attempt, attempts);
            if attempt < attempts {
                self.delay.delay_ms(interval_ms);
            }
        }
        Ok(false)
    }

    /// Applies the output pin, oscillator source and battery settings.
    ///
    /// Alarm enables and coarse trim are left as they are.
    pub fn configure(&mut self, config: &Config) -> Result<(), MCP7940Error<I2C::Error>> {
        let mut control = self.control()?;
        control.set_output(config.output);
        control.set_square_wave_enable(config.square_wave_enable);
        control.set_square_wave_frequency(config.square_wave_frequency);
        control.set_external_oscillator(config.external_oscillator);
        debug!("MCP7940: writing control: {:?}", control);
        self.set_control(control)?;
        self.set_battery_backup(config.battery_backup)
    }

    /// Reads PWRFAIL.
    pub fn power_failed(&mut self) -> Result<bool, MCP7940Error<I2C::Error>> {
        Ok(self.weekday_register()?.power_fail())
    }

    /// Clears PWRFAIL, which also unlatches the power-fail timestamps.
    pub fn clear_power_fail(&mut self) -> Result<(), MCP7940Error<I2C::Error>> {
        self.clear_register_bit(RegAddr::Weekday, POWER_FAIL_BIT)
    }

    /// Enables or disables the battery backup supply (VBATEN).
    pub fn set_battery_backup(&mut self, enabled: bool) -> Result<(), MCP7940Error<I2C::Error>> {
        if enabled {
            self.set_register_bit(RegAddr::Weekday, BATTERY_ENABLE_BIT)
        } else {
            self.clear_register_bit(RegAddr::Weekday, BATTERY_ENABLE_BIT)
        }
    }

    /// Reads the time stamp latched when main power was lost.
    pub fn power_down_timestamp(&mut self) -> Result<PowerTimestamp, MCP7940Error<I2C::Error>> {
        let mut data = [0; 4];
        self.read_registers(RegAddr::PowerDownMinutes, &mut data)?;
        Ok(data.into())
    }

    /// Reads the time stamp latched when main power came back.
    pub fn power_up_timestamp(&mut self) -> Result<PowerTimestamp, MCP7940Error<I2C::Error>> {
        let mut data = [0; 4];
        self.read_registers(RegAddr::PowerUpMinutes, &mut data)?;
        Ok(data.into())
    }

    /// Sets the digital trim in fine mode.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::InvalidTrim`] for `-128`.
    pub fn calibrate(&mut self, trim: i8) -> Result<(), MCP7940Error<I2C::Error>> {
        if trim == i8::MIN {
            return Err(MCP7940Error::InvalidTrim);
        }
        let mut control = self.control()?;
        control.set_coarse_trim(false);
        self.set_control(control)?;

        let mut value = OscTrim::default();
        value.set_sign(trim < 0);
        value.set_trim(trim.unsigned_abs());
        debug!("MCP7940: trim {:?}", value);
        self.set_osc_trim(value)
    }

    /// Programs an alarm to match `datetime` according to `alarm_type`.
    ///
    /// # Errors
    /// See [`MCP7940::set_alarm_config`].
    pub fn set_alarm(
        &mut self,
        slot: AlarmSlot,
        alarm_type: AlarmType,
        datetime: &NaiveDateTime,
        active: bool,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let config = AlarmConfig::from_datetime(alarm_type, datetime);
        self.set_alarm_config(slot, &config, active)
    }

    /// Programs an alarm from an explicit match pattern.
    ///
    /// The oscillator is started first and the alarm is disabled while its registers change.
    /// The interrupt flag and polarity bits are preserved.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::Alarm`] without touching the bus for an invalid pattern, or
    /// [`MCP7940Error::OscillatorStart`] when the oscillator cannot be started.
    pub fn set_alarm_config(
        &mut self,
        slot: AlarmSlot,
        config: &AlarmConfig,
        active: bool,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let raw = MCP7940Alarm::from_config(config).map_err(MCP7940Error::Alarm)?;
        let regs = slot.registers();

        self.start_oscillator()?;
        self.set_alarm_enabled(slot, false)?;

        let current = AlarmWeekday(self.read_register(regs.weekday)?);
        self.write_register(regs.weekday, raw.merge_weekday(current).into())?;
        self.write_register(regs.seconds, raw.seconds().into())?;
        self.write_register(regs.minutes, raw.minutes().into())?;
        self.write_register(regs.hours, raw.hours().into())?;
        self.write_register(regs.date, raw.date().into())?;
        self.write_register(regs.month, raw.month().into())?;

        info!("MCP7940: {:?} set to {:?}, active={}", slot, config, active);
        self.set_alarm_enabled(slot, active)
    }

    /// Reads back an alarm slot.
    ///
    /// # Errors
    /// Returns [`MCP7940Error::Alarm`] when the slot holds an undefined mask or an unprogrammed
    /// match pattern.
    pub fn alarm(&mut self, slot: AlarmSlot) -> Result<Alarm, MCP7940Error<I2C::Error>> {
        let mut data = [0; 6];
        self.read_registers(slot.registers().seconds, &mut data)?;
        let raw = MCP7940Alarm::from(data);
        let config = raw.to_config().map_err(MCP7940Error::Alarm)?;
        let control = self.control()?;
        Ok(Alarm {
            config,
            interrupt_flag: raw.weekday().interrupt_flag(),
            polarity: raw.weekday().polarity(),
            enabled: match slot {
                AlarmSlot::Alarm0 => control.alarm0_enable(),
                AlarmSlot::Alarm1 => control.alarm1_enable(),
            },
        })
    }

    /// Enables or disables an alarm (ALMxEN) without touching its match registers.
    pub fn set_alarm_enabled(
        &mut self,
        slot: AlarmSlot,
        enabled: bool,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let mut control = self.control()?;
        match slot {
            AlarmSlot::Alarm0 => control.set_alarm0_enable(enabled),
            AlarmSlot::Alarm1 => control.set_alarm1_enable(enabled),
        }
        self.set_control(control)
    }

    /// Clears the interrupt flag (ALMxIF) of one alarm.
    pub fn clear_alarm_interrupt(&mut self, slot: AlarmSlot) -> Result<(), MCP7940Error<I2C::Error>> {
        self.clear_register_bit(slot.registers().weekday, ALARM_INTERRUPT_BIT)
    }

    /// Clears the interrupt flags of both alarms, then disables both (ALM0EN, ALM1EN).
    pub fn clear_alarms(&mut self) -> Result<(), MCP7940Error<I2C::Error>> {
        for slot in AlarmSlot::ALL {
            self.clear_alarm_interrupt(slot)?;
        }
        let mut control = self.control()?;
        control.set_alarm0_enable(false);
        control.set_alarm1_enable(false);
        self.set_control(control)
    }

    /// Writes ALMPOL. The copy in the alarm 1 register follows it.
    pub fn set_alarm_polarity(
        &mut self,
        polarity: AlarmPolarity,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let regs = AlarmSlot::Alarm0.registers();
        let mut weekday = AlarmWeekday(self.read_register(regs.weekday)?);
        weekday.set_polarity(polarity);
        self.write_register(regs.weekday, weekday.into())
    }

    /// Reports what currently drives the MFP pin.
    pub fn mfp_state(&mut self) -> Result<MfpState, MCP7940Error<I2C::Error>> {
        let control = self.control()?;
        Ok(if control.square_wave_enable() {
            MfpState::SquareWave
        } else if control.alarm0_enable() || control.alarm1_enable() {
            MfpState::Alarm
        } else if control.output() {
            MfpState::High
        } else {
            MfpState::Low
        })
    }
}

// Typed single-register accessors
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ident)),+) => {
        impl<I2C: I2c, D: DelayNs> MCP7940<I2C, D> {
            $(
                paste! {
                    #[doc = concat!("Reads the ", stringify!($typ), " register.")]
                    pub fn $name(&mut self) -> Result<$typ, MCP7940Error<I2C::Error>> {
                        Ok($typ(self.read_register($regaddr)?))
                    }

                    #[doc = concat!("Writes the ", stringify!($typ), " register.")]
                    pub fn [<set_ $name>](&mut self, value: $typ) -> Result<(), MCP7940Error<I2C::Error>> {
                        self.write_register($regaddr, value.into())
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (seconds, RegAddr::Seconds, Seconds),
    (weekday_register, RegAddr::Weekday, Weekday),
    (control, RegAddr::Control, Control),
    (osc_trim, RegAddr::OscTrim, OscTrim)
);
