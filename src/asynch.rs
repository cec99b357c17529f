//! Async implementation of the MCP7940 driver.
//!
//! This module provides an async interface to the MCP7940 RTC device using
//! `embedded-hal-async` traits. It is only available when the `async` feature
//! is enabled. Every operation of the blocking driver is mirrored here with the
//! same register sequence, awaiting each bus transaction and each oscillator
//! poll delay.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp7940::asynch::MCP7940;
//!
//! // Initialize device
//! let mut rtc = MCP7940::new(i2c, delay);
//!
//! // Get current date/time asynchronously
//! let datetime = rtc.datetime().await?;
//!
//! // Arm the wake pulse and power off
//! rtc.sleep_until(&wake_at, &mut shutdown).await?;
//! ```

use chrono::NaiveDateTime;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use paste::paste;

use crate::alarm::{Alarm, AlarmConfig, AlarmSlot, AlarmType, MCP7940Alarm, MfpState};
use crate::datetime::{weekday_from_register, MCP7940DateTime};
use crate::wake::{PowerOff, WakeError, WakeSchedule};
use crate::{
    AlarmPolarity, AlarmWeekday, Config, Control, MCP7940Error, OscTrim, OscillatorPolling,
    OscillatorState, PowerTimestamp, RegAddr, Seconds, Weekday, ALARM_INTERRUPT_BIT,
    BATTERY_ENABLE_BIT, DEVICE_ADDRESS, POWER_FAIL_BIT,
};

/// MCP7940 Real-Time Clock async driver.
///
/// This struct provides the async interface to the MCP7940 RTC device.
/// It supports async I2C operations through the `embedded-hal-async` traits.
pub struct MCP7940<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    polling: OscillatorPolling,
}

impl<I2C: I2c, D: DelayNs> MCP7940<I2C, D> {
    /// Creates a new MCP7940 async driver instance.
    ///
    /// # Arguments
    /// * `i2c` - The async I2C bus implementation
    /// * `delay` - The async delay used between oscillator polls
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
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(MCP7940Error::I2c)` on bus error
    pub async fn write_register(
        &mut self,
        addr: RegAddr,
        value: u8,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        trace!("MCP7940: write {:?} <- {:#x}", addr, value);
        self.i2c.write(self.address, &[addr as u8, value]).await?;
        Ok(())
    }

    /// Reads `buf.len()` consecutive registers starting at `addr`.
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(MCP7940Error::I2c)` on bus error
    pub async fn read_registers(
        &mut self,
        addr: RegAddr,
        buf: &mut [u8],
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        self.i2c
            .write_read(self.address, &[addr as u8], buf)
            .await?;
        Ok(())
    }

    /// Reads a single register.
    pub async fn read_register(&mut self, addr: RegAddr) -> Result<u8, MCP7940Error<I2C::Error>> {
        let mut data = [0];
        self.read_registers(addr, &mut data).await?;
        trace!("MCP7940: read {:?} -> {:#x}", addr, data[0]);
        Ok(data[0])
    }

    /// Sets one bit of a register with a read-modify-write.
    pub async fn set_register_bit(
        &mut self,
        addr: RegAddr,
        bit: u8,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let value = self.read_register(addr).await?;
        self.write_register(addr, value | (1 << bit)).await
    }

    /// Clears one bit of a register with a read-modify-write.
    pub async fn clear_register_bit(
        &mut self,
        addr: RegAddr,
        bit: u8,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let value = self.read_register(addr).await?;
        self.write_register(addr, value & !(1 << bit)).await
    }

    /// Gets the current date and time from the device.
    ///
    /// # Returns
    /// * `Ok(NaiveDateTime)` - The current date and time
    /// * `Err(MCP7940Error)` on bus error or undecodable registers
    pub async fn datetime(&mut self) -> Result<NaiveDateTime, MCP7940Error<I2C::Error>> {
        let mut data = [0; 7];
        self.read_registers(RegAddr::Seconds, &mut data).await?;
        MCP7940DateTime::from(data)
            .into_datetime()
            .map_err(MCP7940Error::DateTime)
    }

    /// Reads the weekday counter (1 = Monday).
    pub async fn weekday(&mut self) -> Result<chrono::Weekday, MCP7940Error<I2C::Error>> {
        let reg = self.weekday_register().await?;
        weekday_from_register(reg.weekday()).map_err(MCP7940Error::DateTime)
    }

    /// Sets the current date and time on the device.
    ///
    /// # Arguments
    /// * `datetime` - The date and time to set, years 2000-2099
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(MCP7940Error)` on error, without bus traffic if `datetime` cannot be stored; a
    ///   failure after the oscillator stop restarts the oscillator first
    pub async fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let raw = MCP7940DateTime::from_datetime(datetime).map_err(MCP7940Error::DateTime)?;

        let written = match self.stop_oscillator().await {
            Ok(()) => self.write_datetime_registers(&raw).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!("MCP7940: time write aborted, restarting oscillator");
            if self.start_oscillator().await.is_err() {
                error!("MCP7940: oscillator left stopped");
            }
            return Err(e);
        }

        self.start_oscillator().await
    }

    async fn write_datetime_registers(
        &mut self,
        raw: &MCP7940DateTime,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        self.write_register(RegAddr::Seconds, raw.seconds().into())
            .await?;
        self.write_register(RegAddr::Minutes, raw.minutes().into())
            .await?;
        self.write_register(RegAddr::Hours, raw.hours().into())
            .await?;

        let mut weekday = self.weekday_register().await?;
        weekday.set_weekday(raw.weekday().weekday());
        self.set_weekday_register(weekday).await?;

        self.write_register(RegAddr::Date, raw.date().into()).await?;
        self.write_register(RegAddr::Month, raw.month().into())
            .await?;
        self.write_register(RegAddr::Year, raw.year().into()).await
    }

    /// Reads OSCRUN.
    pub async fn oscillator_state(&mut self) -> Result<OscillatorState, MCP7940Error<I2C::Error>> {
        Ok(self.weekday_register().await?.oscillator_running().into())
    }

    /// Reports whether the ST bit is set.
    pub async fn is_started(&mut self) -> Result<bool, MCP7940Error<I2C::Error>> {
        Ok(self.seconds().await?.start_oscillator())
    }

    /// Sets ST and waits for OSCRUN.
    ///
    /// # Returns
    /// * `Ok(())` once OSCRUN reads set
    /// * `Err(MCP7940Error::OscillatorStart)` when the polling budget runs out
    pub async fn start_oscillator(&mut self) -> Result<(), MCP7940Error<I2C::Error>> {
        let mut seconds = self.seconds().await?;
        if !seconds.start_oscillator() {
            debug!("MCP7940: setting ST");
            seconds.set_start_oscillator(true);
            self.set_seconds(seconds).await?;
        }
        if self.poll_oscillator(OscillatorState::Running).await? {
            Ok(())
        } else {
            error!("MCP7940: oscillator failed to start");
            Err(MCP7940Error::OscillatorStart)
        }
    }

    /// Clears ST and waits for OSCRUN to drop.
    ///
    /// # Returns
    /// * `Ok(())` once OSCRUN reads clear
    /// * `Err(MCP7940Error::OscillatorStop)` when the polling budget runs out
    pub async fn stop_oscillator(&mut self) -> Result<(), MCP7940Error<I2C::Error>> {
        let mut seconds = self.seconds().await?;
        if seconds.start_oscillator() {
            debug!("MCP7940: clearing ST");
            seconds.set_start_oscillator(false);
            self.set_seconds(seconds).await?;
        }
        if self.poll_oscillator(OscillatorState::Stopped).await? {
            Ok(())
        } else {
            error!("MCP7940: oscillator failed to stop");
            Err(MCP7940Error::OscillatorStop)
        }
    }

    async fn poll_oscillator(
        &mut self,
        wanted: OscillatorState,
    ) -> Result<bool, MCP7940Error<I2C::Error>> {
        let OscillatorPolling {
            attempts,
            interval_ms,
        } = self.polling;
        // OSCRUN is always read at least once
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            if self.oscillator_state().await? == wanted {
                return Ok(true);
            }
            debug!("MCP7940: waiting for {:?} ({}/{})", wanted, attempt, attempts);
            if attempt < attempts {
                self.delay.delay_ms(interval_ms).await;
            }
        }
        Ok(false)
    }

    /// Configures the device according to the provided configuration.
    ///
    /// # Arguments
    /// * `config` - The configuration to apply
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(MCP7940Error)` on error
    pub async fn configure(&mut self, config: &Config) -> Result<(), MCP7940Error<I2C::Error>> {
        let mut control = self.control().await?;
        control.set_output(config.output);
        control.set_square_wave_enable(config.square_wave_enable);
        control.set_square_wave_frequency(config.square_wave_frequency);
        control.set_external_oscillator(config.external_oscillator);
        debug!("MCP7940: writing control: {:?}", control);
        self.set_control(control).await?;
        self.set_battery_backup(config.battery_backup).await
    }

    /// Reads PWRFAIL.
    pub async fn power_failed(&mut self) -> Result<bool, MCP7940Error<I2C::Error>> {
        Ok(self.weekday_register().await?.power_fail())
    }

    /// Clears PWRFAIL.
    pub async fn clear_power_fail(&mut self) -> Result<(), MCP7940Error<I2C::Error>> {
        self.clear_register_bit(RegAddr::Weekday, POWER_FAIL_BIT)
            .await
    }

    /// Enables or disables the battery backup supply (VBATEN).
    pub async fn set_battery_backup(
        &mut self,
        enabled: bool,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        if enabled {
            self.set_register_bit(RegAddr::Weekday, BATTERY_ENABLE_BIT)
                .await
        } else {
            self.clear_register_bit(RegAddr::Weekday, BATTERY_ENABLE_BIT)
                .await
        }
    }

    /// Reads the power-down time stamp.
    pub async fn power_down_timestamp(
        &mut self,
    ) -> Result<PowerTimestamp, MCP7940Error<I2C::Error>> {
        let mut data = [0; 4];
        self.read_registers(RegAddr::PowerDownMinutes, &mut data)
            .await?;
        Ok(data.into())
    }

    /// Reads the power-up time stamp.
    pub async fn power_up_timestamp(&mut self) -> Result<PowerTimestamp, MCP7940Error<I2C::Error>> {
        let mut data = [0; 4];
        self.read_registers(RegAddr::PowerUpMinutes, &mut data)
            .await?;
        Ok(data.into())
    }

    /// Sets the digital trim in fine mode. `-128` is rejected.
    pub async fn calibrate(&mut self, trim: i8) -> Result<(), MCP7940Error<I2C::Error>> {
        if trim == i8::MIN {
            return Err(MCP7940Error::InvalidTrim);
        }
        let mut control = self.control().await?;
        control.set_coarse_trim(false);
        self.set_control(control).await?;

        let mut value = OscTrim::default();
        value.set_sign(trim < 0);
        value.set_trim(trim.unsigned_abs());
        self.set_osc_trim(value).await
    }

    /// Programs an alarm to match `datetime` according to `alarm_type`.
    pub async fn set_alarm(
        &mut self,
        slot: AlarmSlot,
        alarm_type: AlarmType,
        datetime: &NaiveDateTime,
        active: bool,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let config = AlarmConfig::from_datetime(alarm_type, datetime);
        self.set_alarm_config(slot, &config, active).await
    }

    /// Programs an alarm from an explicit match pattern.
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(MCP7940Error::Alarm)` for an invalid pattern, before any bus traffic
    /// * `Err(MCP7940Error)` on any other error
    pub async fn set_alarm_config(
        &mut self,
        slot: AlarmSlot,
        config: &AlarmConfig,
        active: bool,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let raw = MCP7940Alarm::from_config(config).map_err(MCP7940Error::Alarm)?;
        let regs = slot.registers();

        self.start_oscillator().await?;
        self.set_alarm_enabled(slot, false).await?;

        let current = AlarmWeekday(self.read_register(regs.weekday).await?);
        self.write_register(regs.weekday, raw.merge_weekday(current).into())
            .await?;
        self.write_register(regs.seconds, raw.seconds().into())
            .await?;
        self.write_register(regs.minutes, raw.minutes().into())
            .await?;
        self.write_register(regs.hours, raw.hours().into()).await?;
        self.write_register(regs.date, raw.date().into()).await?;
        self.write_register(regs.month, raw.month().into()).await?;

        info!("MCP7940: {:?} set to {:?}, active={}", slot, config, active);
        self.set_alarm_enabled(slot, active).await
    }

    /// Reads back an alarm slot.
    pub async fn alarm(&mut self, slot: AlarmSlot) -> Result<Alarm, MCP7940Error<I2C::Error>> {
        let mut data = [0; 6];
        self.read_registers(slot.registers().seconds, &mut data)
            .await?;
        let raw = MCP7940Alarm::from(data);
        let config = raw.to_config().map_err(MCP7940Error::Alarm)?;
        let control = self.control().await?;
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

    /// Enables or disables an alarm (ALMxEN).
    pub async fn set_alarm_enabled(
        &mut self,
        slot: AlarmSlot,
        enabled: bool,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let mut control = self.control().await?;
        match slot {
            AlarmSlot::Alarm0 => control.set_alarm0_enable(enabled),
            AlarmSlot::Alarm1 => control.set_alarm1_enable(enabled),
        }
        self.set_control(control).await
    }

    /// Clears the interrupt flag (ALMxIF) of one alarm.
    pub async fn clear_alarm_interrupt(
        &mut self,
        slot: AlarmSlot,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        self.clear_register_bit(slot.registers().weekday, ALARM_INTERRUPT_BIT)
            .await
    }

    /// Clears the interrupt flags of both alarms, then disables both.
    pub async fn clear_alarms(&mut self) -> Result<(), MCP7940Error<I2C::Error>> {
        for slot in AlarmSlot::ALL {
            self.clear_alarm_interrupt(slot).await?;
        }
        let mut control = self.control().await?;
        control.set_alarm0_enable(false);
        control.set_alarm1_enable(false);
        self.set_control(control).await
    }

    /// Writes ALMPOL.
    pub async fn set_alarm_polarity(
        &mut self,
        polarity: AlarmPolarity,
    ) -> Result<(), MCP7940Error<I2C::Error>> {
        let regs = AlarmSlot::Alarm0.registers();
        let mut weekday = AlarmWeekday(self.read_register(regs.weekday).await?);
        weekday.set_polarity(polarity);
        self.write_register(regs.weekday, weekday.into()).await
    }

    /// Reports what currently drives the MFP pin.
    pub async fn mfp_state(&mut self) -> Result<MfpState, MCP7940Error<I2C::Error>> {
        let control = self.control().await?;
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

    /// Arms the wake pulse for `target`. See [`crate::wake`].
    pub async fn schedule_wake(
        &mut self,
        target: &NaiveDateTime,
    ) -> Result<WakeSchedule, MCP7940Error<I2C::Error>> {
        let schedule = WakeSchedule::pulse(*target).map_err(MCP7940Error::DateTime)?;

        for slot in AlarmSlot::ALL {
            self.clear_alarm_interrupt(slot).await?;
        }
        self.set_alarm_polarity(AlarmPolarity::Low).await?;
        self.set_alarm(AlarmSlot::Alarm0, AlarmType::All, &schedule.pre_pulse, true)
            .await?;
        self.set_alarm(AlarmSlot::Alarm1, AlarmType::All, &schedule.target, true)
            .await?;

        info!("MCP7940: wake pulse armed");
        Ok(schedule)
    }

    /// Arms the wake pulse for `target` and powers the host off.
    pub async fn sleep_until<P: PowerOff>(
        &mut self,
        target: &NaiveDateTime,
        power: &mut P,
    ) -> Result<WakeSchedule, WakeError<I2C::Error, P::Error>> {
        let schedule = self.schedule_wake(target).await.map_err(WakeError::Rtc)?;
        info!("MCP7940: powering off");
        power.power_off().map_err(WakeError::PowerOff)?;
        Ok(schedule)
    }
}

// Register access implementations
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ident)),+) => {
        impl<I2C: I2c, D: DelayNs> MCP7940<I2C, D> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($typ), " register.")]
                    pub async fn $name(&mut self) -> Result<$typ, MCP7940Error<I2C::Error>> {
                        Ok($typ(self.read_register($regaddr).await?))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($typ), " register.")]
                    pub async fn [<set_ $name>](&mut self, value: $typ) -> Result<(), MCP7940Error<I2C::Error>> {
                        self.write_register($regaddr, value.into()).await
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
