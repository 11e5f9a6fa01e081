//! A `no_std` driver for the DS3231 real-time clock, together with a software
//! two-wire (I2C) master for microcontrollers without I2C hardware.
//!
//! The driver, [`DS3231`], works over any [`embedded_hal::i2c::I2c`] bus. The
//! bit-banged master, [`SoftI2c`], implements that trait on top of two
//! open-drain GPIO lines and a [`embedded_hal::delay::DelayNs`].
//!
//! # Example
//!
//! ```ignore
//! use ds3231_twi::{BusConfig, SoftI2c, Time, DS3231, DEVICE_ADDRESS};
//!
//! let bus = SoftI2c::new(sda, scl, delay, BusConfig::default())?;
//! let mut rtc = DS3231::new(bus, DEVICE_ADDRESS);
//!
//! rtc.set_time(&Time::new(2024, 6, 20, 14, 30, 0, 5))?;
//! let now = rtc.time()?;
//! ```
//!
//! # Features
//!
//! - `validation` (default): reject out-of-range alarm settings before any
//!   bus traffic
//! - `log` / `defmt`: debug logging through either framework
//! - `temperature_f32`: temperature readings as `f32`

#![no_std]

// Logging goes to defmt or log when one of those features is enabled and
// compiles away otherwise.
macro_rules! log_with {
    ($level:ident, $($arg:tt)*) => {
        cfg_if::cfg_if! {
            if #[cfg(feature = "defmt")] {
                defmt::$level!($($arg)*);
            } else if #[cfg(feature = "log")] {
                log::$level!($($arg)*);
            } else {
                let _ = core::format_args!($($arg)*);
            }
        }
    };
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { log_with!(trace, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { log_with!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { log_with!(warn, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { log_with!(error, $($arg)*) };
}

pub mod alarm;
pub mod bus;
pub mod datetime;
pub mod registers;
pub mod timing;

#[cfg(test)]
mod testing;

use chrono::NaiveDateTime;
use embedded_hal::i2c::I2c;
use paste::paste;

pub use crate::alarm::{Alarm, AlarmError, AlarmMode, AlarmSlot, AlarmState};
pub use crate::bus::{BusConfig, BusError, Payload, SoftI2c};
pub use crate::datetime::{DS3231DateTimeError, Time};
pub use crate::registers::*;
pub use crate::timing::{BusSpeed, Timing};

use crate::alarm::DS3231Alarm;
use crate::datetime::{decode_hms, encode_hms, DS3231DateTime};

/// 7-bit bus address of the DS3231.
pub const DEVICE_ADDRESS: u8 = 0x68;

/// Control register settings applied by [`DS3231::configure`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Square wave output frequency
    pub square_wave_frequency: SquareWaveFrequency,
    /// Function of the INT/SQW pin
    pub interrupt_control: InterruptControl,
    /// Keep the square wave running on battery power
    pub battery_backed_square_wave: bool,
    /// Oscillator behaviour on battery power
    pub oscillator_enable: Oscillator,
}

impl Default for Config {
    /// The chip's power-on control settings.
    fn default() -> Self {
        Self {
            square_wave_frequency: SquareWaveFrequency::Hz8192,
            interrupt_control: InterruptControl::Interrupt,
            battery_backed_square_wave: false,
            oscillator_enable: Oscillator::Enabled,
        }
    }
}

/// Die temperature in quarter degrees Celsius.
///
/// The reading is `integer + quarters / 4`; for negative temperatures the
/// integer part is rounded down, so -10.25 is `{ integer: -11, quarters: 3 }`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureReading {
    /// Whole degrees (MSB register)
    pub integer: i8,
    /// Quarter degrees (bits 7:6 of the LSB register)
    pub quarters: u8,
}

impl TemperatureReading {
    /// The temperature in hundredths of a degree.
    #[must_use]
    pub fn hundredths(&self) -> i16 {
        i16::from(self.integer) * 100 + i16::from(self.quarters) * 25
    }

    /// The temperature in degrees.
    #[cfg(feature = "temperature_f32")]
    #[must_use]
    pub fn as_f32(&self) -> f32 {
        f32::from(self.integer) + f32::from(self.quarters) * 0.25
    }
}

/// Errors returned by the [`DS3231`] driver.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DS3231Error<I2CE> {
    /// The bus transfer failed
    I2c(I2CE),
    /// The time could not be encoded or converted
    DateTime(DS3231DateTimeError),
    /// The alarm setting was rejected
    Alarm(AlarmError),
    /// A temperature conversion did not finish within the poll limit
    ConversionTimeout,
}

impl<I2CE> From<I2CE> for DS3231Error<I2CE> {
    fn from(e: I2CE) -> Self {
        DS3231Error::I2c(e)
    }
}

/// DS3231 real-time clock driver.
pub struct DS3231<I2C: I2c> {
    i2c: I2C,
    address: u8,
    last_time: Option<Time>,
    poll_limit: Option<u32>,
}

// Generates a getter and a setter for single-register bitfields
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<I2C: I2c> DS3231<I2C> {
            $(
                paste! {
                    #[doc = concat!("Reads the ", stringify!($name), " register.")]
                    pub fn $name(&mut self) -> Result<$typ, DS3231Error<I2C::Error>> {
                        let mut data = [0];
                        self.read_registers($regaddr, &mut data)?;
                        Ok(<$typ>::from(data[0]))
                    }

                    #[doc = concat!("Writes the ", stringify!($name), " register.")]
                    pub fn [<set_ $name>](&mut self, value: $typ) -> Result<(), DS3231Error<I2C::Error>> {
                        self.write_registers($regaddr, &[value.into()])
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (control, RegAddr::Control, Control),
    (status, RegAddr::ControlStatus, Status),
    (aging_offset, RegAddr::AgingOffset, AgingOffset)
);

impl<I2C: I2c> DS3231<I2C> {
    /// Creates a driver for the chip at `address` (normally [`DEVICE_ADDRESS`]).
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            last_time: None,
            poll_limit: None,
        }
    }

    /// The underlying bus.
    pub fn i2c(&self) -> &I2C {
        &self.i2c
    }

    /// The underlying bus, mutably.
    pub fn i2c_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Destroys the driver and gives back the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Bounds the status polls of [`DS3231::force_temperature_conversion`].
    ///
    /// `None`, the default, polls until the chip is ready.
    pub fn set_poll_limit(&mut self, limit: Option<u32>) {
        self.poll_limit = limit;
    }

    /// Reads `buffer.len()` registers starting at `start`.
    ///
    /// The pointer write and the read are two separate transfers.
    fn read_registers(
        &mut self,
        start: RegAddr,
        buffer: &mut [u8],
    ) -> Result<(), DS3231Error<I2C::Error>> {
        self.i2c.write_read(self.address, &[start as u8], buffer)?;
        Ok(())
    }

    /// Writes up to seven registers starting at `start` in one transfer.
    fn write_registers(&mut self, start: RegAddr, data: &[u8]) -> Result<(), DS3231Error<I2C::Error>> {
        let mut frame = [0u8; 8];
        let len = data.len().min(frame.len() - 1);
        frame[0] = start as u8;
        frame[1..=len].copy_from_slice(&data[..len]);
        self.i2c.write(self.address, &frame[..=len])?;
        Ok(())
    }

    /// Applies `config` to the control register, leaving the other bits alone.
    pub fn configure(&mut self, config: &Config) -> Result<(), DS3231Error<I2C::Error>> {
        let mut control = self.control()?;
        control.set_oscillator_enable(config.oscillator_enable);
        control.set_battery_backed_square_wave(config.battery_backed_square_wave);
        control.set_square_wave_frequency(config.square_wave_frequency);
        control.set_interrupt_control(config.interrupt_control);
        debug!("DS3231: writing control: {:?}", control);
        self.set_control(control)
    }

    /// Reads the current time and remembers it as the last known time.
    pub fn time(&mut self) -> Result<Time, DS3231Error<I2C::Error>> {
        let mut data = [0; 7];
        self.read_registers(RegAddr::Seconds, &mut data)?;
        let time = DS3231DateTime::from(data).into_time();
        debug!("DS3231: read time {:?}", time);
        self.last_time = Some(time);
        Ok(time)
    }

    /// Sets the time. The 12-hour fields of `time` are ignored.
    pub fn set_time(&mut self, time: &Time) -> Result<(), DS3231Error<I2C::Error>> {
        let raw = DS3231DateTime::from_time(time).map_err(DS3231Error::DateTime)?;
        let data: [u8; 7] = (&raw).into();
        debug!("DS3231: writing time registers {:?}", data);
        self.write_registers(RegAddr::Seconds, &data)
    }

    /// Reads only hours, minutes and seconds as `(hour, minute, second)`.
    pub fn time_hms(&mut self) -> Result<(u8, u8, u8), DS3231Error<I2C::Error>> {
        let mut data = [0; 3];
        self.read_registers(RegAddr::Seconds, &mut data)?;
        Ok(decode_hms(data))
    }

    /// Sets only hours, minutes and seconds.
    pub fn set_time_hms(
        &mut self,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<(), DS3231Error<I2C::Error>> {
        let data = encode_hms(hour, minute, second).map_err(DS3231Error::DateTime)?;
        self.write_registers(RegAddr::Seconds, &data)
    }

    /// The time returned by the last successful [`DS3231::time`] call.
    pub fn last_time(&self) -> Option<Time> {
        self.last_time
    }

    /// Reads the current time as a chrono `NaiveDateTime`.
    pub fn datetime(&mut self) -> Result<NaiveDateTime, DS3231Error<I2C::Error>> {
        self.time()?.to_datetime().map_err(DS3231Error::DateTime)
    }

    /// Sets the time from a chrono `NaiveDateTime`.
    pub fn set_datetime(&mut self, datetime: &NaiveDateTime) -> Result<(), DS3231Error<I2C::Error>> {
        let time = Time::from_datetime(datetime).map_err(DS3231Error::DateTime)?;
        self.set_time(&time)
    }

    /// Reads the die temperature.
    pub fn temperature(&mut self) -> Result<TemperatureReading, DS3231Error<I2C::Error>> {
        let mut data = [0; 2];
        self.read_registers(RegAddr::MSBTemp, &mut data)?;
        Ok(TemperatureReading {
            integer: Temperature::from(data[0]).temperature(),
            quarters: TemperatureFraction::from(data[1]).quarters(),
        })
    }

    /// Reads the die temperature in degrees Celsius.
    #[cfg(feature = "temperature_f32")]
    pub fn temperature_f32(&mut self) -> Result<f32, DS3231Error<I2C::Error>> {
        Ok(self.temperature()?.as_f32())
    }

    /// Starts a temperature conversion, optionally waiting for it to finish.
    ///
    /// Waits for BSY to clear before setting CONV. With `block`, polls until
    /// both CONV and BSY read clear.
    pub fn force_temperature_conversion(
        &mut self,
        block: bool,
    ) -> Result<(), DS3231Error<I2C::Error>> {
        self.poll(|dev| Ok(!dev.status()?.busy()))?;

        let mut control = self.control()?;
        control.set_convert_temperature(true);
        self.set_control(control)?;

        if block {
            self.poll(|dev| {
                let converting = dev.control()?.convert_temperature();
                Ok(!converting && !dev.status()?.busy())
            })?;
        }
        Ok(())
    }

    fn poll<F>(&mut self, mut ready: F) -> Result<(), DS3231Error<I2C::Error>>
    where
        F: FnMut(&mut Self) -> Result<bool, DS3231Error<I2C::Error>>,
    {
        let mut polls: u32 = 0;
        loop {
            if ready(self)? {
                return Ok(());
            }
            polls += 1;
            if let Some(limit) = self.poll_limit {
                if polls >= limit {
                    error!("DS3231: temperature conversion still busy after {} polls", polls);
                    return Err(DS3231Error::ConversionTimeout);
                }
            }
        }
    }

    /// Keeps the square wave running on battery power (BBSQW).
    pub fn set_square_wave_output(&mut self, enable: bool) -> Result<(), DS3231Error<I2C::Error>> {
        let mut control = self.control()?;
        control.set_battery_backed_square_wave(enable);
        self.set_control(control)
    }

    /// Enables or disables the 32kHz output pin (EN32kHz).
    pub fn set_32khz_output(&mut self, enable: bool) -> Result<(), DS3231Error<I2C::Error>> {
        let mut status = self.status()?.with_flags_kept();
        status.set_enable_32khz_output(enable);
        self.set_status(status)
    }

    /// Whether the oscillator stopped at some point since the flag was cleared.
    pub fn oscillator_stopped(&mut self) -> Result<bool, DS3231Error<I2C::Error>> {
        Ok(self.status()?.oscillator_stop_flag())
    }

    /// Clears the oscillator stop flag.
    pub fn clear_oscillator_stop_flag(&mut self) -> Result<(), DS3231Error<I2C::Error>> {
        let mut status = self.status()?.with_flags_kept();
        status.set_oscillator_stop_flag(false);
        self.set_status(status)
    }

    /// Zeroes all registers of `slot`.
    pub fn reset_alarm(&mut self, slot: AlarmSlot) -> Result<(), DS3231Error<I2C::Error>> {
        let zeros = [0u8; 4];
        self.write_registers(slot.first_register(), &zeros[..slot.register_count()])
    }

    /// Programs `slot` and sets its interrupt enable bit to `interrupt`.
    ///
    /// With the `validation` feature an invalid setting is rejected before
    /// anything is sent to the chip.
    pub fn set_alarm(
        &mut self,
        slot: AlarmSlot,
        alarm: &Alarm,
        interrupt: bool,
    ) -> Result<(), DS3231Error<I2C::Error>> {
        #[cfg(feature = "validation")]
        alarm.validate(slot).map_err(DS3231Error::Alarm)?;

        let mut control = self.control()?;
        match slot {
            AlarmSlot::Alarm1 => control.set_alarm1_interrupt_enable(interrupt),
            AlarmSlot::Alarm2 => control.set_alarm2_interrupt_enable(interrupt),
        }
        self.set_control(control)?;

        let (data, len) = DS3231Alarm::from_alarm(alarm).to_registers(slot);
        debug!("DS3231: writing {:?} registers {:?}", slot, &data[..len]);
        self.write_registers(slot.first_register(), &data[..len])
    }

    /// Programs `slot` from a [`Time`]; see [`Alarm::at`].
    pub fn set_alarm_at(
        &mut self,
        slot: AlarmSlot,
        time: &Time,
        mode: AlarmMode,
        interrupt: bool,
    ) -> Result<(), DS3231Error<I2C::Error>> {
        self.set_alarm(slot, &Alarm::at(time, mode), interrupt)
    }

    /// Reads back the setting of `slot` and its interrupt enable bit.
    pub fn alarm(&mut self, slot: AlarmSlot) -> Result<AlarmState, DS3231Error<I2C::Error>> {
        let control = self.control()?;
        let interrupt_enabled = match slot {
            AlarmSlot::Alarm1 => control.alarm1_interrupt_enable(),
            AlarmSlot::Alarm2 => control.alarm2_interrupt_enable(),
        };

        let mut data = [0u8; 4];
        self.read_registers(slot.first_register(), &mut data[..slot.register_count()])?;
        let alarm = DS3231Alarm::from_registers(slot, &data).to_alarm(slot);
        Ok(AlarmState {
            alarm,
            interrupt_enabled,
        })
    }

    /// Whether `slot` has fired. The flag is left set.
    pub fn check_alarm(&mut self, slot: AlarmSlot) -> Result<bool, DS3231Error<I2C::Error>> {
        let status = self.status()?;
        Ok(match slot {
            AlarmSlot::Alarm1 => status.alarm1_flag(),
            AlarmSlot::Alarm2 => status.alarm2_flag(),
        })
    }

    /// Clears the fired flag of `slot`. The other flags are written as 1 so
    /// one raised after the read survives.
    pub fn clear_alarm_flag(&mut self, slot: AlarmSlot) -> Result<(), DS3231Error<I2C::Error>> {
        let mut status = self.status()?.with_flags_kept();
        match slot {
            AlarmSlot::Alarm1 => status.set_alarm1_flag(false),
            AlarmSlot::Alarm2 => status.set_alarm2_flag(false),
        }
        self.set_status(status)
    }
}
