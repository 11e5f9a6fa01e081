//! Register definitions and bitfield structures for the DS3231 RTC.
//!
//! This module contains the register map, the bitfield views over the packed
//! control/status/alarm registers, and the binary-coded-decimal helpers used
//! by every encoder and decoder in the crate.

use bitfield::bitfield;

/// Register addresses for the DS3231 RTC.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register (0-59)
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (0-23)
    Hours = 0x02,
    /// Day of week register (1-7)
    Day = 0x03,
    /// Date register (1-31)
    Date = 0x04,
    /// Month register (1-12) with the century flag in bit 7
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
    /// Alarm 1 seconds register
    Alarm1Seconds = 0x07,
    /// Alarm 1 minutes register
    Alarm1Minutes = 0x08,
    /// Alarm 1 hours register
    Alarm1Hours = 0x09,
    /// Alarm 1 day/date register
    Alarm1DayDate = 0x0A,
    /// Alarm 2 minutes register
    Alarm2Minutes = 0x0B,
    /// Alarm 2 hours register
    Alarm2Hours = 0x0C,
    /// Alarm 2 day/date register
    Alarm2DayDate = 0x0D,
    /// Control register
    Control = 0x0E,
    /// Control/Status register
    ControlStatus = 0x0F,
    /// Aging offset register
    AgingOffset = 0x10,
    /// Temperature MSB register
    MSBTemp = 0x11,
    /// Temperature LSB register
    LSBTemp = 0x12,
}

/// Number of addressable registers.
pub const REGISTER_COUNT: u8 = 0x13;

/// Converts a decimal value (0-99) to packed BCD.
///
/// Values outside 0-99 are not rejected; the result is unspecified but the
/// conversion never panics.
#[must_use]
pub const fn to_bcd(d: u8) -> u8 {
    (d / 10).wrapping_mul(16).wrapping_add(d % 10)
}

/// Converts a packed BCD byte to its decimal value.
#[must_use]
pub const fn from_bcd(b: u8) -> u8 {
    (b / 16).wrapping_mul(10).wrapping_add(b % 16)
}

/// Time representation format of an hours register.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeRepresentation {
    /// 24-hour format (0-23)
    TwentyFourHour = 0,
    /// 12-hour format (1-12 + AM/PM)
    TwelveHour = 1,
}
impl From<u8> for TimeRepresentation {
    /// Creates a `TimeRepresentation` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => TimeRepresentation::TwentyFourHour,
            1 => TimeRepresentation::TwelveHour,
            _ => panic!("Invalid value for TimeRepresentation: {}", v),
        }
    }
}
impl From<TimeRepresentation> for u8 {
    fn from(v: TimeRepresentation) -> Self {
        v as u8
    }
}

/// Oscillator control (EOSC is active low).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    /// Oscillator is enabled
    Enabled = 0,
    /// Oscillator stops when running on battery
    Disabled = 1,
}
impl From<u8> for Oscillator {
    /// Creates an `Oscillator` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => Oscillator::Enabled,
            1 => Oscillator::Disabled,
            _ => panic!("Invalid value for Oscillator: {}", v),
        }
    }
}
impl From<Oscillator> for u8 {
    fn from(v: Oscillator) -> Self {
        v as u8
    }
}

/// Function of the INT/SQW pin.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptControl {
    /// Output square wave on INT/SQW pin
    SquareWave = 0,
    /// Output alarm interrupt signal on INT/SQW pin
    Interrupt = 1,
}
impl From<u8> for InterruptControl {
    /// Creates an `InterruptControl` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => InterruptControl::SquareWave,
            1 => InterruptControl::Interrupt,
            _ => panic!("Invalid value for InterruptControl: {}", v),
        }
    }
}
impl From<InterruptControl> for u8 {
    fn from(v: InterruptControl) -> Self {
        v as u8
    }
}

/// Square wave output frequency options.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SquareWaveFrequency {
    /// 1 Hz square wave output
    Hz1 = 0b00,
    /// 1.024 kHz square wave output
    Hz1024 = 0b01,
    /// 4.096 kHz square wave output
    Hz4096 = 0b10,
    /// 8.192 kHz square wave output
    Hz8192 = 0b11,
}
impl From<u8> for SquareWaveFrequency {
    /// Creates a `SquareWaveFrequency` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0b00, 0b01, 0b10, or 0b11.
    fn from(v: u8) -> Self {
        match v {
            0b00 => SquareWaveFrequency::Hz1,
            0b01 => SquareWaveFrequency::Hz1024,
            0b10 => SquareWaveFrequency::Hz4096,
            0b11 => SquareWaveFrequency::Hz8192,
            _ => panic!("Invalid value for SquareWaveFrequency: {}", v),
        }
    }
}
impl From<SquareWaveFrequency> for u8 {
    fn from(v: SquareWaveFrequency) -> Self {
        v as u8
    }
}

/// Day/Date select for alarm registers (DY/DT bit).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DayDateSelect {
    /// Match against date of the month (1-31)
    Date = 0,
    /// Match against day of the week (1-7)
    Day = 1,
}
impl From<u8> for DayDateSelect {
    /// Creates a `DayDateSelect` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0 or 1.
    fn from(v: u8) -> Self {
        match v {
            0 => DayDateSelect::Date,
            1 => DayDateSelect::Day,
            _ => panic!("Invalid value for DayDateSelect: {}", v),
        }
    }
}
impl From<DayDateSelect> for u8 {
    fn from(v: DayDateSelect) -> Self {
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
    /// Hours register, as stored in the time block or (without the mask bit)
    /// in an alarm hours register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Hours(u8);
    impl Debug;
    /// Time representation format (12/24 hour)
    pub from into TimeRepresentation, time_representation, set_time_representation: 6, 6;
    /// PM flag in 12-hour mode
    pub pm, set_pm: 5;
    /// BCD hour in 24-hour mode (00-23)
    pub twenty_four_hour_bcd, set_twenty_four_hour_bcd: 5, 0;
    /// BCD hour in 12-hour mode (01-12)
    pub twelve_hour_bcd, set_twelve_hour_bcd: 4, 0;
}
from_register_u8!(Hours);

impl Hours {
    /// Hour of the day (0-23) regardless of the register's time representation.
    #[must_use]
    pub fn hour(&self) -> u8 {
        match self.time_representation() {
            TimeRepresentation::TwentyFourHour => from_bcd(self.twenty_four_hour_bcd()),
            TimeRepresentation::TwelveHour => {
                let hour = from_bcd(self.twelve_hour_bcd()) % 12;
                if self.pm() {
                    hour + 12
                } else {
                    hour
                }
            }
        }
    }
}

bitfield! {
    /// Month register (1-12) with century flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Month(u8);
    impl Debug;
    /// Century flag (set = 2000-2099)
    pub century, set_century: 7;
    /// BCD month (01-12)
    pub month_bcd, set_month_bcd: 4, 0;
}
from_register_u8!(Month);

bitfield! {
    /// Control register for device configuration.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Control(u8);
    impl Debug;
    /// Oscillator enable/disable control
    pub from into Oscillator, oscillator_enable, set_oscillator_enable: 7, 7;
    /// Enable square wave output on battery power
    pub battery_backed_square_wave, set_battery_backed_square_wave: 6;
    /// Force temperature conversion
    pub convert_temperature, set_convert_temperature: 5;
    /// Square wave output frequency selection
    pub from into SquareWaveFrequency, square_wave_frequency, set_square_wave_frequency: 4, 3;
    /// INT/SQW pin function control
    pub from into InterruptControl, interrupt_control, set_interrupt_control: 2, 2;
    /// Enable alarm 2 interrupt
    pub alarm2_interrupt_enable, set_alarm2_interrupt_enable: 1;
    /// Enable alarm 1 interrupt
    pub alarm1_interrupt_enable, set_alarm1_interrupt_enable: 0;
}
from_register_u8!(Control);

#[cfg(feature = "defmt")]
impl defmt::Format for Control {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Control({=u8:#x}", self.0);
        if self.convert_temperature() {
            defmt::write!(f, ", CONV");
        }
        if self.alarm2_interrupt_enable() {
            defmt::write!(f, ", A2IE");
        }
        if self.alarm1_interrupt_enable() {
            defmt::write!(f, ", A1IE");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Status register for device state and flags.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Status(u8);
    impl Debug;
    /// Oscillator stop flag
    pub oscillator_stop_flag, set_oscillator_stop_flag: 7;
    /// Enable 32kHz output
    pub enable_32khz_output, set_enable_32khz_output: 3;
    /// Device busy flag (temperature conversion in progress)
    pub busy, set_busy: 2;
    /// Alarm 2 triggered flag
    pub alarm2_flag, set_alarm2_flag: 1;
    /// Alarm 1 triggered flag
    pub alarm1_flag, set_alarm1_flag: 0;
}
from_register_u8!(Status);

impl Status {
    /// Copy with OSF, A2F and A1F set.
    ///
    /// The chip ignores a 1 written to these flags, so writing this back
    /// cannot clear a flag raised after the status was read.
    #[must_use]
    pub fn with_flags_kept(mut self) -> Self {
        self.set_oscillator_stop_flag(true);
        self.set_alarm2_flag(true);
        self.set_alarm1_flag(true);
        self
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Status({=u8:#x}", self.0);
        if self.oscillator_stop_flag() {
            defmt::write!(f, ", OSF");
        }
        if self.busy() {
            defmt::write!(f, ", BSY");
        }
        if self.alarm2_flag() {
            defmt::write!(f, ", A2F");
        }
        if self.alarm1_flag() {
            defmt::write!(f, ", A1F");
        }
        defmt::write!(f, ")");
    }
}

bitfield! {
    /// Aging offset register for oscillator adjustment.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct AgingOffset(u8);
    impl Debug;
    /// Aging offset value (-128 to +127)
    pub i8, aging_offset, set_aging_offset: 7, 0;
}
from_register_u8!(AgingOffset);

bitfield! {
    /// Temperature register (integer part).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Temperature(u8);
    impl Debug;
    /// Temperature value (-128 to +127)
    pub i8, temperature, set_temperature: 7, 0;
}
from_register_u8!(Temperature);

bitfield! {
    /// Temperature fraction register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct TemperatureFraction(u8);
    impl Debug;
    /// Quarter degrees (0-3)
    pub quarters, set_quarters: 7, 6;
}
from_register_u8!(TemperatureFraction);

bitfield! {
    /// Alarm seconds, minutes or hours register: a BCD value plus mask bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct AlarmTime(u8);
    impl Debug;
    /// Mask bit (set = register ignored when matching)
    pub mask, set_mask: 7;
    /// BCD value; for hours this carries the 12/24 flag layout of [`Hours`]
    pub value, set_value: 6, 0;
}
from_register_u8!(AlarmTime);

bitfield! {
    /// Alarm day/date register with mask bit and DY/DT select.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct AlarmDayDate(u8);
    impl Debug;
    /// Mask bit (set = register ignored when matching)
    pub mask, set_mask: 7;
    /// Day/Date select (1=day of week, 0=date of month)
    pub from into DayDateSelect, day_date_select, set_day_date_select: 6, 6;
    /// BCD date of month (01-31) when DY/DT=0
    pub date_bcd, set_date_bcd: 5, 0;
    /// Day of week (1-7) when DY/DT=1
    pub weekday, set_weekday: 3, 0;
}
from_register_u8!(AlarmDayDate);

impl AlarmDayDate {
    /// Day of week or date of month, depending on the DY/DT bit.
    #[must_use]
    pub fn day(&self) -> u8 {
        match self.day_date_select() {
            DayDateSelect::Day => self.weekday(),
            DayDateSelect::Date => from_bcd(self.date_bcd()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcd_round_trip() {
        for d in 0..=99u8 {
            assert_eq!(from_bcd(to_bcd(d)), d, "round trip failed for {}", d);
        }
    }

    #[test]
    fn test_bcd_known_values() {
        assert_eq!(to_bcd(0), 0x00);
        assert_eq!(to_bcd(9), 0x09);
        assert_eq!(to_bcd(10), 0x10);
        assert_eq!(to_bcd(59), 0x59);
        assert_eq!(to_bcd(99), 0x99);
        assert_eq!(from_bcd(0x23), 23);
        assert_eq!(from_bcd(0x31), 31);
    }

    #[test]
    fn test_bcd_out_of_domain_does_not_panic() {
        let _ = to_bcd(255);
        let _ = from_bcd(0xFF);
    }

    #[test]
    fn test_day_date_select_conversions() {
        assert_eq!(DayDateSelect::from(0), DayDateSelect::Date);
        assert_eq!(DayDateSelect::from(1), DayDateSelect::Day);
        assert_eq!(u8::from(DayDateSelect::Date), 0);
        assert_eq!(u8::from(DayDateSelect::Day), 1);
    }

    #[test]
    #[should_panic(expected = "Invalid value for DayDateSelect: 2")]
    fn test_invalid_day_date_select_conversion() {
        let _ = DayDateSelect::from(2);
    }

    #[test]
    #[should_panic(expected = "Invalid value for SquareWaveFrequency: 4")]
    fn test_invalid_square_wave_frequency_conversion() {
        let _ = SquareWaveFrequency::from(4);
    }

    #[test]
    fn test_hours_register_twenty_four_hour() {
        let hours = Hours::from(0x23);
        assert_eq!(
            hours.time_representation(),
            TimeRepresentation::TwentyFourHour
        );
        assert_eq!(hours.hour(), 23);
        assert_eq!(Hours::from(0x00).hour(), 0);
        assert_eq!(Hours::from(0x14).hour(), 14);
    }

    #[test]
    fn test_hours_register_twelve_hour() {
        // 12 AM
        assert_eq!(Hours::from(0b0101_0010).hour(), 0);
        // 11 AM
        assert_eq!(Hours::from(0b0101_0001).hour(), 11);
        // 12 PM
        assert_eq!(Hours::from(0b0111_0010).hour(), 12);
        // 2 PM
        assert_eq!(Hours::from(0b0110_0010).hour(), 14);
    }

    #[test]
    fn test_month_register_century() {
        let month = Month::from(0x86);
        assert!(month.century());
        assert_eq!(month.month_bcd(), 0x06);

        let month = Month::from(0x12);
        assert!(!month.century());
        assert_eq!(from_bcd(month.month_bcd()), 12);
    }

    #[test]
    fn test_control_register_bitfield_operations() {
        let mut control = Control::default();
        control.set_alarm1_interrupt_enable(true);
        control.set_battery_backed_square_wave(true);
        assert_eq!(u8::from(control), 0b0100_0001);

        control.set_square_wave_frequency(SquareWaveFrequency::Hz8192);
        control.set_interrupt_control(InterruptControl::Interrupt);
        assert_eq!(u8::from(control), 0b0101_1101);

        control.set_oscillator_enable(Oscillator::Disabled);
        assert_eq!(control.oscillator_enable(), Oscillator::Disabled);
        assert_eq!(u8::from(control), 0b1101_1101);

        control.set_battery_backed_square_wave(false);
        assert_eq!(u8::from(control), 0b1001_1101);
    }

    #[test]
    fn test_status_register_conversions() {
        let status = Status::from(0b1000_1111);
        assert!(status.oscillator_stop_flag());
        assert!(status.enable_32khz_output());
        assert!(status.busy());
        assert!(status.alarm2_flag());
        assert!(status.alarm1_flag());

        let mut status = Status::from(0);
        status.set_enable_32khz_output(true);
        assert_eq!(u8::from(status), 0x08);
        assert_eq!(u8::from(status.with_flags_kept()), 0x8B);
        assert_eq!(u8::from(Status::from(0x04).with_flags_kept()), 0x87);
    }

    #[test]
    fn test_temperature_registers() {
        assert_eq!(Temperature::from(0x19).temperature(), 25);
        assert_eq!(Temperature::from(0xF6).temperature(), -10);
        assert_eq!(TemperatureFraction::from(0x40).quarters(), 1);
        assert_eq!(TemperatureFraction::from(0xC0).quarters(), 3);
        assert_eq!(TemperatureFraction::from(0x3F).quarters(), 0);
    }

    #[test]
    fn test_aging_offset_register() {
        let mut offset = AgingOffset::default();
        offset.set_aging_offset(-5);
        assert_eq!(u8::from(offset), 0xFB);
        assert_eq!(AgingOffset::from(0x7F).aging_offset(), 127);
    }

    #[test]
    fn test_alarm_register_bitfield_operations() {
        let mut time = AlarmTime::default();
        time.set_value(to_bcd(45));
        time.set_mask(true);
        assert_eq!(u8::from(time), 0xC5);
        assert_eq!(from_bcd(AlarmTime::from(0xC5).value()), 45);

        let mut day_date = AlarmDayDate::default();
        day_date.set_day_date_select(DayDateSelect::Day);
        day_date.set_weekday(5);
        assert_eq!(u8::from(day_date), 0x45);
        assert_eq!(day_date.day(), 5);

        let day_date = AlarmDayDate::from(0x31);
        assert_eq!(day_date.day_date_select(), DayDateSelect::Date);
        assert_eq!(day_date.day(), 31);
        assert!(!day_date.mask());
        assert!(AlarmDayDate::from(0x80).mask());
    }
}
