//! Alarm configuration for the DS3231 RTC.
//!
//! Each alarm register holds a BCD value and a mask bit in bit 7. A set mask
//! bit takes the register out of the match, so the mode of an alarm is the
//! pattern of mask bits:
//!
//! | Mode           | seconds | minutes | hours | day |
//! |----------------|---------|---------|-------|-----|
//! | `EverySecond`  | 1       | 1       | 1     | 1   |
//! | `SecondsMatch` | 0       | 1       | 1     | 1   |
//! | `MinutesMatch` | 0       | 0       | 1     | 1   |
//! | `HoursMatch`   | 0       | 0       | 0     | 1   |
//! | `DateMatch`    | 0       | 0       | 0     | 0   |
//! | `WeekdayMatch` | 0       | 0       | 0     | 0   |
//! | `EveryMinute`  | -       | 1       | 1     | 1   |
//!
//! `WeekdayMatch` also sets the DY/DT bit of the day register. Alarm 2 has no
//! seconds register and fires at 00 seconds of the matching minute.

use crate::datetime::Time;
use crate::registers::{from_bcd, to_bcd, AlarmDayDate, AlarmTime, DayDateSelect, Hours, RegAddr};

/// Error type for alarm configuration operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmError {
    /// Invalid time component value
    InvalidTime(&'static str),
    /// Invalid day of week (must be 1-7)
    InvalidDayOfWeek,
    /// Invalid date of month (must be 1-31)
    InvalidDateOfMonth,
    /// The mode is not available on this alarm
    UnsupportedMode,
}

/// One of the two alarms of the DS3231.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmSlot {
    /// Alarm 1, seconds resolution
    Alarm1,
    /// Alarm 2, minutes resolution
    Alarm2,
}

impl AlarmSlot {
    /// First register of the slot.
    pub(crate) fn first_register(self) -> RegAddr {
        match self {
            AlarmSlot::Alarm1 => RegAddr::Alarm1Seconds,
            AlarmSlot::Alarm2 => RegAddr::Alarm2Minutes,
        }
    }

    /// Number of registers the slot occupies.
    pub(crate) fn register_count(self) -> usize {
        match self {
            AlarmSlot::Alarm1 => 4,
            AlarmSlot::Alarm2 => 3,
        }
    }

    /// Whether `mode` can be programmed into this slot.
    #[must_use]
    pub fn supports(self, mode: AlarmMode) -> bool {
        match mode {
            AlarmMode::EverySecond | AlarmMode::SecondsMatch => self == AlarmSlot::Alarm1,
            AlarmMode::EveryMinute => self == AlarmSlot::Alarm2,
            _ => true,
        }
    }
}

/// Match mode of an alarm, finest to coarsest.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmMode {
    /// Fire every second (alarm 1)
    EverySecond = 0,
    /// Fire when the seconds match (alarm 1)
    SecondsMatch = 1,
    /// Fire when minutes (and seconds) match
    MinutesMatch = 2,
    /// Fire when hours, minutes (and seconds) match
    HoursMatch = 3,
    /// Fire when date of month and time match
    DateMatch = 4,
    /// Fire when day of week and time match
    WeekdayMatch = 5,
    /// Fire every minute (alarm 2)
    EveryMinute = 6,
}

impl AlarmMode {
    /// Mask bits as `[seconds, minutes, hours, day]`.
    #[must_use]
    pub const fn masks(self) -> [bool; 4] {
        match self {
            AlarmMode::EverySecond | AlarmMode::EveryMinute => [true, true, true, true],
            AlarmMode::SecondsMatch => [false, true, true, true],
            AlarmMode::MinutesMatch => [false, false, true, true],
            AlarmMode::HoursMatch => [false, false, false, true],
            AlarmMode::DateMatch | AlarmMode::WeekdayMatch => [false, false, false, false],
        }
    }
}

impl TryFrom<u8> for AlarmMode {
    type Error = AlarmError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AlarmMode::EverySecond),
            1 => Ok(AlarmMode::SecondsMatch),
            2 => Ok(AlarmMode::MinutesMatch),
            3 => Ok(AlarmMode::HoursMatch),
            4 => Ok(AlarmMode::DateMatch),
            5 => Ok(AlarmMode::WeekdayMatch),
            6 => Ok(AlarmMode::EveryMinute),
            _ => Err(AlarmError::UnsupportedMode),
        }
    }
}

impl From<AlarmMode> for u8 {
    fn from(v: AlarmMode) -> Self {
        v as u8
    }
}

/// An alarm setting.
///
/// `day` is a day of the week (1-7) for [`AlarmMode::WeekdayMatch`] and a
/// date of the month otherwise. Fields a mode does not match on are still
/// stored in the registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm {
    /// Day of week or date of month
    pub day: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-59), ignored by alarm 2
    pub second: u8,
    /// Match mode
    pub mode: AlarmMode,
}

impl Alarm {
    /// Creates an alarm setting.
    #[must_use]
    pub fn new(mode: AlarmMode, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            day,
            hour,
            minute,
            second,
            mode,
        }
    }

    /// Takes the alarm fields from `time`; the day is the weekday for
    /// [`AlarmMode::WeekdayMatch`] and the date otherwise.
    #[must_use]
    pub fn at(time: &Time, mode: AlarmMode) -> Self {
        let day = if mode == AlarmMode::WeekdayMatch {
            time.weekday
        } else {
            time.day
        };
        Self::new(mode, day, time.hour, time.minute, time.second)
    }

    /// Checks the setting against the ranges the chip can represent.
    pub fn validate(&self, slot: AlarmSlot) -> Result<(), AlarmError> {
        if !slot.supports(self.mode) {
            return Err(AlarmError::UnsupportedMode);
        }
        if self.hour > 23 {
            return Err(AlarmError::InvalidTime("hour must be 0-23"));
        }
        if self.minute > 59 {
            return Err(AlarmError::InvalidTime("minute must be 0-59"));
        }
        if slot == AlarmSlot::Alarm1 && self.second > 59 {
            return Err(AlarmError::InvalidTime("second must be 0-59"));
        }
        match self.mode {
            AlarmMode::WeekdayMatch if !(1..=7).contains(&self.day) => {
                Err(AlarmError::InvalidDayOfWeek)
            }
            AlarmMode::DateMatch if !(1..=31).contains(&self.day) => {
                Err(AlarmError::InvalidDateOfMonth)
            }
            _ => Ok(()),
        }
    }
}

/// An alarm setting together with its interrupt enable bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmState {
    /// The programmed alarm
    pub alarm: Alarm,
    /// A1IE/A2IE in the control register
    pub interrupt_enabled: bool,
}

/// Register image of one alarm.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct DS3231Alarm {
    seconds: AlarmTime,
    minutes: AlarmTime,
    hours: AlarmTime,
    day_date: AlarmDayDate,
}

impl DS3231Alarm {
    fn time_register(value: u8, mask: bool) -> AlarmTime {
        let mut register = AlarmTime::default();
        register.set_value(to_bcd(value) & 0x7F);
        register.set_mask(mask);
        register
    }

    pub(crate) fn from_alarm(alarm: &Alarm) -> Self {
        let [second_mask, minute_mask, hour_mask, day_mask] = alarm.mode.masks();

        let mut day_date = AlarmDayDate::default();
        if alarm.mode == AlarmMode::WeekdayMatch {
            day_date.set_day_date_select(DayDateSelect::Day);
            day_date.set_weekday(alarm.day & 0x0F);
        } else {
            day_date.set_day_date_select(DayDateSelect::Date);
            day_date.set_date_bcd(to_bcd(alarm.day) & 0x3F);
        }
        day_date.set_mask(day_mask);

        Self {
            seconds: Self::time_register(alarm.second, second_mask),
            minutes: Self::time_register(alarm.minute, minute_mask),
            hours: Self::time_register(alarm.hour, hour_mask),
            day_date,
        }
    }

    /// Decodes the mode from the coarsest register whose mask bit is clear.
    pub(crate) fn to_alarm(&self, slot: AlarmSlot) -> Alarm {
        let mode = if !self.day_date.mask() {
            match self.day_date.day_date_select() {
                DayDateSelect::Day => AlarmMode::WeekdayMatch,
                DayDateSelect::Date => AlarmMode::DateMatch,
            }
        } else if !self.hours.mask() {
            AlarmMode::HoursMatch
        } else if !self.minutes.mask() {
            AlarmMode::MinutesMatch
        } else if slot == AlarmSlot::Alarm1 && !self.seconds.mask() {
            AlarmMode::SecondsMatch
        } else if slot == AlarmSlot::Alarm1 {
            AlarmMode::EverySecond
        } else {
            AlarmMode::EveryMinute
        };

        let second = match slot {
            AlarmSlot::Alarm1 => from_bcd(self.seconds.value()),
            AlarmSlot::Alarm2 => 0,
        };

        Alarm {
            day: self.day_date.day(),
            hour: Hours::from(self.hours.value()).hour(),
            minute: from_bcd(self.minutes.value()),
            second,
            mode,
        }
    }

    /// Register bytes for `slot`, starting at [`AlarmSlot::first_register`].
    pub(crate) fn to_registers(&self, slot: AlarmSlot) -> ([u8; 4], usize) {
        match slot {
            AlarmSlot::Alarm1 => (
                [
                    self.seconds.into(),
                    self.minutes.into(),
                    self.hours.into(),
                    self.day_date.into(),
                ],
                4,
            ),
            AlarmSlot::Alarm2 => (
                [
                    self.minutes.into(),
                    self.hours.into(),
                    self.day_date.into(),
                    0,
                ],
                3,
            ),
        }
    }

    /// Builds the image from the bytes read at [`AlarmSlot::first_register`].
    pub(crate) fn from_registers(slot: AlarmSlot, data: &[u8; 4]) -> Self {
        match slot {
            AlarmSlot::Alarm1 => Self {
                seconds: AlarmTime::from(data[0]),
                minutes: AlarmTime::from(data[1]),
                hours: AlarmTime::from(data[2]),
                day_date: AlarmDayDate::from(data[3]),
            },
            AlarmSlot::Alarm2 => Self {
                seconds: AlarmTime::default(),
                minutes: AlarmTime::from(data[0]),
                hours: AlarmTime::from(data[1]),
                day_date: AlarmDayDate::from(data[2]),
            },
        }
    }
}
