//! Calendar time and the DS3231's seven time-keeping registers.
//!
//! The chip keeps seconds, minutes, hours, day of week, date, month and year as
//! BCD in registers 0x00-0x06. Bit 7 of the month register is the century
//! flag: clear means 1900-1999, set means 2000-2099.
//!
//! Writes always use the 24-hour layout. Reads accept either layout, so a
//! clock left in 12-hour mode by other software still decodes correctly.
//!
//! Conversion errors are reported via [`DS3231DateTimeError`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::registers::{from_bcd, to_bcd, Hours, Month, TimeRepresentation};

/// Calendar time as kept by the DS3231.
///
/// `twelve_hour` and `am` are derived from `hour` and are ignored on writes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Time {
    /// Seconds (0-59)
    pub second: u8,
    /// Minutes (0-59)
    pub minute: u8,
    /// Hour of the day (0-23)
    pub hour: u8,
    /// Day of the month (1-31)
    pub day: u8,
    /// Month (1-12)
    pub month: u8,
    /// Year (1900-2099)
    pub year: u16,
    /// Day of the week (1-7, 1 = Sunday)
    pub weekday: u8,
    /// Hour on the 12-hour dial (0-11)
    pub twelve_hour: u8,
    /// Before noon
    pub am: bool,
}

impl Time {
    /// Builds a time, deriving the 12-hour fields from `hour`.
    #[must_use]
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8, weekday: u8) -> Self {
        let (twelve_hour, am) = twelve_hour(hour);
        Self {
            second,
            minute,
            hour,
            day,
            month,
            year,
            weekday,
            twelve_hour,
            am,
        }
    }

    /// Converts a chrono `NaiveDateTime`; the weekday counts Sunday as 1.
    pub fn from_datetime(datetime: &NaiveDateTime) -> Result<Self, DS3231DateTimeError> {
        let year = u16::try_from(datetime.year())
            .ok()
            .filter(|year| (1900..=2099).contains(year))
            .ok_or(DS3231DateTimeError::YearOutOfRange)?;
        let narrow = |v: u32| u8::try_from(v).map_err(|_| DS3231DateTimeError::InvalidDateTime);
        let weekday = datetime.weekday().number_from_sunday();
        Ok(Self::new(
            year,
            narrow(datetime.month())?,
            narrow(datetime.day())?,
            narrow(datetime.hour())?,
            narrow(datetime.minute())?,
            narrow(datetime.second())?,
            narrow(weekday)?,
        ))
    }

    /// Converts to a chrono `NaiveDateTime`. The weekday is not checked.
    pub fn to_datetime(&self) -> Result<NaiveDateTime, DS3231DateTimeError> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .and_then(|date| {
            date.and_hms_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
            )
        })
        .ok_or(DS3231DateTimeError::InvalidDateTime)
    }
}

/// Splits a 24-hour value into the 12-hour dial position and the AM flag.
///
/// 0 maps to (0, AM) and 12 to (0, PM).
#[must_use]
pub fn twelve_hour(hour: u8) -> (u8, bool) {
    (hour % 12, hour < 12)
}

/// The seven time-keeping registers, 0x00 through 0x06.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct DS3231DateTime {
    seconds: u8,
    minutes: u8,
    hours: Hours,
    day: u8,
    date: u8,
    month: Month,
    year: u8,
}

impl DS3231DateTime {
    /// Helper function to convert a number to BCD format with validation
    pub(crate) fn make_bcd(value: u8, min: u8, max: u8) -> Result<u8, DS3231DateTimeError> {
        if value < min || value > max {
            return Err(DS3231DateTimeError::InvalidDateTime);
        }
        Ok(to_bcd(value))
    }

    pub(crate) fn convert_hours(hour: u8) -> Result<Hours, DS3231DateTimeError> {
        let mut value = Hours::default();
        value.set_time_representation(TimeRepresentation::TwentyFourHour);
        value.set_twenty_four_hour_bcd(Self::make_bcd(hour, 0, 23)?);
        Ok(value)
    }

    fn convert_year(year: u16) -> Result<(u8, bool), DS3231DateTimeError> {
        if !(1900..=2099).contains(&year) {
            error!("DS3231: year {} is outside 1900-2099", year);
            return Err(DS3231DateTimeError::YearOutOfRange);
        }
        let century = year >= 2000;
        let offset = if century { year - 2000 } else { year - 1900 };
        let offset = u8::try_from(offset).map_err(|_| DS3231DateTimeError::YearOutOfRange)?;
        Ok((to_bcd(offset), century))
    }

    /// Encodes `time`; the 12-hour fields are ignored.
    pub(crate) fn from_time(time: &Time) -> Result<Self, DS3231DateTimeError> {
        let mut month = Month::default();
        month.set_month_bcd(Self::make_bcd(time.month, 1, 12)?);
        let (year, century) = Self::convert_year(time.year)?;
        month.set_century(century);

        Ok(DS3231DateTime {
            seconds: Self::make_bcd(time.second, 0, 59)?,
            minutes: Self::make_bcd(time.minute, 0, 59)?,
            hours: Self::convert_hours(time.hour)?,
            day: Self::make_bcd(time.weekday, 1, 7)?,
            date: Self::make_bcd(time.day, 1, 31)?,
            month,
            year,
        })
    }

    /// Decodes the registers. Never fails; garbage in gives garbage out.
    pub(crate) fn into_time(self) -> Time {
        let century = if self.month.century() { 2000 } else { 1900 };
        Time::new(
            century + u16::from(from_bcd(self.year)),
            from_bcd(self.month.month_bcd()),
            from_bcd(self.date & 0x3F),
            self.hours.hour(),
            from_bcd(self.minutes & 0x7F),
            from_bcd(self.seconds & 0x7F),
            self.day & 0x07,
        )
    }
}

impl From<[u8; 7]> for DS3231DateTime {
    fn from(data: [u8; 7]) -> Self {
        DS3231DateTime {
            seconds: data[0],
            minutes: data[1],
            hours: Hours::from(data[2]),
            day: data[3],
            date: data[4],
            month: Month::from(data[5]),
            year: data[6],
        }
    }
}

impl From<&DS3231DateTime> for [u8; 7] {
    fn from(dt: &DS3231DateTime) -> [u8; 7] {
        [
            dt.seconds,
            dt.minutes,
            u8::from(dt.hours),
            dt.day,
            dt.date,
            u8::from(dt.month),
            dt.year,
        ]
    }
}

/// Encodes hours, minutes and seconds as registers 0x00-0x02.
pub(crate) fn encode_hms(hour: u8, minute: u8, second: u8) -> Result<[u8; 3], DS3231DateTimeError> {
    Ok([
        DS3231DateTime::make_bcd(second, 0, 59)?,
        DS3231DateTime::make_bcd(minute, 0, 59)?,
        u8::from(DS3231DateTime::convert_hours(hour)?),
    ])
}

/// Decodes registers 0x00-0x02 into (hour, minute, second).
pub(crate) fn decode_hms(data: [u8; 3]) -> (u8, u8, u8) {
    (
        Hours::from(data[2]).hour(),
        from_bcd(data[1] & 0x7F),
        from_bcd(data[0] & 0x7F),
    )
}

/// Errors that can occur during DS3231 date/time conversion or validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DS3231DateTimeError {
    /// A field is out of range or the date does not exist
    InvalidDateTime,
    /// The year is outside 1900-2099
    YearOutOfRange,
}
