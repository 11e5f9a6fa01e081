//! Bus timing for the software two-wire master.
//!
//! The SCL low and high periods are derived from the chip's minimum
//! requirements, rounded up to whole ticks of the configured reference clock so
//! that every interval is strictly longer than the minimum.

use embedded_hal::delay::DelayNs;

/// Bus speed regime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusSpeed {
    /// Standard mode, up to 100 kHz
    Standard,
    /// Fast mode, 100 kHz to 400 kHz
    Fast,
}

impl BusSpeed {
    /// Minimum SCL low period (tLOW) in nanoseconds.
    #[must_use]
    pub const fn min_low_ns(self) -> u32 {
        match self {
            BusSpeed::Standard => 4700,
            BusSpeed::Fast => 1300,
        }
    }

    /// Minimum SCL high period (tHIGH) in nanoseconds.
    #[must_use]
    pub const fn min_high_ns(self) -> u32 {
        match self {
            BusSpeed::Standard => 4000,
            BusSpeed::Fast => 600,
        }
    }
}

/// Low/setup and high/hold intervals for one bus speed at one clock rate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    speed: BusSpeed,
    low_ns: u32,
    high_ns: u32,
}

impl Timing {
    /// Computes the intervals for `speed` with a reference clock of `clock_khz`.
    ///
    /// A zero clock rate falls back to the raw minimums.
    #[must_use]
    pub fn new(speed: BusSpeed, clock_khz: u32) -> Self {
        Self {
            speed,
            low_ns: quantize(speed.min_low_ns(), clock_khz),
            high_ns: quantize(speed.min_high_ns(), clock_khz),
        }
    }

    /// The speed regime these intervals were computed for.
    #[must_use]
    pub fn speed(&self) -> BusSpeed {
        self.speed
    }

    /// Low/setup interval in nanoseconds.
    #[must_use]
    pub fn low_ns(&self) -> u32 {
        self.low_ns
    }

    /// High/hold interval in nanoseconds.
    #[must_use]
    pub fn high_ns(&self) -> u32 {
        self.high_ns
    }

    /// Busy-waits for the low/setup interval.
    pub fn wait_low<D: DelayNs>(&self, delay: &mut D) {
        delay.delay_ns(self.low_ns);
    }

    /// Busy-waits for the high/hold interval.
    pub fn wait_high<D: DelayNs>(&self, delay: &mut D) {
        delay.delay_ns(self.high_ns);
    }
}

// ticks = khz * ns / 1e6 + 1, then back to ns rounding up
fn quantize(min_ns: u32, clock_khz: u32) -> u32 {
    if clock_khz == 0 {
        return min_ns;
    }
    let khz = u64::from(clock_khz);
    let ticks = khz * u64::from(min_ns) / 1_000_000 + 1;
    let ns = (ticks * 1_000_000).div_ceil(khz);
    u32::try_from(ns).unwrap_or(u32::MAX)
}
