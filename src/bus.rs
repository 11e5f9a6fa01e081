//! Software two-wire (I2C) master over two open-drain GPIO lines.
//!
//! [`SoftI2c`] drives SDA and SCL by hand: `set_low` pulls a line down and
//! `set_high` releases it to the pull-up. Every transfer is framed by its own
//! start and stop condition; the master never issues a repeated start and
//! never retries. Through [`I2c::transaction`], adjacent operations of the
//! same direction share one frame and a change of direction starts a new one.
//!
//! ```ignore
//! let mut bus = SoftI2c::new(sda, scl, delay, BusConfig::default())?;
//! let mut msg = [0xD0, 0x0E];
//! bus.transceive(&mut msg, 2)?;
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

use crate::timing::{BusSpeed, Timing};

/// Direction bit of the address byte (set = read).
pub const READ_BIT: u8 = 0x01;

/// Errors reported by the software bus master.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The message holds no payload after the address byte
    NoData,
    /// The requested length exceeds the buffer
    DataOutOfBounds,
    /// SDA fell while SCL was high (foreign start condition)
    UnexpectedStart,
    /// SDA rose while SCL was high (foreign stop condition)
    UnexpectedStop,
    /// A line the master released reads low
    UnexpectedCollision,
    /// The target did not acknowledge a data byte
    NoAckOnData,
    /// The target did not acknowledge its address
    NoAckOnAddress,
    /// The lines did not show a start condition after it was generated
    MissingStart,
    /// The lines did not return high after the stop condition
    MissingStop,
    /// SCL never rose within the configured number of polls
    SclTimeout,
    /// A GPIO operation failed
    Pin,
}

impl BusError {
    /// Numeric state code for this error.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            BusError::NoData => 0x00,
            BusError::DataOutOfBounds => 0x01,
            BusError::UnexpectedStart => 0x02,
            BusError::UnexpectedStop => 0x03,
            BusError::UnexpectedCollision => 0x04,
            BusError::NoAckOnData => 0x05,
            BusError::NoAckOnAddress => 0x06,
            BusError::MissingStart => 0x07,
            BusError::MissingStop => 0x08,
            BusError::SclTimeout => 0x09,
            BusError::Pin => 0x0A,
        }
    }
}

impl i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self {
            BusError::NoAckOnAddress => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            BusError::NoAckOnData => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            BusError::UnexpectedCollision => ErrorKind::ArbitrationLoss,
            BusError::UnexpectedStart
            | BusError::UnexpectedStop
            | BusError::MissingStart
            | BusError::MissingStop => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

/// Runtime configuration of the software bus master.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Speed regime
    pub speed: BusSpeed,
    /// Reference clock rate in kHz used to quantize the bus intervals
    pub clock_khz: u32,
    /// Maximum number of polls while waiting for SCL to rise, `None` waits forever
    pub scl_timeout: Option<u32>,
    /// Sample SDA twice per clock and report foreign starts, stops and collisions
    pub detect_noise: bool,
    /// Confirm the line levels after generating start and stop conditions
    pub verify_signals: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            speed: BusSpeed::Fast,
            clock_khz: 4000,
            scl_timeout: None,
            detect_noise: true,
            verify_signals: true,
        }
    }
}

/// Payload of a single framed transfer.
#[derive(Debug)]
pub enum Payload<'a> {
    /// Bytes sent to the target after the address
    Write(&'a [u8]),
    /// Buffer filled from the target after the address
    Read(&'a mut [u8]),
}

/// Bit-banged two-wire bus master.
pub struct SoftI2c<SDA, SCL, D> {
    sda: SDA,
    scl: SCL,
    delay: D,
    timing: Timing,
    config: BusConfig,
    last_error: Option<BusError>,
}

impl<SDA, SCL, D> SoftI2c<SDA, SCL, D>
where
    SDA: InputPin + OutputPin,
    SCL: InputPin + OutputPin,
    D: DelayNs,
{
    /// Takes ownership of the lines and releases both of them.
    pub fn new(sda: SDA, scl: SCL, delay: D, config: BusConfig) -> Result<Self, BusError> {
        let mut bus = Self {
            sda,
            scl,
            delay,
            timing: Timing::new(config.speed, config.clock_khz),
            config,
            last_error: None,
        };
        bus.release_sda()?;
        bus.release_scl()?;
        debug!(
            "TWI: ready, low {}ns high {}ns",
            bus.timing.low_ns(),
            bus.timing.high_ns()
        );
        Ok(bus)
    }

    /// The error of the most recent transfer, if it failed.
    pub fn last_error(&self) -> Option<BusError> {
        self.last_error
    }

    /// The bus intervals in use.
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// The configuration in use.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Gives back the lines and the delay.
    pub fn free(self) -> (SDA, SCL, D) {
        (self.sda, self.scl, self.delay)
    }

    /// Sends or receives `msg[1..len]` framed by one start and one stop.
    ///
    /// `msg[0]` is the address byte; bit 0 selects the direction (1 = read).
    /// For reads the received bytes overwrite `msg[1..len]`.
    pub fn transceive(&mut self, msg: &mut [u8], len: usize) -> Result<(), BusError> {
        self.last_error = None;
        if len > msg.len() {
            return Err(self.record(BusError::DataOutOfBounds));
        }
        if len < 2 {
            return Err(self.record(BusError::NoData));
        }
        let (head, rest) = msg[..len].split_at_mut(1);
        let address = head[0];
        if address & READ_BIT != 0 {
            self.transfer(address, Payload::Read(rest))
        } else {
            self.transfer(address, Payload::Write(rest))
        }
    }

    /// Runs one framed transfer to the raw address byte `address`.
    ///
    /// On a missing acknowledge the transfer stops immediately: no further
    /// clocks and no stop condition.
    pub fn transfer(&mut self, address: u8, payload: Payload<'_>) -> Result<(), BusError> {
        let mut operations = [match payload {
            Payload::Write(data) => Operation::Write(data),
            Payload::Read(buffer) => Operation::Read(buffer),
        }];
        self.transfer_run(address, &mut operations)
    }

    /// One frame carrying every operation of `run` back to back.
    ///
    /// `run` must hold operations of the direction selected by `address`.
    fn transfer_run(&mut self, address: u8, run: &mut [Operation<'_>]) -> Result<(), BusError> {
        self.last_error = None;
        trace!("TWI: transfer to {:#x}", address);
        self.frame(address, run).map_err(|error| self.record(error))
    }

    fn frame(&mut self, address: u8, run: &mut [Operation<'_>]) -> Result<(), BusError> {
        let reading: usize = run
            .iter()
            .map(|operation| match operation {
                Operation::Read(buffer) => buffer.len(),
                Operation::Write(_) => 0,
            })
            .sum();
        // the last byte read must be NACKed, so a read needs at least one
        if address & READ_BIT != 0 && reading == 0 {
            return Err(BusError::NoData);
        }

        self.release_bus()?;
        self.start()?;
        if !self.write_byte(address)? {
            return Err(BusError::NoAckOnAddress);
        }
        let mut received = 0;
        for operation in run.iter_mut() {
            match operation {
                Operation::Write(data) => {
                    for &byte in data.iter() {
                        if !self.write_byte(byte)? {
                            return Err(BusError::NoAckOnData);
                        }
                    }
                }
                Operation::Read(buffer) => {
                    for slot in buffer.iter_mut() {
                        received += 1;
                        *slot = self.read_byte(received < reading)?;
                    }
                }
            }
        }
        self.stop()
    }

    fn record(&mut self, error: BusError) -> BusError {
        warn!("TWI: transfer failed: {:?}", error);
        self.last_error = Some(error);
        error
    }

    fn release_bus(&mut self) -> Result<(), BusError> {
        self.release_sda()?;
        self.release_scl()?;
        self.wait_scl_high()?;
        self.timing.wait_low(&mut self.delay);
        if self.config.detect_noise && !self.sda_is_high()? {
            return Err(BusError::UnexpectedCollision);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), BusError> {
        self.drive_sda_low()?;
        self.timing.wait_high(&mut self.delay);
        if self.config.verify_signals && (self.sda_is_high()? || !self.scl_is_high()?) {
            return Err(BusError::MissingStart);
        }
        self.drive_scl_low()
    }

    fn stop(&mut self) -> Result<(), BusError> {
        self.drive_sda_low()?;
        self.timing.wait_low(&mut self.delay);
        self.release_scl()?;
        self.wait_scl_high()?;
        self.timing.wait_high(&mut self.delay);
        self.release_sda()?;
        self.timing.wait_low(&mut self.delay);
        if self.config.verify_signals && (!self.sda_is_high()? || !self.scl_is_high()?) {
            return Err(BusError::MissingStop);
        }
        Ok(())
    }

    /// Shifts out one byte MSB first and returns whether it was acknowledged.
    fn write_byte(&mut self, byte: u8) -> Result<bool, BusError> {
        for bit in (0..8).rev() {
            let level = (byte >> bit) & 1 == 1;
            if level {
                self.release_sda()?;
            } else {
                self.drive_sda_low()?;
            }
            self.clock(Some(level))?;
        }
        self.release_sda()?;
        let nack = self.clock(None)?;
        Ok(!nack)
    }

    /// Shifts in one byte MSB first, then acknowledges it if `ack`.
    fn read_byte(&mut self, ack: bool) -> Result<u8, BusError> {
        self.release_sda()?;
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | u8::from(self.clock(None)?);
        }
        if ack {
            self.drive_sda_low()?;
        } else {
            self.release_sda()?;
        }
        self.clock(Some(!ack))?;
        self.release_sda()?;
        Ok(byte)
    }

    /// One SCL pulse. Returns the SDA level sampled after the rising edge.
    ///
    /// `driven` is the level the master put on SDA, `None` when the target
    /// owns the line for this bit.
    fn clock(&mut self, driven: Option<bool>) -> Result<bool, BusError> {
        self.timing.wait_low(&mut self.delay);
        self.release_scl()?;
        self.wait_scl_high()?;
        let first = self.sda_is_high()?;
        self.timing.wait_high(&mut self.delay);
        let second = self.sda_is_high()?;
        self.drive_scl_low()?;

        if self.config.detect_noise {
            if driven == Some(true) && !first {
                return Err(BusError::UnexpectedCollision);
            }
            if first && !second {
                return Err(BusError::UnexpectedStart);
            }
            if !first && second {
                return Err(BusError::UnexpectedStop);
            }
        }
        Ok(first)
    }

    fn wait_scl_high(&mut self) -> Result<(), BusError> {
        let mut polls: u32 = 0;
        loop {
            if self.scl_is_high()? {
                return Ok(());
            }
            if let Some(limit) = self.config.scl_timeout {
                if polls >= limit {
                    return Err(BusError::SclTimeout);
                }
                polls += 1;
            }
        }
    }

    fn release_sda(&mut self) -> Result<(), BusError> {
        self.sda.set_high().map_err(|_| BusError::Pin)
    }

    fn drive_sda_low(&mut self) -> Result<(), BusError> {
        self.sda.set_low().map_err(|_| BusError::Pin)
    }

    fn release_scl(&mut self) -> Result<(), BusError> {
        self.scl.set_high().map_err(|_| BusError::Pin)
    }

    fn drive_scl_low(&mut self) -> Result<(), BusError> {
        self.scl.set_low().map_err(|_| BusError::Pin)
    }

    fn sda_is_high(&mut self) -> Result<bool, BusError> {
        self.sda.is_high().map_err(|_| BusError::Pin)
    }

    fn scl_is_high(&mut self) -> Result<bool, BusError> {
        self.scl.is_high().map_err(|_| BusError::Pin)
    }
}

impl<SDA, SCL, D> i2c::ErrorType for SoftI2c<SDA, SCL, D> {
    type Error = BusError;
}

impl<SDA, SCL, D> I2c<SevenBitAddress> for SoftI2c<SDA, SCL, D>
where
    SDA: InputPin + OutputPin,
    SCL: InputPin + OutputPin,
    D: DelayNs,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut rest = operations;
        while let Some(first) = rest.first() {
            let read = matches!(first, Operation::Read(_));
            let len = rest
                .iter()
                .take_while(|operation| matches!(operation, Operation::Read(_)) == read)
                .count();
            let (run, tail) = core::mem::take(&mut rest).split_at_mut(len);
            let direction = if read { READ_BIT } else { 0 };
            self.transfer_run((address << 1) | direction, run)?;
            rest = tail;
        }
        Ok(())
    }
}
