//! Simulated open-drain bus with a DS3231 register file on the far end.
//!
//! Both lines are wired-AND: a line reads high only when neither the master,
//! the target nor an injected fault pulls it low. The target reacts to SCL
//! edges the way the chip does: it samples SDA on rising edges and changes SDA
//! only on falling edges.

extern crate alloc;

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal_mock::eh1::delay::NoopDelay;

use crate::bus::{BusConfig, SoftI2c};
use crate::registers::{RegAddr, REGISTER_COUNT};
use crate::DEVICE_ADDRESS;

const STATUS: usize = RegAddr::ControlStatus as usize;
const STICKY_FLAGS: u8 = 0x83;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Target {
    Idle,
    Address,
    WriteData,
    AckOut { ack: bool, read: bool },
    Transmitting,
    AckIn,
}

pub(crate) struct SimBus {
    master_sda_low: bool,
    master_scl_low: bool,
    target_sda_low: bool,
    sda: bool,
    scl: bool,
    state: Target,
    shift: u8,
    bits: u8,
    data_bytes: usize,
    pointer: u8,
    master_acked: bool,
    reads_this_high: u32,

    pub registers: [u8; REGISTER_COUNT as usize],
    pub nack_address: bool,
    pub nack_data_byte: Option<usize>,

    pub scl_stuck_low: bool,
    pub sda_stuck_low: bool,
    pub sda_ignores_master: bool,
    pub hold_sda_low_from_clock: Option<u32>,
    pub sda_glitch: Option<(u32, bool)>,

    pub scl_rises: u32,
    pub starts: u32,
    pub stops: u32,
    /// Acknowledge bit of every byte the master received, in order.
    pub master_acks: Vec<bool>,
}

impl SimBus {
    fn new() -> Self {
        Self {
            master_sda_low: false,
            master_scl_low: false,
            target_sda_low: false,
            sda: true,
            scl: true,
            state: Target::Idle,
            shift: 0,
            bits: 0,
            data_bytes: 0,
            pointer: 0,
            master_acked: false,
            reads_this_high: 0,
            registers: [0; REGISTER_COUNT as usize],
            nack_address: false,
            nack_data_byte: None,
            scl_stuck_low: false,
            sda_stuck_low: false,
            sda_ignores_master: false,
            hold_sda_low_from_clock: None,
            sda_glitch: None,
            scl_rises: 0,
            starts: 0,
            stops: 0,
            master_acks: Vec::new(),
        }
    }

    fn scl_level(&self) -> bool {
        !(self.master_scl_low || self.scl_stuck_low)
    }

    fn sda_level(&self) -> bool {
        let held = self
            .hold_sda_low_from_clock
            .is_some_and(|clock| self.scl_rises >= clock);
        let master = self.master_sda_low && !self.sda_ignores_master;
        !(master || self.target_sda_low || self.sda_stuck_low || held)
    }

    fn update(&mut self) {
        let scl = self.scl_level();
        if scl != self.scl {
            self.scl = scl;
            if scl {
                self.scl_rises += 1;
                self.reads_this_high = 0;
                self.on_scl_rise();
            } else {
                self.on_scl_fall();
            }
        }
        let sda = self.sda_level();
        if sda != self.sda {
            self.sda = sda;
            if self.scl {
                if sda {
                    self.on_stop();
                } else {
                    self.on_start();
                }
            }
        }
    }

    fn on_start(&mut self) {
        self.starts += 1;
        self.state = Target::Address;
        self.shift = 0;
        self.bits = 0;
        self.data_bytes = 0;
    }

    fn on_stop(&mut self) {
        self.stops += 1;
        self.state = Target::Idle;
        self.target_sda_low = false;
    }

    fn on_scl_rise(&mut self) {
        match self.state {
            Target::Address | Target::WriteData => {
                self.shift = (self.shift << 1) | u8::from(self.sda);
                self.bits += 1;
            }
            Target::AckIn => {
                self.master_acked = !self.sda;
                self.master_acks.push(self.master_acked);
            }
            _ => {}
        }
    }

    fn on_scl_fall(&mut self) {
        match self.state {
            Target::Address if self.bits == 8 => {
                let byte = self.shift;
                let ack = (byte >> 1) == DEVICE_ADDRESS && !self.nack_address;
                self.state = Target::AckOut {
                    ack,
                    read: ack && (byte & 1) == 1,
                };
                self.target_sda_low = ack;
            }
            Target::WriteData if self.bits == 8 => {
                let byte = self.shift;
                if self.data_bytes == 0 {
                    self.pointer = byte % REGISTER_COUNT;
                } else {
                    let register = usize::from(self.pointer);
                    self.registers[register] = if register == STATUS {
                        // OSF, A2F and A1F can only be cleared
                        let kept = self.registers[register] & byte & STICKY_FLAGS;
                        kept | (byte & !STICKY_FLAGS)
                    } else {
                        byte
                    };
                    self.pointer = (self.pointer + 1) % REGISTER_COUNT;
                }
                let ack = self.nack_data_byte != Some(self.data_bytes);
                self.data_bytes += 1;
                self.state = Target::AckOut { ack, read: false };
                self.target_sda_low = ack;
            }
            Target::AckOut { ack, read } => {
                self.target_sda_low = false;
                if !ack {
                    self.state = Target::Idle;
                } else if read {
                    self.load_next();
                } else {
                    self.state = Target::WriteData;
                    self.shift = 0;
                    self.bits = 0;
                }
            }
            Target::Transmitting => {
                if self.bits == 8 {
                    self.target_sda_low = false;
                    self.state = Target::AckIn;
                } else {
                    self.put_bit();
                }
            }
            Target::AckIn => {
                if self.master_acked {
                    self.load_next();
                } else {
                    self.state = Target::Idle;
                }
            }
            _ => {}
        }
    }

    fn load_next(&mut self) {
        self.shift = self.registers[usize::from(self.pointer)];
        self.pointer = (self.pointer + 1) % REGISTER_COUNT;
        self.bits = 0;
        self.state = Target::Transmitting;
        self.put_bit();
    }

    fn put_bit(&mut self) {
        let bit = (self.shift >> (7 - self.bits)) & 1;
        self.target_sda_low = bit == 0;
        self.bits += 1;
    }

    fn drive(&mut self, line: Line, low: bool) {
        match line {
            Line::Sda => self.master_sda_low = low,
            Line::Scl => self.master_scl_low = low,
        }
        self.update();
    }

    fn read(&mut self, line: Line) -> bool {
        self.update();
        match line {
            Line::Scl => self.scl,
            Line::Sda => {
                let index = self.reads_this_high;
                self.reads_this_high += 1;
                match self.sda_glitch {
                    Some((clock, level)) if self.scl && clock == self.scl_rises && index >= 1 => {
                        level
                    }
                    _ => self.sda,
                }
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Line {
    Sda,
    Scl,
}

/// One open-drain line of a [`SimBus`].
pub(crate) struct SimPin {
    bus: Rc<RefCell<SimBus>>,
    line: Line,
}

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bus.borrow_mut().drive(self.line, true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bus.borrow_mut().drive(self.line, false);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.bus.borrow_mut().read(self.line))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_high()?)
    }
}

pub(crate) type SimI2c = SoftI2c<SimPin, SimPin, NoopDelay>;

pub(crate) fn sim_bus_with(config: BusConfig) -> (Rc<RefCell<SimBus>>, SimI2c) {
    let sim = Rc::new(RefCell::new(SimBus::new()));
    let sda = SimPin {
        bus: Rc::clone(&sim),
        line: Line::Sda,
    };
    let scl = SimPin {
        bus: Rc::clone(&sim),
        line: Line::Scl,
    };
    let bus = match SoftI2c::new(sda, scl, NoopDelay::new(), config) {
        Ok(bus) => bus,
        Err(error) => panic!("simulated bus failed to start: {:?}", error),
    };
    (sim, bus)
}

pub(crate) fn sim_bus() -> (Rc<RefCell<SimBus>>, SimI2c) {
    sim_bus_with(BusConfig::default())
}
