//! A serial port with an SC18IM700 bridge and one I2C device behind it

#![allow(dead_code)]

use embedded_hal as hal;
use std::collections::VecDeque;

pub const I2C_OK: u8 = 0xF0;
pub const I2C_NACK_ON_ADDRESS: u8 = 0xF1;
const I2C_BUSY: u8 = 0x00;
const REG_I2C_STAT: u8 = 0x0A;

/// Serial link failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkDown;

pub struct SimulatedBridge {
    /// 7-bit address the device answers to
    pub device_address: u8,
    /// device register file
    pub regs: [u8; 256],
    /// bridge internal registers
    pub bridge_regs: [u8; 16],
    /// status reads that answer "busy" before the real status shows
    pub busy_polls: u32,
    /// every byte the host sent
    pub sent: Vec<u8>,
    /// payloads of I2C writes the device acknowledged
    pub device_writes: Vec<Vec<u8>>,
    /// fail all serial traffic
    pub link_down: bool,
    pointer: u8,
    pending: Vec<u8>,
    rx: VecDeque<u8>,
}

impl SimulatedBridge {
    pub fn new(device_address: u8) -> Self {
        let mut bridge_regs = [0u8; 16];
        bridge_regs[REG_I2C_STAT as usize] = I2C_OK;
        Self {
            device_address,
            regs: [0; 256],
            bridge_regs,
            busy_polls: 0,
            sent: Vec::new(),
            device_writes: Vec::new(),
            link_down: false,
            pointer: 0,
            pending: Vec::new(),
            rx: VecDeque::new(),
        }
    }

    /// An MPU-9250 as it comes out of reset
    pub fn mpu9250() -> Self {
        let mut sim = Self::new(0x68);
        sim.regs[0x6B] = 0x40; // PWR_MGMT_1: asleep
        sim.regs[0x75] = 0x71; // WHO_AM_I
        sim
    }

    /// Bytes queued for the host that it has not read
    pub fn unread(&self) -> usize {
        self.rx.len()
    }

    fn process(&mut self) {
        loop {
            let consumed = match self.pending.first().copied() {
                None => return,
                Some(b'S') => self.try_i2c(),
                Some(b'R') => self.try_read_reg(),
                Some(b'W') => self.try_write_regs(),
                Some(other) => panic!("bridge got stray byte 0x{:02x}", other),
            };
            match consumed {
                Some(n) => {
                    self.pending.drain(..n);
                }
                None => return,
            }
        }
    }

    fn try_i2c(&mut self) -> Option<usize> {
        if self.pending.len() < 3 {
            return None;
        }
        let addr = self.pending[1];
        let len = self.pending[2] as usize;
        let present = addr >> 1 == self.device_address;

        if addr & 0x01 == 0x01 {
            if self.pending.len() < 4 {
                return None;
            }
            assert_eq!(self.pending[3], b'P', "read frame not terminated");
            if present {
                for _ in 0..len {
                    self.rx.push_back(self.regs[self.pointer as usize]);
                    self.pointer = self.pointer.wrapping_add(1);
                }
            }
            self.set_status(present);
            Some(4)
        } else {
            if self.pending.len() < 3 + len + 1 {
                return None;
            }
            assert_eq!(self.pending[3 + len], b'P', "write frame not terminated");
            let data = self.pending[3..3 + len].to_vec();
            if present {
                if let Some((&first, rest)) = data.split_first() {
                    self.pointer = first;
                    for &b in rest {
                        self.regs[self.pointer as usize] = b;
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
                self.device_writes.push(data);
            }
            self.set_status(present);
            Some(3 + len + 1)
        }
    }

    fn try_read_reg(&mut self) -> Option<usize> {
        if self.pending.len() < 3 {
            return None;
        }
        assert_eq!(self.pending[2], b'P', "register read not terminated");
        let reg = self.pending[1];
        let val = if reg == REG_I2C_STAT && self.busy_polls > 0 {
            self.busy_polls -= 1;
            I2C_BUSY
        } else {
            self.bridge_regs[(reg & 0x0F) as usize]
        };
        self.rx.push_back(val);
        Some(3)
    }

    fn try_write_regs(&mut self) -> Option<usize> {
        let mut pairs = Vec::new();
        let mut i = 1;
        loop {
            match self.pending.get(i) {
                None => return None,
                Some(b'P') => break,
                Some(&reg) => {
                    let val = *self.pending.get(i + 1)?;
                    pairs.push((reg, val));
                    i += 2;
                }
            }
        }
        for (reg, val) in pairs {
            self.bridge_regs[(reg & 0x0F) as usize] = val;
        }
        Some(i + 1)
    }

    fn set_status(&mut self, acked: bool) {
        self.bridge_regs[REG_I2C_STAT as usize] = if acked {
            I2C_OK
        } else {
            I2C_NACK_ON_ADDRESS
        };
    }
}

impl hal::blocking::serial::Write<u8> for SimulatedBridge {
    type Error = LinkDown;

    fn bwrite_all(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        if self.link_down {
            return Err(LinkDown);
        }
        self.sent.extend_from_slice(buffer);
        self.pending.extend_from_slice(buffer);
        self.process();
        Ok(())
    }

    fn bflush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl hal::serial::Read<u8> for SimulatedBridge {
    type Error = LinkDown;

    /// An empty receive queue is a dead link rather than `WouldBlock`,
    /// so a missing reply fails the test instead of hanging it
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        if self.link_down {
            return Err(nb::Error::Other(LinkDown));
        }
        self.rx.pop_front().ok_or(nb::Error::Other(LinkDown))
    }
}
