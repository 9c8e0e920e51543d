//! Addressed-register access on top of an I2C bus

use crate::interface::I2cBus;

/// A sub-byte field inside an 8-bit device register.
///
/// `msb` is the highest bit of the field (7..=0) and the field extends
/// `width` bits downwards from it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitField {
    pub reg: u8,
    pub msb: u8,
    pub width: u8,
}

impl BitField {
    pub const fn new(reg: u8, msb: u8, width: u8) -> Self {
        Self { reg, msb, width }
    }

    /// Position of the field's least significant bit
    pub fn shift(&self) -> u8 {
        debug_assert!(self.width >= 1 && self.width <= 8, "bad field width");
        debug_assert!(self.width <= self.msb + 1, "field runs past bit 0");
        self.msb + 1 - self.width
    }

    /// Mask selecting the field's bits in place
    pub fn mask(&self) -> u8 {
        (0xFFu8 >> (8 - self.width)) << self.shift()
    }

    /// Replace the field's bits in `current` with the right-aligned `value`
    pub fn insert(&self, current: u8, value: u8) -> u8 {
        let mask = self.mask();
        (current & !mask) | ((value << self.shift()) & mask)
    }

    /// Right-aligned field value from a whole register byte
    pub fn extract(&self, current: u8) -> u8 {
        (current & self.mask()) >> self.shift()
    }
}

/// Register-level helpers available on every [`I2cBus`]
pub trait RegisterAccess: I2cBus {
    /// Write a single register
    fn write_register(&mut self, address: u8, reg: u8, val: u8) -> Result<(), Self::BusError> {
        self.write(address, &[reg, val])
    }

    /// Write a raw payload; the first byte is usually the starting register
    fn write_bytes(&mut self, address: u8, data: &[u8]) -> Result<(), Self::BusError> {
        self.write(address, data)
    }

    /// Point the device at `reg`, then read `buffer.len()` bytes in wire order
    fn read_bytes(&mut self, address: u8, reg: u8, buffer: &mut [u8]) -> Result<(), Self::BusError> {
        self.write(address, &[reg])?;
        self.read(address, buffer)
    }

    fn read_register(&mut self, address: u8, reg: u8) -> Result<u8, Self::BusError> {
        let mut block: [u8; 1] = [0; 1];
        self.read_bytes(address, reg, &mut block)?;
        Ok(block[0])
    }

    /// Two bytes combined low byte first: wire `[a, b]` reads as `0xbbaa`
    fn read_register16(&mut self, address: u8, reg: u8) -> Result<u16, Self::BusError> {
        let mut block: [u8; 2] = [0; 2];
        self.read_bytes(address, reg, &mut block)?;
        Ok(u16::from_le_bytes(block))
    }

    /// Three bytes combined big-endian: wire `[a, b, c]` reads as `0x00aabbcc`
    fn read_register24_be(&mut self, address: u8, reg: u8) -> Result<u32, Self::BusError> {
        let mut block: [u8; 3] = [0; 3];
        self.read_bytes(address, reg, &mut block)?;
        Ok((block[0] as u32) << 16 | (block[1] as u32) << 8 | (block[2] as u32))
    }

    /// Read-modify-write of one bit field. Nothing is written if the read fails.
    fn modify_bits(&mut self, address: u8, field: BitField, val: u8) -> Result<(), Self::BusError> {
        let current = self.read_register(address, field.reg)?;
        self.write_register(address, field.reg, field.insert(current, val))
    }

    /// Register byte with everything outside the field cleared; not shifted down
    fn read_bits(&mut self, address: u8, field: BitField) -> Result<u8, Self::BusError> {
        let current = self.read_register(address, field.reg)?;
        Ok(current & field.mask())
    }
}

impl<T: I2cBus + ?Sized> RegisterAccess for T {}
