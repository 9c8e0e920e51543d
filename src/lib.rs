/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

#![cfg_attr(not(test), no_std)]

use embedded_hal as hal;

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

mod interface;
pub mod register;

pub use interface::{BusStatus, I2cBus, PollPolicy, Sc18im700};
pub use register::{BitField, RegisterAccess};

/// Errors in this crate
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<CommE> {
    /// Serial communication error
    Comm(CommE),

    /// I2C transaction longer than the bridge can frame (255 bytes)
    PayloadTooLong,
    /// Bridge never reported the I2C transaction complete
    Unresponsive,
}

/// Default I2C address (AD0 pin low)
pub const ADDRESS_AD0_LOW: u8 = 0x68;
/// Alternate I2C address (AD0 pin high)
pub const ADDRESS_AD0_HIGH: u8 = 0x69;

/// Builds a driver talking through an SC18IM700 bridge on a serial port
#[derive(Copy, Clone, Debug)]
pub struct Builder {
    address: u8,
    poll: PollPolicy,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            address: ADDRESS_AD0_LOW,
            poll: PollPolicy::default(),
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 7-bit sensor address
    pub fn address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// How long the bridge should wait for each I2C write to complete
    pub fn poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Create a new driver without touching the sensor
    pub fn new_serial<S, CommE>(&self, serial: S) -> MPU9250<Sc18im700<S>>
    where
        S: hal::blocking::serial::Write<u8, Error = CommE> + hal::serial::Read<u8, Error = CommE>,
    {
        let bridge = Sc18im700::new_with_poll_policy(serial, self.poll);
        MPU9250::new_with_address(bridge, self.address)
    }

    /// Create a new driver and wake the sensor with the default configuration
    pub fn open_serial<S, CommE>(&self, serial: S) -> Result<MPU9250<Sc18im700<S>>, Error<CommE>>
    where
        S: hal::blocking::serial::Write<u8, Error = CommE> + hal::serial::Read<u8, Error = CommE>,
    {
        let mut imu = self.new_serial(serial);
        imu.setup()?;
        Ok(imu)
    }
}

/// MPU-9250 accelerometer and gyroscope
pub struct MPU9250<BUS> {
    pub(crate) bus: BUS,
    pub(crate) address: u8,
}

impl<BUS> MPU9250<BUS>
where
    BUS: I2cBus,
{
    pub fn new(bus: BUS) -> Self {
        Self::new_with_address(bus, ADDRESS_AD0_LOW)
    }

    pub fn new_with_address(bus: BUS, address: u8) -> Self {
        Self { bus, address }
    }

    /// Create a driver and bring the sensor out of sleep
    pub fn open(bus: BUS) -> Result<Self, BUS::BusError> {
        let mut imu = Self::new(bus);
        imu.setup()?;
        Ok(imu)
    }

    /// Release owned resources
    pub fn release(self) -> BUS {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Select a stable clock, the most sensitive ranges, and wake up.
    /// The sensor powers up asleep.
    pub fn setup(&mut self) -> Result<(), BUS::BusError> {
        self.set_clock_source(ClockSource::PllXGyro)?;
        self.set_full_scale_gyro_range(GyroRange::default())?;
        self.set_full_scale_accel_range(AccelRange::default())?;
        self.set_sleep_enabled(false)
    }

    /// One signed sample from a `*_H`/`*_L` register pair.
    ///
    /// The bytes arrive high byte first; `read_register16` packs them low
    /// byte first, so they are unpacked again and recombined big-endian.
    pub fn read_axis(&mut self, reg: u8) -> Result<i16, BUS::BusError> {
        let packed = self.bus.read_register16(self.address, reg)?;
        Ok(i16::from_be_bytes(packed.to_le_bytes()))
    }

    pub fn get_acceleration(&mut self) -> Result<[i16; 3], BUS::BusError> {
        Ok([
            self.read_axis(REG_ACCEL_XOUT_H)?,
            self.read_axis(REG_ACCEL_YOUT_H)?,
            self.read_axis(REG_ACCEL_ZOUT_H)?,
        ])
    }

    pub fn get_rotation(&mut self) -> Result<[i16; 3], BUS::BusError> {
        Ok([
            self.read_axis(REG_GYRO_XOUT_H)?,
            self.read_axis(REG_GYRO_YOUT_H)?,
            self.read_axis(REG_GYRO_ZOUT_H)?,
        ])
    }

    /// Acceleration then rotation, as six separate axis reads.
    /// The two halves may come from different sample instants.
    pub fn get_motion6(&mut self) -> Result<([i16; 3], [i16; 3]), BUS::BusError> {
        let accel = self.get_acceleration()?;
        let gyro = self.get_rotation()?;
        Ok((accel, gyro))
    }

    /// Acceleration and rotation from a single 14 byte burst read,
    /// so both come from the same sample instant
    pub fn get_motion6_burst(&mut self) -> Result<([i16; 3], [i16; 3]), BUS::BusError> {
        let mut block: [u8; 14] = [0; 14];
        self.bus.read_bytes(self.address, REG_ACCEL_XOUT_H, &mut block)?;

        // bytes 6..8 hold the temperature
        let sample = |i: usize| i16::from_be_bytes([block[i], block[i + 1]]);
        Ok((
            [sample(0), sample(2), sample(4)],
            [sample(8), sample(10), sample(12)],
        ))
    }

    /// Raw die temperature sample
    pub fn get_temperature(&mut self) -> Result<i16, BUS::BusError> {
        self.read_axis(REG_TEMP_OUT_H)
    }

    pub fn set_full_scale_accel_range(&mut self, range: AccelRange) -> Result<(), BUS::BusError> {
        self.bus.modify_bits(self.address, FIELD_ACCEL_FS_SEL, range as u8)
    }

    pub fn get_full_scale_accel_range(&mut self) -> Result<AccelRange, BUS::BusError> {
        let val = self.bus.read_register(self.address, FIELD_ACCEL_FS_SEL.reg)?;
        Ok(AccelRange::from_bits(FIELD_ACCEL_FS_SEL.extract(val)))
    }

    pub fn set_full_scale_gyro_range(&mut self, range: GyroRange) -> Result<(), BUS::BusError> {
        self.bus.modify_bits(self.address, FIELD_GYRO_FS_SEL, range as u8)
    }

    pub fn get_full_scale_gyro_range(&mut self) -> Result<GyroRange, BUS::BusError> {
        let val = self.bus.read_register(self.address, FIELD_GYRO_FS_SEL.reg)?;
        Ok(GyroRange::from_bits(FIELD_GYRO_FS_SEL.extract(val)))
    }

    pub fn set_clock_source(&mut self, source: ClockSource) -> Result<(), BUS::BusError> {
        self.bus.modify_bits(self.address, FIELD_CLKSEL, source as u8)
    }

    /// PWR_MGMT_1 masked to the clock select bits, left in place
    pub fn get_clock_source(&mut self) -> Result<u8, BUS::BusError> {
        self.bus.read_bits(self.address, FIELD_CLKSEL)
    }

    pub fn set_sleep_enabled(&mut self, enabled: bool) -> Result<(), BUS::BusError> {
        self.bus.modify_bits(self.address, FIELD_SLEEP, enabled as u8)
    }

    pub fn get_sleep_enabled(&mut self) -> Result<bool, BUS::BusError> {
        Ok(self.bus.read_bits(self.address, FIELD_SLEEP)? != 0)
    }

    /// Configure the digital low pass filter shared by accel and gyro
    pub fn set_dlpf_mode(&mut self, bandwidth: DlpfBandwidth) -> Result<(), BUS::BusError> {
        self.bus.modify_bits(self.address, FIELD_DLPF_CFG, bandwidth as u8)
    }

    /// Raw WHO_AM_I register
    pub fn get_device_id(&mut self) -> Result<u8, BUS::BusError> {
        self.bus.read_register(self.address, REG_WHO_AM_I)
    }

    /// Read the sensor identifier and return true if it is an MPU-9250
    pub fn test_connection(&mut self) -> Result<bool, BUS::BusError> {
        let chip_id = self.get_device_id()?;
        #[cfg(feature = "rttdebug")]
        rprintln!("whoami: 0x{:0x}  ", chip_id);
        Ok(chip_id == MPU9250_WAI)
    }
}

/// Raw accelerometer sample in g, assuming the ±2g range
pub fn accel_to_g(raw: i16) -> f64 {
    raw as f64 / 16384.0
}

/// Raw gyroscope sample in degrees per second, assuming the ±250dps range
pub fn gyro_to_dps(raw: i16) -> f64 {
    raw as f64 * 250.0 / 32768.0
}

/// Register map
///
const REG_CONFIG: u8 = 0x1A;
const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;

const REG_ACCEL_XOUT_H: u8 = 0x3B;
const REG_ACCEL_YOUT_H: u8 = 0x3D;
const REG_ACCEL_ZOUT_H: u8 = 0x3F;
const REG_TEMP_OUT_H: u8 = 0x41;
const REG_GYRO_XOUT_H: u8 = 0x43;
const REG_GYRO_YOUT_H: u8 = 0x45;
const REG_GYRO_ZOUT_H: u8 = 0x47;

const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_WHO_AM_I: u8 = 0x75;

const FIELD_DLPF_CFG: BitField = BitField::new(REG_CONFIG, 2, 3);
const FIELD_GYRO_FS_SEL: BitField = BitField::new(REG_GYRO_CONFIG, 4, 2);
const FIELD_ACCEL_FS_SEL: BitField = BitField::new(REG_ACCEL_CONFIG, 4, 2);
const FIELD_SLEEP: BitField = BitField::new(REG_PWR_MGMT_1, 6, 1);
const FIELD_CLKSEL: BitField = BitField::new(REG_PWR_MGMT_1, 2, 3);

/// WHO_AM_I value of the MPU-9250
const MPU9250_WAI: u8 = 0x71;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Clock source selection (CLKSEL)
pub enum ClockSource {
    /// Internal 20MHz oscillator
    Internal = 0,
    /// PLL with X axis gyroscope reference
    PllXGyro = 1,
    /// PLL with Y axis gyroscope reference
    PllYGyro = 2,
    /// PLL with Z axis gyroscope reference
    PllZGyro = 3,
    /// PLL with external 32.768kHz reference
    PllExt32k = 4,
    /// PLL with external 19.2MHz reference
    PllExt19M = 5,
    /// Stops the clock and keeps the timing generator in reset
    KeepReset = 7,
}

#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Digital low pass filter bandwidth (DLPF_CFG)
pub enum DlpfBandwidth {
    Bw_256Hz = 0,
    Bw_188Hz = 1,
    Bw_98Hz = 2,
    Bw_42Hz = 3,
    Bw_20Hz = 4,
    Bw_10Hz = 5,
    Bw_5Hz = 6,
}

#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// The gyroscope has a programmable full-scale range of ±250, ±500, ±1000, or ±2000 degrees/sec.
pub enum GyroRange {
    /// ±250
    Range_250dps = 0b00,
    /// ±500
    Range_500dps = 0b01,
    /// ±1000
    Range_1000dps = 0b10,
    /// ±2000
    Range_2000dps = 0b11,
}

impl Default for GyroRange {
    fn default() -> Self {
        GyroRange::Range_250dps
    }
}

impl GyroRange {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => GyroRange::Range_250dps,
            0b01 => GyroRange::Range_500dps,
            0b10 => GyroRange::Range_1000dps,
            _ => GyroRange::Range_2000dps,
        }
    }

    /// Gyro resolution in degrees per second per bit
    /// Note that the ranges are ± which splits the raw i16 resolution between + and -
    pub fn resolution(&self) -> f64 {
        match self {
            GyroRange::Range_250dps => 250.0 / 32768.0,
            GyroRange::Range_500dps => 500.0 / 32768.0,
            GyroRange::Range_1000dps => 1000.0 / 32768.0,
            GyroRange::Range_2000dps => 2000.0 / 32768.0,
        }
    }
}

#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// The accelerometer has a user-programmable accelerometer full-scale range
/// of ±2g, ±4g, ±8g, and ±16g.
/// The numeric values of these enums correspond to ACCEL_FS_SEL
pub enum AccelRange {
    /// ±2g
    Range_2g = 0b00,
    /// ±4g
    Range_4g = 0b01,
    /// ±8g
    Range_8g = 0b10,
    /// ±16g
    Range_16g = 0b11,
}

impl Default for AccelRange {
    fn default() -> Self {
        AccelRange::Range_2g
    }
}

impl AccelRange {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Range_2g,
            0b01 => Self::Range_4g,
            0b10 => Self::Range_8g,
            _ => Self::Range_16g,
        }
    }

    /// Accelerometer resolution in G / bit
    /// Note that the ranges are ± which splits the raw i16 resolution between + and -
    pub fn resolution(&self) -> f64 {
        match self {
            Self::Range_2g => 2.0 / 32768.0,
            Self::Range_4g => 4.0 / 32768.0,
            Self::Range_8g => 8.0 / 32768.0,
            Self::Range_16g => 16.0 / 32768.0,
        }
    }
}
