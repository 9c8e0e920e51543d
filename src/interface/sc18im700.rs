use core::convert::TryFrom;

use embedded_hal as hal;

use super::I2cBus;
use crate::Error;
#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

/// Begin an I2C transaction
const CMD_START: u8 = b'S';
/// Terminates every command frame
const CMD_STOP: u8 = b'P';
/// Read a bridge-internal register
const CMD_READ_REG: u8 = b'R';
/// Write one or more bridge-internal registers
const CMD_WRITE_REG: u8 = b'W';

/// Combined with the shifted slave address for read transactions
const DIR_READ: u8 = 0x01;

/// Bridge register holding the state of the last I2C transaction
pub const REG_I2C_STAT: u8 = 0x0A;

/// Decoded value of the bridge's I2CStat register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusStatus {
    /// Last transaction completed (0xF0)
    Ok,
    /// Slave did not acknowledge its address (0xF1)
    NackOnAddress,
    /// Slave did not acknowledge a data byte (0xF2)
    NackOnData,
    /// Bus timed out (0xF8)
    TimeOut,
    /// Anything else, typically a transaction still in progress
    Other(u8),
}

impl From<u8> for BusStatus {
    fn from(val: u8) -> Self {
        match val {
            0xF0 => BusStatus::Ok,
            0xF1 => BusStatus::NackOnAddress,
            0xF2 => BusStatus::NackOnData,
            0xF8 => BusStatus::TimeOut,
            other => BusStatus::Other(other),
        }
    }
}

/// How long to keep polling I2CStat after an I2C write
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollPolicy {
    /// Poll until the bridge reports OK, however long that takes
    Forever,
    /// Give up with `Error::Unresponsive` after this many status reads.
    /// At least one read is always made.
    MaxAttempts(u32),
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::Forever
    }
}

/// I2C master implemented by an SC18IM700 bridge sitting on a serial port
pub struct Sc18im700<S> {
    /// the serial port the bridge is attached to
    serial: S,
    /// status polling behavior after I2C writes
    poll: PollPolicy,
}

impl<S, CommE> Sc18im700<S>
where
    S: hal::blocking::serial::Write<u8, Error = CommE> + hal::serial::Read<u8, Error = CommE>,
{
    pub fn new(serial: S) -> Self {
        Self::new_with_poll_policy(serial, PollPolicy::default())
    }

    pub fn new_with_poll_policy(serial: S, poll: PollPolicy) -> Self {
        Self { serial, poll }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        self.poll = poll;
    }

    /// Release owned resources
    pub fn release(self) -> S {
        self.serial
    }

    /// Read one of the bridge's own registers
    pub fn read_bridge_register(&mut self, reg: u8) -> Result<u8, Error<CommE>> {
        self.send(&[CMD_READ_REG, reg, CMD_STOP])?;
        let mut block: [u8; 1] = [0; 1];
        self.receive(&mut block)?;
        Ok(block[0])
    }

    /// Write one of the bridge's own registers. The bridge sends no reply.
    pub fn write_bridge_register(&mut self, reg: u8, val: u8) -> Result<(), Error<CommE>> {
        self.send(&[CMD_WRITE_REG, reg, val, CMD_STOP])
    }

    /// Program several bridge registers in one command.
    /// `data` holds register/value pairs back to back.
    pub fn write_bridge_registers(&mut self, data: &[u8]) -> Result<(), Error<CommE>> {
        self.send(&[CMD_WRITE_REG])?;
        self.send(data)?;
        self.send(&[CMD_STOP])
    }

    /// Read and decode the state of the last I2C transaction
    pub fn bus_status(&mut self) -> Result<BusStatus, Error<CommE>> {
        self.read_bridge_register(REG_I2C_STAT).map(BusStatus::from)
    }

    /// Block until I2CStat reads OK, or until the poll policy runs out
    fn wait_for_bus_ok(&mut self) -> Result<(), Error<CommE>> {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match self.bus_status() {
                Ok(BusStatus::Ok) => return Ok(()),
                Ok(_status) => {
                    #[cfg(feature = "rttdebug")]
                    rprintln!("i2c busy: {:?}", _status);
                }
                Err(_) => {
                    #[cfg(feature = "rttdebug")]
                    rprintln!("i2c status read failed");
                }
            }

            if let PollPolicy::MaxAttempts(max) = self.poll {
                if attempts >= max {
                    return Err(Error::Unresponsive);
                }
            }
        }
    }

    fn send(&mut self, block: &[u8]) -> Result<(), Error<CommE>> {
        #[cfg(feature = "rttdebug")]
        rprintln!("send {:x?} ", block);

        self.serial.bwrite_all(block).map_err(Error::Comm)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error<CommE>> {
        for slot in buffer.iter_mut() {
            *slot = nb::block!(self.serial.read()).map_err(Error::Comm)?;
        }
        Ok(())
    }
}

/// The bridge encodes transaction length in a single byte
fn frame_len<CommE>(len: usize) -> Result<u8, Error<CommE>> {
    u8::try_from(len).map_err(|_| Error::PayloadTooLong)
}

impl<S, CommE> I2cBus for Sc18im700<S>
where
    S: hal::blocking::serial::Write<u8, Error = CommE> + hal::serial::Read<u8, Error = CommE>,
{
    type BusError = Error<CommE>;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::BusError> {
        let len = frame_len(data.len())?;
        self.send(&[CMD_START, (address << 1) & !DIR_READ, len])?;
        self.send(data)?;
        self.send(&[CMD_STOP])?;
        self.wait_for_bus_ok()
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::BusError> {
        let len = frame_len(buffer.len())?;
        self.send(&[CMD_START, (address << 1) | DIR_READ, len, CMD_STOP])?;
        self.receive(buffer)
    }
}
