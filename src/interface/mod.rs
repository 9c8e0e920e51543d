pub mod sc18im700;

pub use self::sc18im700::{BusStatus, PollPolicy, Sc18im700};

/// A method of moving bytes to and from devices on an I2C bus
///
/// Addresses are 7-bit; implementations add the direction bit themselves.
pub trait I2cBus {
    /// Bus error type
    type BusError;

    /// Write the whole payload to the device at `address` as one transaction,
    /// returning once the bus reports the transaction complete.
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::BusError>;

    /// Read exactly `buffer.len()` bytes from the device at `address`
    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::BusError>;
}
