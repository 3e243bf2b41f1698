//! Adapter from an `embedded-hal` I2C bus to the register [`Transport`].
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::{Transport, TransportError};

/// Longest register write payload issued by the sessions (one request data object).
const MAX_WRITE_PAYLOAD: usize = 4;

/// A [`Transport`] on top of a blocking I2C bus.
///
/// Register addresses are sent as a single byte, multi-byte payloads follow in order.
#[derive(Debug)]
pub struct I2cTransport<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> I2cTransport<I2C> {
    /// Wrap an I2C bus.
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Release the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

fn transport_error(kind: ErrorKind) -> TransportError {
    match kind {
        ErrorKind::NoAcknowledge(_) => TransportError::NoAcknowledge,
        ErrorKind::Bus | ErrorKind::ArbitrationLoss => TransportError::Bus,
        ErrorKind::Overrun => TransportError::Overrun,
        _ => TransportError::Other,
    }
}

impl<I2C: I2c> Transport for I2cTransport<I2C> {
    fn read(&mut self, device: u8, register: u8, buffer: &mut [u8]) -> Result<(), TransportError> {
        self.i2c.write_read(device, &[register], buffer).map_err(|err| {
            error!("I2C read of register 0x{:02x} at 0x{:02x} failed", register, device);
            transport_error(err.kind())
        })
    }

    fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), TransportError> {
        let mut frame: heapless::Vec<u8, { MAX_WRITE_PAYLOAD + 1 }> = heapless::Vec::new();
        frame.push(register).map_err(|_| TransportError::Overrun)?;
        frame.extend_from_slice(data).map_err(|_| TransportError::Overrun)?;

        self.i2c.write(device, &frame).map_err(|err| {
            error!("I2C write of register 0x{:02x} at 0x{:02x} failed", register, device);
            transport_error(err.kind())
        })
    }
}
