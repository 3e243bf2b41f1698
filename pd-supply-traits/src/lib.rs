//! USB PD supply controller traits.
//!
//! Provides the register transport trait that both controlled chips are driven through.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

/// Transport Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The addressed device did not acknowledge an address or data byte.
    NoAcknowledge,

    /// Bus error, e.g. a misplaced start/stop condition or lost arbitration.
    Bus,

    /// The transfer did not fit into the transport's buffers.
    Overrun,

    /// Any other failure reported by the underlying peripheral.
    Other,
}

/// Register transport, through which the sessions talk to their chips.
///
/// Every call is one blocking bus transaction. Implementations do not retry;
/// a failed transfer is reported as-is and the caller aborts its operation.
pub trait Transport {
    /// Write the `register` address to `device`, then read `buffer.len()` bytes back.
    fn read(&mut self, device: u8, register: u8, buffer: &mut [u8]) -> Result<(), TransportError>;

    /// Write the `register` address to `device`, followed by `data`.
    fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, device: u8, register: u8, buffer: &mut [u8]) -> Result<(), TransportError> {
        T::read(self, device, register, buffer)
    }

    fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), TransportError> {
        T::write(self, device, register, data)
    }
}
