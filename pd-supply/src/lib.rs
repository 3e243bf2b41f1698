//! USB-PD sink negotiation and buck-boost regulator control.
//!
//! The crate drives two chips that sit in a USB-C power path:
//! - an AP33772 PD sink controller, which reports the source's capabilities and sends the
//!   sink's request object, see [`sink`],
//! - a TPS55289 buck-boost regulator, which converts the negotiated input to the requested
//!   output voltage and current, see [`regulator`].
//!
//! Both chips are accessed through the blocking [`Transport`] trait.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

// This must go first, so that the logging macros are visible in all modules.
mod fmt;

pub mod regulator;
pub mod sink;
pub mod timers;
pub mod transport;

#[cfg(test)]
mod dummy;

#[macro_use]
extern crate uom;

pub use pd_supply_traits::{Transport, TransportError};

/// Errors that can occur while negotiating or programming the supply.
///
/// Validation errors are always detected before the first register write of an operation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A bus transfer failed. The operation was aborted, prior state is unchanged.
    #[error("transport error: {0:?}")]
    Transport(TransportError),
    /// A value lies outside of its documented domain.
    #[error("value out of range")]
    OutOfRange,
    /// A value is inside its domain, but not on the register's step grid.
    #[error("value is not a multiple of the register step")]
    InvalidStep,
    /// A preset code outside of the supported table was requested.
    #[error("invalid preset code")]
    InvalidPreset,
    /// No advertised profile can satisfy the requested voltage.
    #[error("no suitable power profile")]
    NoSuitableProfile,
    /// The requested current exceeds the ceiling of the active profile.
    #[error("requested current exceeds the profile maximum")]
    CurrentTooHigh,
    /// The source advertised more than one programmable profile.
    #[error("multiple programmable profiles are not supported")]
    MultiplePpsUnsupported,
    /// No profile was negotiated yet.
    #[error("no active power contract")]
    NoContract,
}

impl From<TransportError> for Error {
    fn from(transport_error: TransportError) -> Self {
        Error::Transport(transport_error)
    }
}

/// Physical quantities, stored as `u32` in millivolt and milliampere base units.
pub mod units {
    ISQ!(
        uom::si,
        u32,
        (millimeter, kilogram, second, milliampere, kelvin, mole, candela)
    );
}

mod _20millivolts_mod {
    unit! {
        system: uom::si;
        quantity: uom::si::electric_potential;

        @_20millivolts: 0.02; "_20mV", "_20millivolts", "_20millivolts";
    }
}

mod _50millivolts_mod {
    unit! {
        system: uom::si;
        quantity: uom::si::electric_potential;

        @_50millivolts: 0.05; "_50mV", "_50millivolts", "_50millivolts";
    }
}

mod _50milliamperes_mod {
    unit! {
        system: uom::si;
        quantity: uom::si::electric_current;

        @_50milliamperes: 0.05; "_50mA", "_50milliamperes", "_50milliamperes";
    }
}
