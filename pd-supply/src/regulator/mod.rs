//! The regulator side, built around the TPS55289 buck-boost converter.
//!
//! - [`registers`] holds the register map and bit layouts.
//! - [`codec`] converts between physical settings and register values, without any I/O.
//! - [`protection`] decides how to react to a fault in the status register.
//! - [`device`] is the session that keeps the chip's registers and the shadow copies in sync.
pub mod codec;
pub mod device;
pub mod protection;
pub mod registers;

pub use device::{Config, Tps55289};
