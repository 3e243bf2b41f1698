//! Register map of the TPS55289 buck-boost converter.
//!
//! All registers are single bytes. The reference DAC code spans two registers, which are written
//! LSB first.
use proc_bitfield::bitfield;

/// Default 7-bit I2C address.
pub const DEFAULT_ADDRESS: u8 = 0x74;

/// Reference DAC code, low byte.
pub const REF_LSB: u8 = 0x00;
/// Reference DAC code, high byte.
pub const REF_MSB: u8 = 0x01;
/// Output current limit.
pub const IOUT_LIMIT: u8 = 0x02;
/// Output voltage slew rate and OCP delay.
pub const VOUT_SR: u8 = 0x03;
/// Feedback selection.
pub const VOUT_FS: u8 = 0x04;
/// Cable droop compensation and fault indication masks.
pub const CDC: u8 = 0x05;
/// Output enable and switching behavior.
pub const MODE: u8 = 0x06;
/// Fault flags and operating mode.
pub const STATUS: u8 = 0x07;

/// Power-on values of the writable registers.
#[allow(missing_docs)]
pub mod defaults {
    pub const REF_LSB: u8 = 0b0000_0000;
    pub const REF_MSB: u8 = 0b0000_0000;
    pub const IOUT_LIMIT: u8 = 0b1110_0100;
    pub const VOUT_SR: u8 = 0b0000_0001;
    pub const VOUT_FS: u8 = 0b1000_0011;
    pub const CDC: u8 = 0b1110_0000;
    pub const MODE: u8 = 0b0010_0000;
}

/// Largest reference DAC code.
pub const MAX_REFERENCE_CODE: u16 = 0x7FF;

bitfield! {
    /// IOUT_LIMIT register.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct IoutLimit(pub u8): Debug, FromStorage, IntoStorage {
        /// Current limit enabled
        pub enable: bool @ 0,
        /// Current limit setting, 0.5 mV sense voltage per step
        pub setting: u8 @ 1..=7,
    }
}

bitfield! {
    /// VOUT_SR register.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct VoutSr(pub u8): Debug, FromStorage, IntoStorage {
        /// Overcurrent response delay
        pub ocp_delay: u8 @ 2..=3,
        /// Output voltage slew rate
        pub slew_rate: u8 @ 6..=7,
    }
}

bitfield! {
    /// VOUT_FS register.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct VoutFs(pub u8): Debug, FromStorage, IntoStorage {
        /// External feedback divider in use
        pub external_feedback: bool @ 0,
        /// Internal feedback ratio
        pub intfb: u8 @ 6..=7,
    }
}

bitfield! {
    /// CDC register.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Cdc(pub u8): Debug, FromStorage, IntoStorage {
        /// Short circuit indication
        pub sc_mask: bool @ 0,
        /// Overcurrent indication
        pub ocp_mask: bool @ 1,
        /// Overvoltage indication
        pub ovp_mask: bool @ 2,
        /// Compensation set by an external resistor
        pub external_compensation: bool @ 4,
        /// Compensation level, 100 mV per step
        pub compensation: u8 @ 5..=7,
    }
}

bitfield! {
    /// MODE register.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Mode(pub u8): Debug, FromStorage, IntoStorage {
        /// Output enabled
        pub output_enable: bool @ 0,
        /// Double the switching frequency in buck-boost operation
        pub frequency_doubling: bool @ 1,
        /// Hiccup mode on short circuit
        pub hiccup: bool @ 2,
        /// Discharge the output in shutdown
        pub discharge: bool @ 3,
        /// Forced PWM at light load, PFM otherwise
        pub fpwm: bool @ 6,
    }
}

bitfield! {
    /// STATUS register.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Status(pub u8): Debug, FromStorage, IntoStorage {
        /// Short circuit
        pub short_circuit: bool @ 0,
        /// Overcurrent
        pub over_current: bool @ 1,
        /// Overvoltage
        pub over_voltage: bool @ 2,
        /// Boost, buck, buck-boost or reserved
        pub mode: u8 @ 6..=7,
    }
}
