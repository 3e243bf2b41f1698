//! Register map of the AP33772 sink controller.
use proc_bitfield::bitfield;

/// Default 7-bit I2C address.
pub const DEFAULT_ADDRESS: u8 = 0x51;

/// Source PDO table, 7 slots of 4 bytes each.
pub const SRCPDO: u8 = 0x00;
/// Number of valid PDOs in the table.
pub const PDONUM: u8 = 0x1C;
/// Negotiation and protection status.
pub const STATUS: u8 = 0x1D;
/// Interrupt mask, same layout as [`STATUS`].
pub const MASK: u8 = 0x1E;
/// VBUS voltage, 80 mV per LSB.
pub const VOLTAGE: u8 = 0x20;
/// VBUS current, 24 mA per LSB.
pub const CURRENT: u8 = 0x21;
/// NTC temperature, 1 °C per LSB.
pub const TEMP: u8 = 0x22;
/// Over-current protection threshold, 50 mA per LSB.
pub const OCPTHR: u8 = 0x23;
/// Over-temperature protection threshold, 1 °C per LSB.
pub const OTPTHR: u8 = 0x24;
/// De-rating threshold, 1 °C per LSB.
pub const DRTHR: u8 = 0x25;
/// NTC resistance at 25 °C, 16 bit little endian, in Ohm.
pub const TR25: u8 = 0x28;
/// NTC resistance at 50 °C.
pub const TR50: u8 = 0x2A;
/// NTC resistance at 75 °C.
pub const TR75: u8 = 0x2C;
/// NTC resistance at 100 °C.
pub const TR100: u8 = 0x2E;
/// Request data object, 4 bytes little endian.
pub const RDO: u8 = 0x30;

/// Length of the source PDO table in bytes.
pub const SRCPDO_LENGTH: usize = 28;

/// LSB of the VBUS voltage reading in mV.
pub const VOLTAGE_LSB_MILLIVOLTS: u32 = 80;
/// LSB of the VBUS current reading in mA.
pub const CURRENT_LSB_MILLIAMPERES: u32 = 24;
/// LSB of the over-current threshold in mA.
pub const OCP_THRESHOLD_LSB_MILLIAMPERES: u32 = 50;

bitfield! {
    /// Status register content.
    ///
    /// The mask register uses the same layout: a set bit enables the respective interrupt.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Status(pub u8): Debug, FromStorage, IntoStorage {
        /// Negotiation finished.
        pub ready: bool @ 0,
        /// Negotiation succeeded.
        pub success: bool @ 1,
        /// A new set of PDOs was received.
        pub new_pdo: bool @ 2,
        /// Over-voltage protection triggered.
        pub ovp: bool @ 4,
        /// Over-current protection triggered.
        pub ocp: bool @ 5,
        /// Over-temperature protection triggered.
        pub otp: bool @ 6,
        /// DR event (data role change).
        pub dr: bool @ 7,
    }
}

/// Interrupt mask flags, laid out like [`Status`].
pub type Mask = Status;
