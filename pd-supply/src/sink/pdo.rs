//! Source capability catalog.
//!
//! The sink controller mirrors up to seven power data objects (PDOs) of the source in its
//! capability table. Each slot is a little endian `u32`.
use byteorder::{ByteOrder, LittleEndian};
use heapless::Vec;
use proc_bitfield::bitfield;
use uom::si::electric_current::centiampere;
use uom::si::electric_potential::decivolt;

use crate::_50milliamperes_mod::_50milliamperes;
use crate::_50millivolts_mod::_50millivolts;
use crate::Error;
use crate::units::{ElectricCurrent, ElectricPotential};

/// Number of slots in the capability table.
pub const MAX_PROFILES: usize = 7;

/// Top nibble of a programmable power supply APDO (augmented kind, PPS supply).
const PPS_TAG: u8 = 0b1100;

bitfield! {
    /// A raw power data object.
    ///
    /// Used for classification, and as a fallback for kinds that this sink does not use.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct RawPowerDataObject(pub u32): Debug, FromStorage, IntoStorage {
        /// The kind of power data object.
        pub kind: u8 @ 30..=31,
        /// Kind and augmented supply type together.
        pub tag: u8 @ 28..=31,
    }
}

bitfield! {
    /// A fixed voltage supply PDO.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FixedSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Fixed supply
        pub kind: u8 @ 30..=31,
        /// Voltage in 50 mV units
        pub raw_voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

#[allow(clippy::derivable_impls)]
impl Default for FixedSupply {
    fn default() -> Self {
        Self(0)
    }
}

impl FixedSupply {
    /// The fixed output voltage.
    pub fn voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_voltage().into())
    }

    /// The maximum current that the source can deliver at this voltage.
    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_max_current().into())
    }
}

bitfield! {
    /// A programmable power supply (PPS) APDO.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ProgrammableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Augmented power data object
        pub kind: u8 @ 30..=31,
        /// Programmable power supply
        pub supply: u8 @ 28..=29,
        /// Maximum voltage in 100 mV increments
        pub raw_max_voltage: u8 @ 17..=24,
        /// Minimum voltage in 100 mV increments
        pub raw_min_voltage: u8 @ 8..=15,
        /// Maximum current in 50 mA increments
        pub raw_max_current: u8 @ 0..=6,
    }
}

impl Default for ProgrammableSupply {
    fn default() -> Self {
        Self(0).with_kind(0b11).with_supply(0b00)
    }
}

#[allow(missing_docs)]
impl ProgrammableSupply {
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<decivolt>(self.raw_max_voltage().into())
    }

    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<decivolt>(self.raw_min_voltage().into())
    }

    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<_50milliamperes>(self.raw_max_current().into())
    }

    /// Whether `voltage` lies within the adjustable range, bounds included.
    pub fn covers(&self, voltage: ElectricPotential) -> bool {
        self.min_voltage() <= voltage && voltage <= self.max_voltage()
    }
}

/// A power data object holds information about one type of source capability.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerDataObject {
    /// Fixed voltage supply.
    FixedSupply(FixedSupply),
    /// Programmable power supply.
    Pps(ProgrammableSupply),
    /// A kind that is never selected by this sink (battery, variable, other APDOs).
    Unknown(RawPowerDataObject),
}

/// Parse a raw PDO into a typed power data object.
pub fn parse_raw_pdo(raw: u32) -> PowerDataObject {
    let pdo = RawPowerDataObject(raw);

    if pdo.tag() == PPS_TAG {
        PowerDataObject::Pps(ProgrammableSupply(raw))
    } else if pdo.kind() == 0b00 {
        PowerDataObject::FixedSupply(FixedSupply(raw))
    } else {
        warn!("Unsupported PowerDataObject tag {}", pdo.tag());
        PowerDataObject::Unknown(pdo)
    }
}

/// One slot of the catalog.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerProfile {
    /// Zero-based slot in the capability table.
    pub index: u8,
    /// The advertised capability.
    pub pdo: PowerDataObject,
}

impl PowerProfile {
    /// One-based position, as used in request data objects.
    pub fn object_position(&self) -> u8 {
        self.index + 1
    }
}

/// The ordered list of profiles that the source advertised in its latest capabilities.
///
/// A catalog is only valid for the negotiation that produced it. It is rebuilt, never merged,
/// when the sink controller reports a new set of PDOs.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Catalog {
    profiles: Vec<PowerProfile, MAX_PROFILES>,
    pps_index: Option<u8>,
    multiple_pps: bool,
}

impl Catalog {
    /// Build a catalog from the raw capability table and the reported PDO count.
    ///
    /// The count is clamped to the seven table slots, and to the number of complete slots in `raw`.
    /// Only the first PPS APDO is used. Further ones stay in the catalog as profiles, but are
    /// flagged, see [`Catalog::check`].
    pub fn parse(raw: &[u8], count: u8) -> Self {
        let count = usize::from(count);
        if count > MAX_PROFILES {
            warn!("Clamping PDO count {} to {}", count, MAX_PROFILES);
        }
        if raw.len() / 4 < count.min(MAX_PROFILES) {
            warn!("Capability table holds only {} of {} PDOs", raw.len() / 4, count);
        }

        let mut pps_index = None;
        let mut multiple_pps = false;

        // `take` bounds the iterator to the capacity of the profile list.
        let profiles = raw
            .chunks_exact(4)
            .take(count.min(MAX_PROFILES))
            .enumerate()
            .map(|(index, chunk)| {
                let index = index as u8;
                let pdo = parse_raw_pdo(LittleEndian::read_u32(chunk));

                if let PowerDataObject::Pps(_) = pdo {
                    match pps_index {
                        Some(first) => {
                            warn!("Ignoring PPS APDO at index {}, using the one at {}", index, first);
                            multiple_pps = true;
                        }
                        None => pps_index = Some(index),
                    }
                }

                PowerProfile { index, pdo }
            })
            .collect();

        let catalog = Self {
            profiles,
            pps_index,
            multiple_pps,
        };

        debug!("Parsed {} PDOs, PPS index {:?}", catalog.profiles.len(), catalog.pps_index);
        catalog
    }

    /// Whether the source advertised more than one PPS APDO.
    pub fn multiple_pps(&self) -> bool {
        self.multiple_pps
    }

    /// Report catalog anomalies.
    ///
    /// Fails with [`Error::MultiplePpsUnsupported`] if more than one PPS APDO was advertised.
    /// The catalog stays usable either way.
    pub fn check(&self) -> Result<(), Error> {
        if self.multiple_pps {
            Err(Error::MultiplePpsUnsupported)
        } else {
            Ok(())
        }
    }

    /// All profiles, in table order.
    pub fn profiles(&self) -> &[PowerProfile] {
        &self.profiles
    }

    /// The profile in slot `index`.
    pub fn get(&self, index: u8) -> Option<&PowerProfile> {
        self.profiles.get(usize::from(index))
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the source advertised no profiles at all.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The programmable profile with its slot index, if the source offers one.
    pub fn pps(&self) -> Option<(u8, &ProgrammableSupply)> {
        let index = self.pps_index?;
        match self.get(index)?.pdo {
            PowerDataObject::Pps(ref pps) => Some((index, pps)),
            _ => None,
        }
    }

    /// Fixed supplies with their slot index, in table order.
    pub fn fixed_supplies(&self) -> impl Iterator<Item = (u8, &FixedSupply)> {
        self.profiles.iter().filter_map(|profile| match profile.pdo {
            PowerDataObject::FixedSupply(ref fixed) => Some((profile.index, fixed)),
            _ => None,
        })
    }
}
