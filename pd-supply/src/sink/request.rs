//! Request data objects and the profile selection policy.
//!
//! The sink controller uses its own, reduced RDO layout. Only the object position, currents and
//! (for PPS) the output voltage are encoded, all other flags are handled by the chip.
use byteorder::{ByteOrder, LittleEndian};
use proc_bitfield::bitfield;
use uom::si::electric_current::{centiampere, milliampere};
use uom::si::electric_potential::millivolt;

use super::pdo::{Catalog, FixedSupply, PowerDataObject, ProgrammableSupply};
use crate::_20millivolts_mod::_20millivolts;
use crate::_50milliamperes_mod::_50milliamperes;
use crate::Error;
use crate::units::{ElectricCurrent, ElectricPotential};

bitfield! {
    /// Request for a fixed supply.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FixedRequest(pub u32): Debug, FromStorage, IntoStorage {
        /// Valid range 1..=7
        pub object_position: u8 @ 28..=30,
        /// Operating current in 10 mA units
        pub raw_operating_current: u16 @ 10..=19,
        /// Maximum operating current in 10 mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl FixedRequest {
    /// The requested operating current.
    pub fn operating_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_operating_current().into())
    }

    /// The requested maximum current.
    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_max_current().into())
    }
}

bitfield! {
    /// Request for a programmable power supply.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct PpsRequest(pub u32): Debug, FromStorage, IntoStorage {
        /// Valid range 1..=7
        pub object_position: u8 @ 28..=30,
        /// Output voltage in 20 mV units
        pub raw_output_voltage: u16 @ 9..=19,
        /// Operating current in 50 mA units
        pub raw_operating_current: u8 @ 0..=6,
    }
}

impl PpsRequest {
    /// The requested output voltage.
    pub fn output_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_20millivolts>(self.raw_output_voltage().into())
    }

    /// The requested operating current.
    pub fn operating_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<_50milliamperes>(self.raw_operating_current().into())
    }
}

/// A power request towards the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestObject {
    /// Request for a fixed supply.
    Fixed(FixedRequest),
    /// Request for a programmable supply.
    Pps(PpsRequest),
}

impl RequestObject {
    /// One-based position of the requested profile in the catalog.
    pub fn object_position(&self) -> u8 {
        match self {
            RequestObject::Fixed(request) => request.object_position(),
            RequestObject::Pps(request) => request.object_position(),
        }
    }

    /// The raw request data object.
    pub fn raw(&self) -> u32 {
        match self {
            RequestObject::Fixed(request) => request.0,
            RequestObject::Pps(request) => request.0,
        }
    }

    /// Serialize into the little endian wire format of the request register.
    pub fn to_bytes(&self) -> [u8; 4] {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, self.raw());
        buf
    }

    fn new_fixed(index: u8, supply: &FixedSupply) -> Self {
        Self::Fixed(
            FixedRequest::default()
                .with_object_position(index + 1)
                .with_raw_max_current(supply.raw_max_current())
                .with_raw_operating_current(supply.raw_max_current()),
        )
    }

    fn new_pps(index: u8, supply: &ProgrammableSupply, raw_voltage: u16) -> Self {
        Self::Pps(
            PpsRequest::default()
                .with_object_position(index + 1)
                .with_raw_output_voltage(raw_voltage)
                .with_raw_operating_current(supply.raw_max_current()),
        )
    }
}

/// Find the fixed supply with the highest voltage that does not exceed `target`.
///
/// Among supplies with equal voltage, the last one in catalog order wins.
fn find_highest_fixed_voltage(catalog: &Catalog, target: ElectricPotential) -> Option<(u8, &FixedSupply)> {
    let mut selected: Option<(u8, &FixedSupply)> = None;

    for (index, supply) in catalog.fixed_supplies() {
        if supply.voltage() > target {
            trace!("Skip fixed supply at index {}, voltage too high", index);
            continue;
        }

        selected = match selected {
            Some((_, best)) if supply.voltage() < best.voltage() => selected,
            _ => Some((index, supply)),
        };
    }

    selected
}

/// Select a profile for the `target` voltage and build the matching request.
///
/// In order of preference:
/// 1. the PPS, if `target` lies within its range (operating at its maximum current),
/// 2. the highest fixed supply not above `target`, if it is higher than the PPS maximum,
/// 3. the PPS pinned at its maximum voltage, whenever the source offers one,
/// 4. the highest fixed supply not above `target`.
///
/// The pinned PPS may deliver more than `target`; the regulator downstream brings it down.
/// Without a PPS and without a fixed supply at or below `target`,
/// [`Error::NoSuitableProfile`] is returned.
pub fn select_profile(catalog: &Catalog, target: ElectricPotential) -> Result<RequestObject, Error> {
    let pps = catalog.pps();

    if let Some((index, supply)) = pps {
        if supply.covers(target) {
            let raw_voltage = (target.get::<millivolt>() + 10) / 20;
            debug!("Select PPS at index {} with {} mV", index, raw_voltage * 20);
            return Ok(RequestObject::new_pps(index, supply, raw_voltage as u16));
        }
    }

    let fixed = find_highest_fixed_voltage(catalog, target);

    match (fixed, pps) {
        (Some((index, supply)), Some((_, programmable))) if supply.voltage() > programmable.max_voltage() => {
            debug!("Select fixed supply at index {} above the PPS range", index);
            Ok(RequestObject::new_fixed(index, supply))
        }
        (_, Some((index, programmable))) => {
            let raw_voltage = u16::from(programmable.raw_max_voltage()) * 5;
            debug!("Select PPS at index {} pinned to its ceiling", index);
            Ok(RequestObject::new_pps(index, programmable, raw_voltage))
        }
        (Some((index, supply)), _) => {
            debug!("Select fixed supply at index {}", index);
            Ok(RequestObject::new_fixed(index, supply))
        }
        _ => {
            warn!("No profile for {} mV", target.get::<millivolt>());
            Err(Error::NoSuitableProfile)
        }
    }
}

/// The current ceiling of the profile that `active` refers to.
pub fn profile_max_current(catalog: &Catalog, active: &RequestObject) -> Result<ElectricCurrent, Error> {
    let profile = catalog
        .get(active.object_position().wrapping_sub(1))
        .ok_or(Error::NoContract)?;

    match (active, profile.pdo) {
        (RequestObject::Fixed(_), PowerDataObject::FixedSupply(supply)) => Ok(supply.max_current()),
        (RequestObject::Pps(_), PowerDataObject::Pps(supply)) => Ok(supply.max_current()),
        _ => Err(Error::NoContract),
    }
}

/// Build a request that keeps the active profile, but operates at `current`.
///
/// A PPS request keeps its previously negotiated voltage. There is no fallback to another profile:
/// a current above the active profile's ceiling fails with [`Error::CurrentTooHigh`].
pub fn current_limit_request(
    catalog: &Catalog,
    active: &RequestObject,
    current: ElectricCurrent,
) -> Result<RequestObject, Error> {
    let ceiling = profile_max_current(catalog, active)?;

    if current > ceiling {
        warn!(
            "Current {} mA exceeds the profile maximum of {} mA",
            current.get::<milliampere>(),
            ceiling.get::<milliampere>()
        );
        return Err(Error::CurrentTooHigh);
    }

    let milliamperes = current.get::<milliampere>();

    Ok(match *active {
        RequestObject::Pps(request) => RequestObject::Pps(request.with_raw_operating_current((milliamperes / 50) as u8)),
        RequestObject::Fixed(request) => {
            let raw_current = (milliamperes / 10) as u16;
            RequestObject::Fixed(
                request
                    .with_raw_max_current(raw_current)
                    .with_raw_operating_current(raw_current),
            )
        }
    })
}

#[cfg(test)]
mod tests {
    use uom::si::electric_current::milliampere;
    use uom::si::electric_potential::millivolt;

    use super::*;
    use crate::dummy::{DUMMY_CAPABILITIES, capability_table, fixed_pdo, pps_pdo};

    fn build_catalog(pdos: &[u32]) -> Catalog {
        Catalog::parse(&capability_table(pdos), pdos.len() as u8)
    }

    fn mv(millivolts: u32) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(millivolts)
    }

    fn ma(milliamperes: u32) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(milliamperes)
    }

    #[test]
    fn test_select_pps_within_range() {
        let catalog = build_catalog(&[fixed_pdo(5000, 3000), pps_pdo(3300, 11000, 3000)]);

        let RequestObject::Pps(request) = select_profile(&catalog, mv(9000)).unwrap() else {
            panic!("expected a PPS request");
        };

        assert_eq!(request.raw_output_voltage(), 450);
        assert_eq!(request.object_position(), 2);
        assert_eq!(request.operating_current().get::<milliampere>(), 3000);
        assert_eq!(request.output_voltage().get::<millivolt>(), 9000);
    }

    #[test]
    fn test_select_highest_fixed_below_target() {
        let catalog = build_catalog(&[fixed_pdo(5000, 3000), fixed_pdo(9000, 3000), fixed_pdo(15000, 3000)]);

        let RequestObject::Fixed(request) = select_profile(&catalog, mv(12000)).unwrap() else {
            panic!("expected a fixed request");
        };
        assert_eq!(request.object_position(), 2);
        assert_eq!(request.raw_max_current(), 300);
        assert_eq!(request.raw_operating_current(), 300);

        assert_eq!(select_profile(&catalog, mv(2000)), Err(Error::NoSuitableProfile));
    }

    #[test]
    fn test_equal_voltages_select_last() {
        let catalog = build_catalog(&[fixed_pdo(5000, 3000), fixed_pdo(9000, 2000), fixed_pdo(9000, 3000)]);

        let request = select_profile(&catalog, mv(9000)).unwrap();
        assert_eq!(request.object_position(), 3);
    }

    #[test]
    fn test_select_against_pps_range() {
        let catalog = Catalog::parse(&DUMMY_CAPABILITIES, 5);

        // Inside the PPS range.
        let request = select_profile(&catalog, mv(9000)).unwrap();
        assert!(matches!(request, RequestObject::Pps(pps) if pps.raw_output_voltage() == 450));
        assert_eq!(request.object_position(), 5);

        // The best fixed supply (9 V) is below the PPS maximum, so the PPS is pinned to 11 V.
        let RequestObject::Pps(request) = select_profile(&catalog, mv(12000)).unwrap() else {
            panic!("expected a PPS request");
        };
        assert_eq!(request.output_voltage().get::<millivolt>(), 11000);
        assert_eq!(request.raw_operating_current(), 100);

        // A fixed supply above the PPS maximum.
        let request = select_profile(&catalog, mv(16000)).unwrap();
        assert!(matches!(request, RequestObject::Fixed(fixed) if fixed.object_position() == 3));

        let RequestObject::Fixed(request) = select_profile(&catalog, mv(21000)).unwrap() else {
            panic!("expected a fixed request");
        };
        assert_eq!(request.object_position(), 4);
        assert_eq!(request.max_current().get::<milliampere>(), 2250);
    }

    #[test]
    fn test_select_below_pps_minimum() {
        // The 5 V fixed supply is below the PPS maximum, so the PPS is pinned to 11 V.
        let catalog = build_catalog(&[fixed_pdo(5000, 3000), pps_pdo(5500, 11000, 3000)]);

        let RequestObject::Pps(request) = select_profile(&catalog, mv(5200)).unwrap() else {
            panic!("expected a PPS request");
        };
        assert_eq!(request.object_position(), 2);
        assert_eq!(request.raw_output_voltage(), 550);

        // Without any fixed supply at or below the target.
        let catalog = build_catalog(&[pps_pdo(3300, 11000, 3000)]);

        let RequestObject::Pps(request) = select_profile(&catalog, mv(3000)).unwrap() else {
            panic!("expected a PPS request");
        };
        assert_eq!(request.object_position(), 1);
        assert_eq!(request.output_voltage().get::<millivolt>(), 11000);
        assert_eq!(request.raw_operating_current(), 60);
    }

    #[test]
    fn test_select_from_empty_catalog() {
        assert_eq!(
            select_profile(&Catalog::default(), mv(5000)),
            Err(Error::NoSuitableProfile)
        );
    }

    #[test]
    fn test_current_limit_pps() {
        let catalog = Catalog::parse(&DUMMY_CAPABILITIES, 5);
        let active = select_profile(&catalog, mv(9000)).unwrap();

        assert_eq!(profile_max_current(&catalog, &active).unwrap().get::<milliampere>(), 5000);

        let RequestObject::Pps(request) = current_limit_request(&catalog, &active, ma(3000)).unwrap() else {
            panic!("expected a PPS request");
        };
        assert_eq!(request.raw_operating_current(), 60);
        assert_eq!(request.raw_output_voltage(), 450);
        assert_eq!(request.object_position(), 5);

        assert_eq!(
            current_limit_request(&catalog, &active, ma(5050)),
            Err(Error::CurrentTooHigh)
        );
    }

    #[test]
    fn test_current_limit_fixed() {
        let catalog = Catalog::parse(&DUMMY_CAPABILITIES, 5);
        let active = select_profile(&catalog, mv(20000)).unwrap();

        let RequestObject::Fixed(request) = current_limit_request(&catalog, &active, ma(2000)).unwrap() else {
            panic!("expected a fixed request");
        };
        assert_eq!(request.raw_max_current(), 200);
        assert_eq!(request.raw_operating_current(), 200);
        assert_eq!(request.object_position(), 4);

        assert_eq!(
            current_limit_request(&catalog, &active, ma(2300)),
            Err(Error::CurrentTooHigh)
        );
    }

    #[test]
    fn test_current_limit_with_stale_request() {
        let catalog = Catalog::parse(&DUMMY_CAPABILITIES, 2);
        let stale = RequestObject::Pps(PpsRequest::default().with_object_position(5));

        assert_eq!(current_limit_request(&catalog, &stale, ma(1000)), Err(Error::NoContract));
    }

    #[test]
    fn test_wire_format() {
        let fixed = RequestObject::Fixed(
            FixedRequest::default()
                .with_object_position(1)
                .with_raw_max_current(300)
                .with_raw_operating_current(300),
        );
        assert_eq!(fixed.to_bytes(), [0x2C, 0xB1, 0x04, 0x10]);

        let pps = RequestObject::Pps(
            PpsRequest::default()
                .with_object_position(5)
                .with_raw_output_voltage(450)
                .with_raw_operating_current(100),
        );
        assert_eq!(pps.raw(), 0x5003_8464);
        assert_eq!(pps.to_bytes(), [0x64, 0x84, 0x03, 0x50]);
    }
}
