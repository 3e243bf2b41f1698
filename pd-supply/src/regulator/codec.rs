//! Conversion between physical settings and TPS55289 register values.
//!
//! Everything in here is free of side effects. Invalid input is rejected before a caller could
//! write anything to the chip.
#[allow(unused_imports)]
use micromath::F32Ext;
use uom::si::electric_current::milliampere;
use uom::si::electric_potential::millivolt;

use super::registers::{MAX_REFERENCE_CODE, Status};
use crate::Error;
use crate::units::{ElectricCurrent, ElectricPotential};

/// Lowest output voltage that can be programmed, in mV.
pub const MIN_OUTPUT_MILLIVOLTS: u32 = 800;
/// Highest output voltage that can be programmed, in mV.
pub const MAX_OUTPUT_MILLIVOLTS: u32 = 22_000;

/// Reference voltage at DAC code zero, in mV.
const REFERENCE_OFFSET_MILLIVOLTS: f32 = 45.0;
/// DAC codes per mV of reference voltage (one step is 0.5645 mV).
const REFERENCE_CODES_PER_MILLIVOLT: f32 = 1.7715;

/// Highest current limit, in mA.
pub const MAX_CURRENT_LIMIT_MILLIAMPERES: u32 = 6350;
/// Current limit granularity, in mA.
pub const CURRENT_LIMIT_STEP_MILLIAMPERES: u32 = 50;
/// Sense voltage per current limit code, in µV.
const CURRENT_LIMIT_MICROVOLTS_PER_CODE: u32 = 500;
/// Largest current limit code.
const MAX_CURRENT_LIMIT_CODE: u32 = 0x7F;

/// Largest cable compensation level.
pub const MAX_CABLE_COMPENSATION: u8 = 7;

/// Internal feedback ratio between output voltage and reference voltage.
///
/// Smaller ratios allow higher output voltages, at a coarser step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeedbackRatio {
    /// 0.2256
    #[default]
    R0,
    /// 0.1128
    R1,
    /// 0.0752
    R2,
    /// 0.0564
    R3,
}

impl FeedbackRatio {
    /// The ratio's value.
    pub fn value(self) -> f32 {
        match self {
            FeedbackRatio::R0 => 0.2256,
            FeedbackRatio::R1 => 0.1128,
            FeedbackRatio::R2 => 0.0752,
            FeedbackRatio::R3 => 0.0564,
        }
    }

    /// The INTFB register code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The output voltage change per reference DAC step, in mV.
    pub fn step_millivolts(self) -> f32 {
        1.0 / REFERENCE_CODES_PER_MILLIVOLT / self.value()
    }
}

impl TryFrom<u8> for FeedbackRatio {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(FeedbackRatio::R0),
            1 => Ok(FeedbackRatio::R1),
            2 => Ok(FeedbackRatio::R2),
            3 => Ok(FeedbackRatio::R3),
            _ => Err(Error::InvalidPreset),
        }
    }
}

/// Output voltage slew rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlewRate {
    /// 1.25 mV/µs
    #[default]
    Sr1p25MvPerUs,
    /// 2.5 mV/µs
    Sr2p5MvPerUs,
    /// 5 mV/µs
    Sr5MvPerUs,
    /// 10 mV/µs
    Sr10MvPerUs,
}

impl SlewRate {
    /// The register code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The slew rate in µV/µs.
    pub fn microvolts_per_microsecond(self) -> u32 {
        match self {
            SlewRate::Sr1p25MvPerUs => 1250,
            SlewRate::Sr2p5MvPerUs => 2500,
            SlewRate::Sr5MvPerUs => 5000,
            SlewRate::Sr10MvPerUs => 10_000,
        }
    }
}

impl TryFrom<u8> for SlewRate {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SlewRate::Sr1p25MvPerUs),
            1 => Ok(SlewRate::Sr2p5MvPerUs),
            2 => Ok(SlewRate::Sr5MvPerUs),
            3 => Ok(SlewRate::Sr10MvPerUs),
            _ => Err(Error::InvalidPreset),
        }
    }
}

/// Delay between an overcurrent condition and the protection response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OcpDelay {
    /// 128 µs
    #[default]
    Us128,
    /// 3.072 ms
    Ms3_072,
    /// 6.144 ms
    Ms6_144,
    /// 12.288 ms
    Ms12_288,
}

impl OcpDelay {
    /// The register code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The delay in µs.
    pub fn microseconds(self) -> u32 {
        match self {
            OcpDelay::Us128 => 128,
            OcpDelay::Ms3_072 => 3072,
            OcpDelay::Ms6_144 => 6144,
            OcpDelay::Ms12_288 => 12_288,
        }
    }
}

impl TryFrom<u8> for OcpDelay {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OcpDelay::Us128),
            1 => Ok(OcpDelay::Ms3_072),
            2 => Ok(OcpDelay::Ms6_144),
            3 => Ok(OcpDelay::Ms12_288),
            _ => Err(Error::InvalidPreset),
        }
    }
}

/// Encode an output voltage into a reference DAC code.
///
/// Fails with [`Error::OutOfRange`] outside of 0.8-22 V, and for voltages that the DAC cannot
/// reach with the given `ratio`.
pub fn encode_reference(target: ElectricPotential, ratio: FeedbackRatio) -> Result<u16, Error> {
    let millivolts = target.get::<millivolt>();

    if !(MIN_OUTPUT_MILLIVOLTS..=MAX_OUTPUT_MILLIVOLTS).contains(&millivolts) {
        return Err(Error::OutOfRange);
    }

    let reference = millivolts as f32 * ratio.value();
    let code = (REFERENCE_CODES_PER_MILLIVOLT * (reference - REFERENCE_OFFSET_MILLIVOLTS)).round() + 1.0;

    if code < 0.0 || code > f32::from(MAX_REFERENCE_CODE) {
        trace!("Reference code {} for {} mV is out of range", code, millivolts);
        return Err(Error::OutOfRange);
    }

    Ok(code as u16)
}

/// Decode a reference DAC code into the output voltage, rounded to mV.
pub fn decode_reference(code: u16, ratio: FeedbackRatio) -> ElectricPotential {
    let reference = (f32::from(code) - 1.0) / REFERENCE_CODES_PER_MILLIVOLT + REFERENCE_OFFSET_MILLIVOLTS;
    ElectricPotential::new::<millivolt>((reference / ratio.value()).round() as u32)
}

/// Encode a current limit into the IOUT_LIMIT setting.
///
/// The limit must be a multiple of 50 mA, and at most 6.35 A.
pub fn encode_current_limit(limit: ElectricCurrent, sense_resistor_milliohms: u32) -> Result<u8, Error> {
    let milliamperes = limit.get::<milliampere>();

    if milliamperes > MAX_CURRENT_LIMIT_MILLIAMPERES {
        return Err(Error::OutOfRange);
    }
    if milliamperes % CURRENT_LIMIT_STEP_MILLIAMPERES != 0 {
        return Err(Error::InvalidStep);
    }

    // mA times mOhm yields µV.
    let sense_microvolts = milliamperes * sense_resistor_milliohms;
    let code = (sense_microvolts + CURRENT_LIMIT_MICROVOLTS_PER_CODE / 2) / CURRENT_LIMIT_MICROVOLTS_PER_CODE;

    if code > MAX_CURRENT_LIMIT_CODE {
        return Err(Error::OutOfRange);
    }

    Ok(code as u8)
}

/// Decode an IOUT_LIMIT setting into a current limit.
pub fn decode_current_limit(code: u8, sense_resistor_milliohms: u32) -> ElectricCurrent {
    let milliamperes = u32::from(code) * CURRENT_LIMIT_MICROVOLTS_PER_CODE / sense_resistor_milliohms.max(1);
    ElectricCurrent::new::<milliampere>(milliamperes)
}

/// Validate a cable droop compensation level (100 mV per step).
pub fn encode_cable_compensation(level: u8) -> Result<u8, Error> {
    if level > MAX_CABLE_COMPENSATION {
        return Err(Error::InvalidPreset);
    }
    Ok(level)
}

/// The converter's operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum OperatingMode {
    Boost,
    Buck,
    BuckBoost,
    Reserved,
}

impl From<u8> for OperatingMode {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => OperatingMode::Boost,
            0b01 => OperatingMode::Buck,
            0b10 => OperatingMode::BuckBoost,
            _ => OperatingMode::Reserved,
        }
    }
}

impl From<OperatingMode> for u8 {
    fn from(mode: OperatingMode) -> Self {
        match mode {
            OperatingMode::Boost => 0b00,
            OperatingMode::Buck => 0b01,
            OperatingMode::BuckBoost => 0b10,
            OperatingMode::Reserved => 0b11,
        }
    }
}

/// A decoded status register read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub struct RegulatorStatus {
    pub short_circuit: bool,
    pub over_current: bool,
    pub over_voltage: bool,
    pub mode: OperatingMode,
}

impl RegulatorStatus {
    /// Encode as a status register value.
    pub fn to_byte(&self) -> u8 {
        Status::default()
            .with_short_circuit(self.short_circuit)
            .with_over_current(self.over_current)
            .with_over_voltage(self.over_voltage)
            .with_mode(self.mode.into())
            .0
    }
}

/// Decode a raw status register value.
pub fn decode_status(raw: u8) -> RegulatorStatus {
    let status = Status(raw);

    RegulatorStatus {
        short_circuit: status.short_circuit(),
        over_current: status.over_current(),
        over_voltage: status.over_voltage(),
        mode: status.mode().into(),
    }
}

/// What the converter should currently be programmed to.
///
/// The reference code is derived from the target voltage and the feedback ratio. It is recomputed
/// whenever one of them changes, and cannot be set on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegulatorSetting {
    target: Option<ElectricPotential>,
    ratio: FeedbackRatio,
    reference: u16,
    current_limit: u8,
    slew_rate: SlewRate,
    ocp_delay: OcpDelay,
}

impl RegulatorSetting {
    /// A setting without a target voltage, at reference code zero.
    pub fn new(ratio: FeedbackRatio) -> Self {
        Self {
            target: None,
            ratio,
            reference: 0,
            current_limit: 0,
            slew_rate: SlewRate::default(),
            ocp_delay: OcpDelay::default(),
        }
    }

    /// The target output voltage, if one was set.
    pub fn target(&self) -> Option<ElectricPotential> {
        self.target
    }

    /// The internal feedback ratio.
    pub fn ratio(&self) -> FeedbackRatio {
        self.ratio
    }

    /// The reference DAC code.
    pub fn reference(&self) -> u16 {
        self.reference
    }

    /// The IOUT_LIMIT setting.
    pub fn current_limit(&self) -> u8 {
        self.current_limit
    }

    /// The output voltage slew rate.
    pub fn slew_rate(&self) -> SlewRate {
        self.slew_rate
    }

    /// The overcurrent response delay.
    pub fn ocp_delay(&self) -> OcpDelay {
        self.ocp_delay
    }

    /// The setting with a new target voltage.
    pub fn with_voltage(self, target: ElectricPotential) -> Result<Self, Error> {
        Ok(Self {
            target: Some(target),
            reference: encode_reference(target, self.ratio)?,
            ..self
        })
    }

    /// The setting with a new feedback ratio, keeping the target voltage.
    pub fn with_ratio(self, ratio: FeedbackRatio) -> Result<Self, Error> {
        let reference = match self.target {
            Some(target) => encode_reference(target, ratio)?,
            None => self.reference,
        };

        Ok(Self {
            ratio,
            reference,
            ..self
        })
    }

    /// The setting with a new IOUT_LIMIT setting.
    pub fn with_current_limit(self, current_limit: u8) -> Self {
        Self { current_limit, ..self }
    }

    /// The setting with a new slew rate.
    pub fn with_slew_rate(self, slew_rate: SlewRate) -> Self {
        Self { slew_rate, ..self }
    }

    /// The setting with a new overcurrent response delay.
    pub fn with_ocp_delay(self, ocp_delay: OcpDelay) -> Self {
        Self { ocp_delay, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATIOS: [FeedbackRatio; 4] = [
        FeedbackRatio::R0,
        FeedbackRatio::R1,
        FeedbackRatio::R2,
        FeedbackRatio::R3,
    ];

    fn mv(millivolts: u32) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(millivolts)
    }

    fn ma(milliamperes: u32) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(milliamperes)
    }

    #[test]
    fn test_reference_is_monotonic() {
        for ratio in RATIOS {
            let mut previous = 0;

            for millivolts in (MIN_OUTPUT_MILLIVOLTS..=MAX_OUTPUT_MILLIVOLTS).step_by(7) {
                let Ok(code) = encode_reference(mv(millivolts), ratio) else {
                    continue;
                };
                assert!(code >= previous, "{millivolts} mV at {ratio:?}");
                previous = code;
            }
        }
    }

    #[test]
    fn test_reference_round_trip() {
        for ratio in RATIOS {
            let step = ratio.step_millivolts();

            for millivolts in (MIN_OUTPUT_MILLIVOLTS..=MAX_OUTPUT_MILLIVOLTS).step_by(13) {
                let Ok(code) = encode_reference(mv(millivolts), ratio) else {
                    continue;
                };
                let decoded = decode_reference(code, ratio).get::<millivolt>();
                let error = (decoded as f32 - millivolts as f32).abs();

                assert!(error <= step, "{millivolts} mV decoded to {decoded} mV at {ratio:?}");
            }
        }
    }

    #[test]
    fn test_reference_values() {
        // 5 V at 0.0564 is a 282 mV reference.
        assert_eq!(encode_reference(mv(5000), FeedbackRatio::R3), Ok(421));
        // 20 V at 0.0564 is a 1128 mV reference.
        assert_eq!(encode_reference(mv(20_000), FeedbackRatio::R3), Ok(1920));
        // 5 V at 0.2256 is a 1128 mV reference, too.
        assert_eq!(encode_reference(mv(5000), FeedbackRatio::R0), Ok(1920));
    }

    #[test]
    fn test_reference_out_of_range() {
        assert_eq!(encode_reference(mv(799), FeedbackRatio::R3), Err(Error::OutOfRange));
        assert_eq!(encode_reference(mv(22_001), FeedbackRatio::R3), Err(Error::OutOfRange));
        // Beyond the DAC range at this ratio.
        assert_eq!(encode_reference(mv(20_000), FeedbackRatio::R0), Err(Error::OutOfRange));
    }

    #[test]
    fn test_current_limit() {
        for milliamperes in (0..=MAX_CURRENT_LIMIT_MILLIAMPERES).step_by(50) {
            let code = encode_current_limit(ma(milliamperes), 10).unwrap();
            assert_eq!(decode_current_limit(code, 10).get::<milliampere>(), milliamperes);
        }

        assert_eq!(encode_current_limit(ma(3000), 10), Ok(60));
        assert_eq!(encode_current_limit(ma(6350), 10), Ok(127));
    }

    #[test]
    fn test_current_limit_rejected() {
        assert_eq!(encode_current_limit(ma(6400), 10), Err(Error::OutOfRange));
        assert_eq!(encode_current_limit(ma(1025), 10), Err(Error::InvalidStep));
        assert_eq!(encode_current_limit(ma(1), 10), Err(Error::InvalidStep));

        // A larger sense resistor narrows the range.
        assert_eq!(encode_current_limit(ma(5000), 20), Err(Error::OutOfRange));
        assert_eq!(encode_current_limit(ma(3000), 20), Ok(120));
    }

    #[test]
    fn test_presets() {
        assert_eq!(SlewRate::try_from(2), Ok(SlewRate::Sr5MvPerUs));
        assert_eq!(SlewRate::try_from(3).unwrap().microvolts_per_microsecond(), 10_000);
        assert_eq!(SlewRate::try_from(4), Err(Error::InvalidPreset));

        assert_eq!(OcpDelay::try_from(1).unwrap().microseconds(), 3072);
        assert_eq!(OcpDelay::try_from(3), Ok(OcpDelay::Ms12_288));
        assert_eq!(OcpDelay::try_from(7), Err(Error::InvalidPreset));

        assert_eq!(FeedbackRatio::try_from(2), Ok(FeedbackRatio::R2));
        assert_eq!(FeedbackRatio::try_from(4), Err(Error::InvalidPreset));

        assert_eq!(encode_cable_compensation(7), Ok(7));
        assert_eq!(encode_cable_compensation(8), Err(Error::InvalidPreset));
    }

    #[test]
    fn test_decode_status() {
        let status = decode_status(0b1000_0101);

        assert_eq!(
            status,
            RegulatorStatus {
                short_circuit: true,
                over_current: false,
                over_voltage: true,
                mode: OperatingMode::BuckBoost,
            }
        );
        assert_eq!(decode_status(0b1100_0000).mode, OperatingMode::Reserved);
    }

    #[test]
    fn test_status_round_trip() {
        for mode in [
            OperatingMode::Boost,
            OperatingMode::Buck,
            OperatingMode::BuckBoost,
            OperatingMode::Reserved,
        ] {
            let status = RegulatorStatus {
                short_circuit: false,
                over_current: true,
                over_voltage: false,
                mode,
            };
            assert_eq!(decode_status(status.to_byte()), status);
        }
    }

    #[test]
    fn test_setting_recomputes_reference() {
        let setting = RegulatorSetting::new(FeedbackRatio::R3)
            .with_voltage(mv(5000))
            .unwrap();
        assert_eq!(setting.reference(), 421);

        let setting = setting.with_ratio(FeedbackRatio::R0).unwrap();
        assert_eq!(setting.reference(), 1920);
        assert_eq!(setting.target(), Some(mv(5000)));

        // Not representable at this ratio.
        assert_eq!(setting.with_voltage(mv(20_000)), Err(Error::OutOfRange));
    }
}
