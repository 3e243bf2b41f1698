//! The regulator session for the TPS55289.
//!
//! The chip's registers are write-only from the session's point of view: every register is
//! mirrored by a shadow copy, which is only updated after the chip accepted the write.
use uom::si::electric_current::milliampere;
use uom::si::electric_potential::millivolt;

use super::codec::{
    self, FeedbackRatio, OcpDelay, RegulatorSetting, RegulatorStatus, SlewRate, encode_cable_compensation,
    encode_current_limit,
};
use super::protection::{Action, FaultKind, check_and_act};
use super::registers::{self, Cdc, IoutLimit, Mode, VoutFs, VoutSr, defaults};
use crate::units::{ElectricCurrent, ElectricPotential};
use crate::{Error, Transport};


/// Default current sense resistor in mOhm.
pub const DEFAULT_SENSE_RESISTOR: u32 = 10;

/// Regulator session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// 7-bit bus address of the converter.
    pub address: u8,
    /// Current sense resistor in mOhm.
    pub sense_resistor: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: registers::DEFAULT_ADDRESS,
            sense_resistor: DEFAULT_SENSE_RESISTOR,
        }
    }
}

/// Where the output voltage feedback is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeedbackSource {
    /// Internal divider, see [`FeedbackRatio`].
    Internal,
    /// External resistor divider.
    External,
}

/// How the cable droop compensation is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CableCompensationSource {
    /// Through the CDC register.
    Internal,
    /// Through a resistor on the CDC pin.
    External,
}

/// Switching behavior at light load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightLoadMode {
    /// Pulse frequency modulation.
    Pfm,
    /// Forced PWM.
    Fpwm,
}

/// A session with one TPS55289 converter.
#[derive(Debug)]
pub struct Tps55289<T: Transport> {
    transport: T,
    config: Config,
    iout_limit: IoutLimit,
    vout_sr: VoutSr,
    vout_fs: VoutFs,
    cdc: Cdc,
    mode: Mode,
    setting: RegulatorSetting,
}

impl<T: Transport> Tps55289<T> {
    /// Create a new session. The shadow registers assume power-on values until [`Self::init`].
    pub fn new(transport: T, config: Config) -> Self {
        let vout_sr = VoutSr(defaults::VOUT_SR);
        let vout_fs = VoutFs(defaults::VOUT_FS);
        let iout_limit = IoutLimit(defaults::IOUT_LIMIT);

        Self {
            transport,
            config,
            iout_limit,
            vout_sr,
            vout_fs,
            cdc: Cdc(defaults::CDC),
            mode: Mode(defaults::MODE),
            setting: Self::default_setting(iout_limit, vout_sr, vout_fs),
        }
    }

    fn default_setting(iout_limit: IoutLimit, vout_sr: VoutSr, vout_fs: VoutFs) -> RegulatorSetting {
        // Two-bit fields always hold a valid preset.
        let ratio = FeedbackRatio::try_from(vout_fs.intfb()).unwrap_or_default();
        let slew_rate = SlewRate::try_from(vout_sr.slew_rate()).unwrap_or_default();
        let ocp_delay = OcpDelay::try_from(vout_sr.ocp_delay()).unwrap_or_default();

        RegulatorSetting::new(ratio)
            .with_current_limit(iout_limit.setting())
            .with_slew_rate(slew_rate)
            .with_ocp_delay(ocp_delay)
    }

    /// Tear down the session, and return the transport.
    pub fn release(self) -> T {
        self.transport
    }

    /// What the converter is currently programmed to.
    pub fn setting(&self) -> &RegulatorSetting {
        &self.setting
    }

    /// Whether the output is enabled.
    pub fn is_output_enabled(&self) -> bool {
        self.mode.output_enable()
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        trace!("Write {:#x} to register {:#x}", value, register);
        self.transport.write(self.config.address, register, &[value])?;
        Ok(())
    }

    fn write_mode(&mut self, mode: Mode) -> Result<(), Error> {
        self.write_register(registers::MODE, mode.0)?;
        self.mode = mode;
        Ok(())
    }

    fn write_cdc(&mut self, cdc: Cdc) -> Result<(), Error> {
        self.write_register(registers::CDC, cdc.0)?;
        self.cdc = cdc;
        Ok(())
    }

    fn write_reference(&mut self, code: u16) -> Result<(), Error> {
        let [lsb, msb] = code.to_le_bytes();
        self.write_register(registers::REF_LSB, lsb)?;
        self.write_register(registers::REF_MSB, msb)
    }

    /// Bring the converter into a known state.
    ///
    /// Disables the output, writes power-on values to all registers, then enables the output.
    /// No output voltage is programmed afterwards: [`RegulatorSetting::target`] is `None` and the
    /// reference is zero until [`Self::set_output_voltage`] is called.
    pub fn init(&mut self) -> Result<RegulatorStatus, Error> {
        self.disable_output()?;

        self.write_register(registers::REF_LSB, defaults::REF_LSB)?;
        self.write_register(registers::REF_MSB, defaults::REF_MSB)?;
        self.write_register(registers::IOUT_LIMIT, defaults::IOUT_LIMIT)?;
        self.write_register(registers::VOUT_SR, defaults::VOUT_SR)?;
        self.write_register(registers::VOUT_FS, defaults::VOUT_FS)?;
        self.write_cdc(Cdc(defaults::CDC))?;
        self.write_mode(Mode(defaults::MODE))?;

        self.iout_limit = IoutLimit(defaults::IOUT_LIMIT);
        self.vout_sr = VoutSr(defaults::VOUT_SR);
        self.vout_fs = VoutFs(defaults::VOUT_FS);
        self.setting = Self::default_setting(self.iout_limit, self.vout_sr, self.vout_fs);

        self.enable_output()?;
        info!("Regulator initialized");

        self.read_status()
    }

    /// Program the output voltage.
    ///
    /// The output is disabled while the reference changes. Afterwards, it is only enabled again if it
    /// was enabled before.
    pub fn set_output_voltage(&mut self, target: ElectricPotential) -> Result<(), Error> {
        let setting = self.setting.with_voltage(target)?;
        let was_enabled = self.mode.output_enable();

        self.disable_output()?;
        self.write_reference(setting.reference())?;
        self.setting = setting;

        info!("Output voltage set to {} mV", target.get::<millivolt>());

        if was_enabled {
            self.enable_output()?;
        }
        Ok(())
    }

    /// Program the output current limit. Whether the limit is enforced does not change.
    pub fn set_current_limit(&mut self, limit: ElectricCurrent) -> Result<(), Error> {
        let code = encode_current_limit(limit, self.config.sense_resistor)?;
        let iout_limit = self.iout_limit.with_setting(code);

        self.write_register(registers::IOUT_LIMIT, iout_limit.0)?;
        self.iout_limit = iout_limit;
        self.setting = self.setting.with_current_limit(code);

        info!("Output current limit set to {} mA", limit.get::<milliampere>());
        Ok(())
    }

    fn set_current_limit_enable(&mut self, enable: bool) -> Result<(), Error> {
        let iout_limit = self.iout_limit.with_enable(enable);

        self.write_register(registers::IOUT_LIMIT, iout_limit.0)?;
        self.iout_limit = iout_limit;

        debug!("Current limit enabled: {}", enable);
        Ok(())
    }

    /// Enforce the output current limit.
    pub fn enable_current_limit(&mut self) -> Result<(), Error> {
        self.set_current_limit_enable(true)
    }

    /// Stop enforcing the output current limit.
    pub fn disable_current_limit(&mut self) -> Result<(), Error> {
        self.set_current_limit_enable(false)
    }

    fn write_vout_sr(&mut self, vout_sr: VoutSr) -> Result<(), Error> {
        self.write_register(registers::VOUT_SR, vout_sr.0)?;
        self.vout_sr = vout_sr;
        Ok(())
    }

    /// Set the output voltage slew rate. Shares its register with the OCP delay.
    pub fn set_slew_rate(&mut self, slew_rate: SlewRate) -> Result<(), Error> {
        self.write_vout_sr(self.vout_sr.with_slew_rate(slew_rate.code()))?;
        self.setting = self.setting.with_slew_rate(slew_rate);
        Ok(())
    }

    /// Set the overcurrent response delay. Shares its register with the slew rate.
    pub fn set_ocp_delay(&mut self, ocp_delay: OcpDelay) -> Result<(), Error> {
        self.write_vout_sr(self.vout_sr.with_ocp_delay(ocp_delay.code()))?;
        self.setting = self.setting.with_ocp_delay(ocp_delay);
        Ok(())
    }

    /// Select the feedback source.
    pub fn set_feedback_source(&mut self, source: FeedbackSource) -> Result<(), Error> {
        let vout_fs = self
            .vout_fs
            .with_external_feedback(source == FeedbackSource::External);

        self.write_register(registers::VOUT_FS, vout_fs.0)?;
        self.vout_fs = vout_fs;

        debug!("Feedback source {:?}", source);
        Ok(())
    }

    /// Select the internal feedback ratio, and reprogram the reference to keep the output voltage.
    ///
    /// With a programmed output voltage, the output is disabled while ratio and reference change,
    /// and only enabled again if it was enabled before. If a write fails, the output stays disabled
    /// and the setting keeps the previous ratio.
    ///
    /// Fails with [`Error::OutOfRange`] before any write, if the output voltage cannot be reached
    /// with `ratio`.
    pub fn set_feedback_ratio(&mut self, ratio: FeedbackRatio) -> Result<(), Error> {
        let setting = self.setting.with_ratio(ratio)?;
        let vout_fs = self.vout_fs.with_intfb(ratio.code());

        if setting.target().is_none() {
            self.write_register(registers::VOUT_FS, vout_fs.0)?;
            self.vout_fs = vout_fs;
            self.setting = setting;

            debug!("Feedback ratio {:?}", ratio);
            return Ok(());
        }

        let was_enabled = self.mode.output_enable();
        self.disable_output()?;

        self.write_register(registers::VOUT_FS, vout_fs.0)?;
        self.vout_fs = vout_fs;
        self.write_reference(setting.reference())?;
        self.setting = setting;

        debug!("Feedback ratio {:?}", ratio);

        if was_enabled {
            self.enable_output()?;
        }
        Ok(())
    }

    /// Report short circuits in the status register.
    pub fn set_short_circuit_indication(&mut self, enable: bool) -> Result<(), Error> {
        self.write_cdc(self.cdc.with_sc_mask(enable))
    }

    /// Report overcurrent in the status register.
    pub fn set_over_current_indication(&mut self, enable: bool) -> Result<(), Error> {
        self.write_cdc(self.cdc.with_ocp_mask(enable))
    }

    /// Report overvoltage in the status register.
    pub fn set_over_voltage_indication(&mut self, enable: bool) -> Result<(), Error> {
        self.write_cdc(self.cdc.with_ovp_mask(enable))
    }

    /// Select how the cable droop compensation is set.
    pub fn set_cable_compensation_source(&mut self, source: CableCompensationSource) -> Result<(), Error> {
        self.write_cdc(
            self.cdc
                .with_external_compensation(source == CableCompensationSource::External),
        )
    }

    /// Set the cable droop compensation to `level` times 100 mV, for levels 0 to 7.
    pub fn set_cable_compensation(&mut self, level: u8) -> Result<(), Error> {
        let level = encode_cable_compensation(level)?;
        self.write_cdc(self.cdc.with_compensation(level))?;

        debug!("Cable compensation {} mV", u16::from(level) * 100);
        Ok(())
    }

    /// Enable the output.
    pub fn enable_output(&mut self) -> Result<(), Error> {
        self.write_mode(self.mode.with_output_enable(true))?;
        debug!("Output enabled");
        Ok(())
    }

    /// Disable the output.
    pub fn disable_output(&mut self) -> Result<(), Error> {
        self.write_mode(self.mode.with_output_enable(false))?;
        debug!("Output disabled");
        Ok(())
    }

    /// Double the switching frequency in buck-boost operation.
    pub fn set_frequency_doubling(&mut self, enable: bool) -> Result<(), Error> {
        self.write_mode(self.mode.with_frequency_doubling(enable))
    }

    /// Use hiccup mode on short circuit.
    pub fn set_hiccup(&mut self, enable: bool) -> Result<(), Error> {
        self.write_mode(self.mode.with_hiccup(enable))
    }

    /// Discharge the output in shutdown.
    pub fn set_output_discharge(&mut self, enable: bool) -> Result<(), Error> {
        self.write_mode(self.mode.with_discharge(enable))
    }

    /// Select the switching behavior at light load.
    pub fn set_light_load_mode(&mut self, mode: LightLoadMode) -> Result<(), Error> {
        self.write_mode(self.mode.with_fpwm(mode == LightLoadMode::Fpwm))
    }

    /// Read and decode the status register.
    pub fn read_status(&mut self) -> Result<RegulatorStatus, Error> {
        let mut buf = [0u8];
        self.transport.read(self.config.address, registers::STATUS, &mut buf)?;

        let status = codec::decode_status(buf[0]);
        trace!("Regulator status {:?}", status);
        Ok(status)
    }

    /// Read the status, and disable the output on a fault.
    ///
    /// Returns the fault that disabled the output. The output stays disabled until it is enabled
    /// explicitly.
    pub fn supervise(&mut self) -> Result<Option<FaultKind>, Error> {
        let status = self.read_status()?;

        match check_and_act(&status) {
            Action::None => Ok(None),
            Action::DisableOutput(fault) => {
                warn!("Regulator fault {:?}, disabling output", fault);
                self.disable_output()?;
                Ok(Some(fault))
            }
        }
    }
}
