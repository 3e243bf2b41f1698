//! The sink session for the AP33772.
//!
//! A session owns everything that was negotiated over its PD connection: the source's catalog,
//! the active contract and the latest negotiation outcome. Nothing is shared between sessions.
use embedded_hal::delay::DelayNs;
use uom::si::electric_current::milliampere;
use uom::si::electric_potential::millivolt;

use super::pdo::Catalog;
use super::registers::{self, Mask};
use super::request::{RequestObject, current_limit_request, profile_max_current, select_profile};
use super::status::{NegotiationEvent, NegotiationOutcome, decode_negotiation};
use crate::timers::SettleDelay;
use crate::units::{ElectricCurrent, ElectricPotential};
use crate::{Error, Transport};


/// Sink session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// 7-bit bus address of the sink controller.
    pub address: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: registers::DEFAULT_ADDRESS,
        }
    }
}

/// The request that the source accepted last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contract {
    /// Zero-based catalog index of the requested profile.
    pub index: u8,
    /// The request data object that was sent.
    pub request: RequestObject,
}

impl Contract {
    fn new(request: RequestObject) -> Self {
        Self {
            index: request.object_position().saturating_sub(1),
            request,
        }
    }
}

/// A session with one AP33772 sink controller.
#[derive(Debug)]
pub struct Ap33772<T: Transport, D: DelayNs> {
    transport: T,
    delay: D,
    config: Config,
    catalog: Option<Catalog>,
    contract: Option<Contract>,
    outcome: NegotiationOutcome,
}

impl<T: Transport, D: DelayNs> Ap33772<T, D> {
    /// Create a new session. Nothing is negotiated until [`Self::refresh`] is called.
    pub fn new(transport: T, delay: D, config: Config) -> Self {
        Self {
            transport,
            delay,
            config,
            catalog: None,
            contract: None,
            outcome: NegotiationOutcome::None,
        }
    }

    /// Tear down the session, and return the transport and delay.
    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// The catalog of the latest successful negotiation.
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    /// The active contract, if a request was sent since the latest new set of capabilities.
    pub fn contract(&self) -> Option<&Contract> {
        self.contract.as_ref()
    }

    /// The latest negotiation outcome.
    pub fn outcome(&self) -> NegotiationOutcome {
        self.outcome
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        let mut buf = [0u8];
        self.transport.read(self.config.address, register, &mut buf)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, register: u8, data: &[u8]) -> Result<(), Error> {
        self.transport.write(self.config.address, register, data)?;
        Ok(())
    }

    /// Read the status register, and follow up on the reported event.
    ///
    /// When a new set of capabilities was negotiated successfully, the previous catalog and contract
    /// are discarded, and the catalog is rebuilt from the capability table. A catalog with more than
    /// one PPS is kept, see [`Catalog::check`].
    pub fn refresh(&mut self) -> Result<NegotiationEvent, Error> {
        let status = registers::Status(self.read_register(registers::STATUS)?);
        let event = decode_negotiation(status.0, self.outcome);

        if status.ready() && event.outcome == NegotiationOutcome::NewProfileSuccess {
            info!("New source capabilities");
            self.catalog = None;
            self.contract = None;

            SettleDelay::StatusToCapabilities.wait(&mut self.delay);

            let count = self.read_register(registers::PDONUM)?;
            let mut table = [0u8; registers::SRCPDO_LENGTH];
            self.transport.read(self.config.address, registers::SRCPDO, &mut table)?;

            let catalog = Catalog::parse(&table, count);
            if catalog.check().is_err() {
                warn!("Source advertises more than one PPS, only the first is used");
            }
            self.catalog = Some(catalog);
        } else if event.outcome != self.outcome {
            debug!("Negotiation outcome {:?}", event.outcome);
        }

        self.outcome = event.outcome;
        Ok(event)
    }

    fn send_request(&mut self, request: RequestObject) -> Result<RequestObject, Error> {
        trace!("Send RDO {:?}", request);
        self.write_register(registers::RDO, &request.to_bytes())?;
        self.contract = Some(Contract::new(request));
        Ok(request)
    }

    /// Request the best profile for the `target` voltage.
    ///
    /// Fails with [`Error::NoSuitableProfile`] if no capabilities were received yet.
    pub fn set_voltage(&mut self, target: ElectricPotential) -> Result<RequestObject, Error> {
        let catalog = self.catalog.as_ref().ok_or(Error::NoSuitableProfile)?;
        let request = select_profile(catalog, target)?;

        info!("Request {} mV", target.get::<millivolt>());
        self.send_request(request)
    }

    /// Renegotiate the active profile with a different operating current.
    pub fn set_max_current(&mut self, current: ElectricCurrent) -> Result<RequestObject, Error> {
        let (Some(catalog), Some(contract)) = (self.catalog.as_ref(), self.contract.as_ref()) else {
            return Err(Error::NoContract);
        };
        let request = current_limit_request(catalog, &contract.request, current)?;

        info!("Request {} mA", current.get::<milliampere>());
        self.send_request(request)
    }

    /// The current ceiling of the active profile.
    pub fn max_current(&self) -> Result<ElectricCurrent, Error> {
        let (Some(catalog), Some(contract)) = (self.catalog.as_ref(), self.contract.as_ref()) else {
            return Err(Error::NoContract);
        };
        profile_max_current(catalog, &contract.request)
    }

    /// Measure the VBUS voltage.
    pub fn read_voltage(&mut self) -> Result<ElectricPotential, Error> {
        let raw = self.read_register(registers::VOLTAGE)?;
        Ok(ElectricPotential::new::<millivolt>(
            u32::from(raw) * registers::VOLTAGE_LSB_MILLIVOLTS,
        ))
    }

    /// Measure the VBUS current.
    pub fn read_current(&mut self) -> Result<ElectricCurrent, Error> {
        let raw = self.read_register(registers::CURRENT)?;
        Ok(ElectricCurrent::new::<milliampere>(
            u32::from(raw) * registers::CURRENT_LSB_MILLIAMPERES,
        ))
    }

    /// Read the NTC temperature in °C.
    pub fn read_temperature(&mut self) -> Result<u8, Error> {
        self.read_register(registers::TEMP)
    }

    /// Program the NTC resistances (in Ohm) at 25, 50, 75 and 100 °C.
    pub fn set_ntc(&mut self, tr25: u16, tr50: u16, tr75: u16, tr100: u16) -> Result<(), Error> {
        let thresholds = [
            (registers::TR25, tr25),
            (registers::TR50, tr50),
            (registers::TR75, tr75),
            (registers::TR100, tr100),
        ];

        for (n, (register, resistance)) in thresholds.into_iter().enumerate() {
            if n > 0 {
                SettleDelay::NtcThresholdWrite.wait(&mut self.delay);
            }
            self.write_register(register, &resistance.to_le_bytes())?;
        }

        debug!("NTC set to {} / {} / {} / {} Ohm", tr25, tr50, tr75, tr100);
        Ok(())
    }

    /// Set the temperature in °C above which the controller de-rates the requested power.
    pub fn set_derating_temperature(&mut self, celsius: u8) -> Result<(), Error> {
        self.write_register(registers::DRTHR, &[celsius])
    }

    /// Set the over-temperature protection threshold in °C.
    pub fn set_otp_threshold(&mut self, celsius: u8) -> Result<(), Error> {
        self.write_register(registers::OTPTHR, &[celsius])
    }

    /// Set the over-current protection threshold.
    ///
    /// The threshold is truncated to the 50 mA register step.
    pub fn set_ocp_threshold(&mut self, current: ElectricCurrent) -> Result<(), Error> {
        let raw = current.get::<milliampere>() / registers::OCP_THRESHOLD_LSB_MILLIAMPERES;
        let raw = u8::try_from(raw).map_err(|_| Error::OutOfRange)?;

        self.write_register(registers::OCPTHR, &[raw])
    }

    fn update_mask(&mut self, f: impl FnOnce(u8) -> u8) -> Result<Mask, Error> {
        let current = self.read_register(registers::MASK)?;
        SettleDelay::MaskReadToWrite.wait(&mut self.delay);

        let mask = Mask::from(f(current));
        self.write_register(registers::MASK, &[mask.0])?;

        debug!("Interrupt mask {:?}", mask);
        Ok(mask)
    }

    /// Enable the interrupts in `flags`, and keep all others.
    pub fn set_mask(&mut self, flags: Mask) -> Result<Mask, Error> {
        self.update_mask(|current| current | flags.0)
    }

    /// Disable the interrupts in `flags`, and keep all others.
    pub fn clear_mask(&mut self, flags: Mask) -> Result<Mask, Error> {
        self.update_mask(|current| current & !flags.0)
    }

    /// Send an empty request, which makes the controller issue a hard reset.
    pub fn hard_reset(&mut self) -> Result<(), Error> {
        warn!("Hard reset");
        self.write_register(registers::RDO, &[0u8; 4])?;
        self.contract = None;
        Ok(())
    }
}
