//! Decoding of the sink controller's status register into negotiation events.
use super::registers::Status;

/// Outcome of the latest negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NegotiationOutcome {
    /// No negotiation finished yet.
    #[default]
    None,
    /// A new set of capabilities was received, and a contract was established.
    NewProfileSuccess,
    /// A new set of capabilities was received, but no contract was established.
    NewProfileFailure,
    /// A request towards known capabilities was accepted.
    RenegotiationSuccess,
    /// A request towards known capabilities was rejected.
    RenegotiationFailure,
}

/// Protection flags reported by the sink controller.
///
/// The flags are independent of each other, and of the negotiation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub struct Protection {
    pub over_voltage: bool,
    pub over_current: bool,
    pub over_temperature: bool,
    pub data_role_change: bool,
}

impl Protection {
    /// Whether any flag is set.
    pub fn any(&self) -> bool {
        self.over_voltage || self.over_current || self.over_temperature || self.data_role_change
    }
}

/// A decoded status register read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NegotiationEvent {
    /// Outcome of the latest negotiation.
    pub outcome: NegotiationOutcome,
    /// Protection flags of this read.
    pub protection: Protection,
}

/// Decode a raw status byte.
///
/// While the controller is not ready, the `previous` outcome is kept. Protection flags are always
/// taken from `status`.
pub fn decode_negotiation(status: u8, previous: NegotiationOutcome) -> NegotiationEvent {
    let status = Status(status);

    let outcome = match (status.ready(), status.new_pdo(), status.success()) {
        (false, _, _) => previous,
        (true, true, true) => NegotiationOutcome::NewProfileSuccess,
        (true, true, false) => NegotiationOutcome::NewProfileFailure,
        (true, false, true) => NegotiationOutcome::RenegotiationSuccess,
        (true, false, false) => NegotiationOutcome::RenegotiationFailure,
    };

    let protection = Protection {
        over_voltage: status.ovp(),
        over_current: status.ocp(),
        over_temperature: status.otp(),
        data_role_change: status.dr(),
    };

    if protection.any() {
        warn!("Sink protection flags {:?}", protection);
    }

    NegotiationEvent { outcome, protection }
}
