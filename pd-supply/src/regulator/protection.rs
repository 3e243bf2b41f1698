//! Reaction to faults that the regulator reports.
//!
//! A fault always disables the output. Turning it back on is left to the caller.
use super::codec::RegulatorStatus;

/// The fault that triggered a protection action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FaultKind {
    /// Output short circuit.
    ShortCircuit,
    /// Output overcurrent.
    OverCurrent,
    /// Output overvoltage.
    OverVoltage,
}

/// The required reaction to a status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    /// No fault, nothing to do.
    None,
    /// Clear the output enable bit.
    DisableOutput(FaultKind),
}

/// Decide on the reaction to `status`.
///
/// With several faults at once, the first of short circuit, overcurrent and overvoltage is reported.
pub fn check_and_act(status: &RegulatorStatus) -> Action {
    let fault = if status.short_circuit {
        FaultKind::ShortCircuit
    } else if status.over_current {
        FaultKind::OverCurrent
    } else if status.over_voltage {
        FaultKind::OverVoltage
    } else {
        return Action::None;
    };

    Action::DisableOutput(fault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulator::codec::{OperatingMode, decode_status};

    #[test]
    fn test_no_fault() {
        let status = decode_status(0b0100_0000);
        assert_eq!(status.mode, OperatingMode::Buck);
        assert_eq!(check_and_act(&status), Action::None);
    }

    #[test]
    fn test_priority() {
        // Overcurrent and overvoltage.
        let status = decode_status(0b0000_0110);
        assert_eq!(check_and_act(&status), Action::DisableOutput(FaultKind::OverCurrent));

        // All faults.
        let status = decode_status(0b0000_0111);
        assert_eq!(check_and_act(&status), Action::DisableOutput(FaultKind::ShortCircuit));

        let status = decode_status(0b1000_0100);
        assert_eq!(check_and_act(&status), Action::DisableOutput(FaultKind::OverVoltage));
    }
}
