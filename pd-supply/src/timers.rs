//! Settle delays that the chips require between specific register accesses.
//!
//! These are protocol requirements of the physical parts. They are enforced by the calling
//! sequence in the sessions and must not be optimized away.
use embedded_hal::delay::DelayNs;

/// Register access pairs that must be separated by a minimum delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettleDelay {
    /// Between reading a negotiation status and reading the capability table.
    StatusToCapabilities,
    /// Between reading the interrupt mask and writing it back.
    MaskReadToWrite,
    /// Between two consecutive NTC threshold writes.
    NtcThresholdWrite,
}

impl SettleDelay {
    /// The minimum delay in milliseconds.
    pub const fn millis(self) -> u32 {
        match self {
            SettleDelay::StatusToCapabilities => 10,
            SettleDelay::MaskReadToWrite => 5,
            SettleDelay::NtcThresholdWrite => 5,
        }
    }

    /// Block for the minimum delay.
    pub fn wait<D: DelayNs>(self, delay: &mut D) {
        trace!("Settle for {} ms ({:?})", self.millis(), self);
        delay.delay_ms(self.millis());
    }
}
