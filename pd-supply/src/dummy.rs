//! Implements a dummy transport and delay for testing.
use std::collections::HashMap;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use pd_supply_traits::{Transport, TransportError};

use crate::sink::pdo::{FixedSupply, ProgrammableSupply};

/// A register transfer, as seen on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Read { device: u8, register: u8, len: usize },
    Write { device: u8, register: u8, data: Vec<u8> },
}

/// A dummy transport that emulates flat, auto-incrementing register maps.
#[derive(Debug, Default)]
pub struct DummyTransport {
    registers: HashMap<(u8, u8), u8>,
    transfers: Vec<Transfer>,
    /// Number of transfers that succeed before the next one fails.
    fail_after: Option<usize>,
}

impl DummyTransport {
    /// Create a new dummy transport with all registers cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset register content, starting at `register`.
    pub fn inject_registers(&mut self, device: u8, register: u8, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            self.registers.insert((device, register + offset as u8), *byte);
        }
    }

    /// Current content of a single register.
    pub fn register(&self, device: u8, register: u8) -> u8 {
        self.registers.get(&(device, register)).copied().unwrap_or_default()
    }

    /// Let `successful` further transfers pass, then fail every transfer.
    pub fn fail_after(&mut self, successful: usize) {
        self.fail_after = Some(successful);
    }

    /// All transfers since the last call.
    pub fn probe_transfers(&mut self) -> Vec<Transfer> {
        core::mem::take(&mut self.transfers)
    }

    /// All writes since the last call, transfers of other kinds are discarded.
    pub fn probe_writes(&mut self) -> Vec<(u8, Vec<u8>)> {
        self.probe_transfers()
            .into_iter()
            .filter_map(|transfer| match transfer {
                Transfer::Write { register, data, .. } => Some((register, data)),
                Transfer::Read { .. } => None,
            })
            .collect()
    }

    fn check_failure(&mut self) -> Result<(), TransportError> {
        match self.fail_after {
            Some(0) => Err(TransportError::NoAcknowledge),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Transport for DummyTransport {
    fn read(&mut self, device: u8, register: u8, buffer: &mut [u8]) -> Result<(), TransportError> {
        self.check_failure()?;

        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = self.register(device, register + offset as u8);
        }
        self.transfers.push(Transfer::Read {
            device,
            register,
            len: buffer.len(),
        });

        Ok(())
    }

    fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), TransportError> {
        self.check_failure()?;

        self.inject_registers(device, register, data);
        self.transfers.push(Transfer::Write {
            device,
            register,
            data: data.to_vec(),
        });

        Ok(())
    }
}

/// A dummy delay that records requested delays instead of blocking.
#[derive(Debug, Default)]
pub struct DummyDelay {
    /// Requested delays in milliseconds.
    pub delays: Vec<u32>,
}

impl DelayNs for DummyDelay {
    fn delay_ns(&mut self, _ns: u32) {
        // Do nothing.
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}

/// Build a fixed supply PDO.
pub fn fixed_pdo(millivolts: u16, milliamperes: u16) -> u32 {
    FixedSupply::default()
        .with_raw_voltage(millivolts / 50)
        .with_raw_max_current(milliamperes / 10)
        .0
}

/// Build a PPS APDO.
pub fn pps_pdo(min_millivolts: u16, max_millivolts: u16, milliamperes: u16) -> u32 {
    ProgrammableSupply::default()
        .with_raw_min_voltage((min_millivolts / 100) as u8)
        .with_raw_max_voltage((max_millivolts / 100) as u8)
        .with_raw_max_current((milliamperes / 50) as u8)
        .0
}

/// Serialize PDOs into a zero-padded capability table.
pub fn capability_table(pdos: &[u32]) -> [u8; 28] {
    let mut table = [0u8; 28];
    for (chunk, pdo) in table.chunks_exact_mut(4).zip(pdos) {
        chunk.copy_from_slice(&pdo.to_le_bytes());
    }
    table
}

/// Dummy capability table to parse.
///
/// - Fixed 5 V at 3 A
/// - Fixed 9 V at 3 A
/// - Fixed 15 V at 3 A
/// - Fixed 20 V at 2.25 A
/// - PPS 3.3-11 V at 5 A
pub const DUMMY_CAPABILITIES: [u8; 28] = [
    0x2c, // +
    0x91, // | Fixed 5V @ 3A
    0x01, // |
    0x08, // +
    0x2c, // +
    0xD1, // |
    0x02, // | Fixed 9V @ 3A
    0x00, // +
    0x2C, // +
    0xB1, // |
    0x04, // | Fixed 15V @ 3A
    0x00, // +
    0xE1, // +
    0x40, // |
    0x06, // | Fixed 20V @ 2.25A
    0x00, // +
    0x64, // +
    0x21, // |
    0xDC, // | PPS 3.3-11V @ 5A
    0xC8, // +
    0x00, 0x00, 0x00, 0x00, // Empty slot
    0x00, 0x00, 0x00, 0x00, // Empty slot
];

#[cfg(test)]
mod tests {
    use pd_supply_traits::{Transport, TransportError};

    use crate::dummy::{DummyTransport, Transfer};

    #[test]
    fn test_auto_increment() {
        let mut transport = DummyTransport::new();

        transport.write(0x51, 0x30, &[1, 2, 3, 4]).unwrap();

        let mut buf = [0u8; 2];
        transport.read(0x51, 0x32, &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);

        // Devices do not share registers.
        transport.read(0x74, 0x30, &mut buf).unwrap();
        assert_eq!(buf, [0, 0]);

        assert_eq!(transport.probe_transfers().len(), 3);
    }

    #[test]
    fn test_injected_failure() {
        let mut transport = DummyTransport::new();
        transport.fail_after(1);

        transport.write(0x74, 0x06, &[0xA0]).unwrap();
        assert_eq!(transport.write(0x74, 0x06, &[0x20]), Err(TransportError::NoAcknowledge));

        assert_eq!(
            transport.probe_transfers(),
            [Transfer::Write {
                device: 0x74,
                register: 0x06,
                data: std::vec![0xA0]
            }]
        );
        assert_eq!(transport.register(0x74, 0x06), 0xA0);
    }
}
