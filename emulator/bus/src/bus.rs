/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains definition of the Bus trait.

--*/

use emulator_types::{RvAddr, RvData, RvSize};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusError {
    /// Instruction access exception
    #[error("instruction access fault")]
    InstrAccessFault,

    /// Load address misaligned exception
    #[error("load address misaligned")]
    LoadAddrMisaligned,

    /// Load access fault exception
    #[error("load access fault")]
    LoadAccessFault,

    /// Store address misaligned exception
    #[error("store address misaligned")]
    StoreAddrMisaligned,

    /// Store access fault exception
    #[error("store access fault")]
    StoreAccessFault,
}

/// Represents an abstract memory bus. Used to read and write from RAM and
/// peripheral addresses.
pub trait Bus {
    /// Read data of specified size from given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    /// * `addr` - Address to read from
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError>;

    /// Write data of specified size to given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the write
    /// * `addr` - Address to write
    /// * `val` - Data to write
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError>;

    /// Read `len` consecutive bytes starting at `addr`.
    fn read_bytes(&mut self, addr: RvAddr, len: usize) -> Result<Vec<u8>, BusError> {
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let byte_addr = addr
                .checked_add(i as RvAddr)
                .ok_or(BusError::LoadAccessFault)?;
            out.push(self.read(RvSize::Byte, byte_addr)? as u8);
        }
        Ok(out)
    }

    /// Write `data` to consecutive bytes starting at `addr`.
    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        for (i, byte) in data.iter().enumerate() {
            let byte_addr = addr
                .checked_add(i as RvAddr)
                .ok_or(BusError::StoreAccessFault)?;
            self.write(RvSize::Byte, byte_addr, *byte as RvData)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ram;

    #[test]
    fn test_bus_error_display() {
        assert_eq!(BusError::LoadAccessFault.to_string(), "load access fault");
        let err: Box<dyn std::error::Error> = Box::new(BusError::StoreAccessFault);
        assert_eq!(err.to_string(), "store access fault");
    }

    #[test]
    fn test_bulk_helpers() {
        let mut ram = Ram::new(vec![0; 8]);
        ram.write_bytes(2, &[1, 2, 3]).unwrap();
        assert_eq!(ram.read_bytes(1, 4).unwrap(), [0, 1, 2, 3]);
        assert_eq!(ram.read_bytes(6, 4).err(), Some(BusError::LoadAccessFault));
    }
}
