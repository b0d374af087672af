/*++

Licensed under the Apache-2.0 license.

File Name:

    ram.rs

Abstract:

    File contains the byte-addressed RAM device.

--*/

use crate::{Bus, BusError};
use emulator_types::{RvAddr, RvData, RvSize};

/// Little-endian RAM addressed from offset zero.
pub struct Ram {
    data: Vec<u8>,
}

impl Ram {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> RvAddr {
        self.data.len() as RvAddr
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, addr: RvAddr, len: usize) -> Option<std::ops::Range<usize>> {
        let start = addr as usize;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }
}

impl Bus for Ram {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if size == RvSize::Invalid {
            return Err(BusError::LoadAccessFault);
        }
        let range = self
            .range(addr, size.bytes())
            .ok_or(BusError::LoadAccessFault)?;
        let mut word = [0u8; 4];
        word[..size.bytes()].copy_from_slice(&self.data[range]);
        Ok(u32::from_le_bytes(word))
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if size == RvSize::Invalid {
            return Err(BusError::StoreAccessFault);
        }
        let range = self
            .range(addr, size.bytes())
            .ok_or(BusError::StoreAccessFault)?;
        self.data[range].copy_from_slice(&val.to_le_bytes()[..size.bytes()]);
        Ok(())
    }

    fn read_bytes(&mut self, addr: RvAddr, len: usize) -> Result<Vec<u8>, BusError> {
        let range = self.range(addr, len).ok_or(BusError::LoadAccessFault)?;
        Ok(self.data[range].to_vec())
    }

    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        let range = self
            .range(addr, data.len())
            .ok_or(BusError::StoreAccessFault)?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}
