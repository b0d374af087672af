/*++

Licensed under the Apache-2.0 license.

File Name:

    memory_map.rs

Abstract:

    File contains the physical address space: a set of disjoint RAM regions.

--*/

use crate::{Bus, BusError, Ram};
use emulator_types::{RvAddr, RvData, RvSize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    #[error("region 0x{base:08x}+0x{len:x} is empty or wraps the address space")]
    InvalidRegion { base: RvAddr, len: u32 },
    #[error("region 0x{base:08x}+0x{len:x} overlaps an existing mapping")]
    Overlap { base: RvAddr, len: u32 },
}

pub struct Region {
    pub base: RvAddr,
    pub ram: Ram,
}

impl Region {
    /// Exclusive end address as u64 so that a region ending at 4 GiB is representable.
    fn end(&self) -> u64 {
        self.base as u64 + self.ram.len() as u64
    }

    fn contains(&self, addr: RvAddr, len: usize) -> bool {
        addr >= self.base && addr as u64 + len as u64 <= self.end()
    }
}

/// Disjoint regions of zero-initialised RAM.
#[derive(Default)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, base: RvAddr, len: u32) -> Result<(), MapError> {
        if len == 0 || base as u64 + len as u64 > 1 << 32 {
            return Err(MapError::InvalidRegion { base, len });
        }
        let end = base as u64 + len as u64;
        if self
            .regions
            .iter()
            .any(|r| (base as u64) < r.end() && end > r.base as u64)
        {
            return Err(MapError::Overlap { base, len });
        }
        self.regions.push(Region {
            base,
            ram: Ram::new(vec![0; len as usize]),
        });
        self.regions.sort_by_key(|r| r.base);
        Ok(())
    }

    /// Whether the whole span `[addr, addr + len)` lies inside a single region.
    pub fn is_mapped(&self, addr: RvAddr, len: usize) -> bool {
        self.region(addr, len).is_some()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    fn region(&self, addr: RvAddr, len: usize) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(addr, len))
    }
}

impl Bus for MemoryMap {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        let idx = self
            .region(addr, size.bytes())
            .ok_or(BusError::LoadAccessFault)?;
        let region = &mut self.regions[idx];
        region.ram.read(size, addr - region.base)
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        let idx = self
            .region(addr, size.bytes())
            .ok_or(BusError::StoreAccessFault)?;
        let region = &mut self.regions[idx];
        region.ram.write(size, addr - region.base, val)
    }

    fn read_bytes(&mut self, addr: RvAddr, len: usize) -> Result<Vec<u8>, BusError> {
        let idx = self.region(addr, len).ok_or(BusError::LoadAccessFault)?;
        let region = &mut self.regions[idx];
        region.ram.read_bytes(addr - region.base, len)
    }

    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        let idx = self
            .region(addr, data.len())
            .ok_or(BusError::StoreAccessFault)?;
        let region = &mut self.regions[idx];
        region.ram.write_bytes(addr - region.base, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_regions() {
        let mut map = MemoryMap::new();
        map.map(0x1000_0000, 0x100).unwrap();
        map.map(0, 0x100).unwrap();
        assert_eq!(
            map.map(0x80, 0x100),
            Err(MapError::Overlap {
                base: 0x80,
                len: 0x100
            })
        );
        assert_eq!(
            map.map(0x2000, 0),
            Err(MapError::InvalidRegion { base: 0x2000, len: 0 })
        );
        assert_eq!(map.regions()[0].base, 0);
        assert!(map.is_mapped(0x1000_00fc, 4));
        assert!(!map.is_mapped(0x1000_00fe, 4));
    }

    #[test]
    fn test_routing_by_address() {
        let mut map = MemoryMap::new();
        map.map(0, 0x100).unwrap();
        map.map(0x1000_0000, 0x100).unwrap();

        map.write(RvSize::Word, 0x1000_0010, 0xdead_beef).unwrap();
        assert_eq!(map.read(RvSize::Word, 0x1000_0010).unwrap(), 0xdead_beef);
        assert_eq!(map.read(RvSize::Word, 0x10).unwrap(), 0);

        map.write_bytes(0x20, &[1, 2, 3, 4]).unwrap();
        assert_eq!(map.read_bytes(0x20, 4).unwrap(), vec![1, 2, 3, 4]);

        assert_eq!(
            map.read(RvSize::Word, 0x200).err(),
            Some(BusError::LoadAccessFault)
        );
        assert_eq!(
            map.write_bytes(0xfe, &[0; 4]).err(),
            Some(BusError::StoreAccessFault)
        );
    }

    #[test]
    fn test_region_at_top_of_address_space() {
        let mut map = MemoryMap::new();
        map.map(0xffff_f000, 0x1000).unwrap();
        map.write(RvSize::Word, 0xffff_fffc, 7).unwrap();
        assert_eq!(map.read(RvSize::Word, 0xffff_fffc).unwrap(), 7);
    }
}
