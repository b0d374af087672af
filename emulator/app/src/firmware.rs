// Licensed under the Apache-2.0 license

use emulator_types::RvAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("firmware image is {len} bytes, too short for the SP/PC header")]
    TooShort { len: usize },
    /// Raised by the scenario driver against the configured instruction RAM.
    #[error("firmware image is {len} bytes, larger than instruction RAM (0x{max:x} bytes)")]
    TooLarge { len: usize, max: u32 },
    #[error("cannot read firmware image {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Raw Cortex-M image: initial SP, reset PC, then the vector table.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    pub fn new(data: Vec<u8>) -> Result<Self, FirmwareError> {
        if data.len() < 8 {
            return Err(FirmwareError::TooShort { len: data.len() });
        }
        Ok(Self { data })
    }

    pub fn load(path: &Path) -> Result<Self, FirmwareError> {
        let data = std::fs::read(path).map_err(|source| FirmwareError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(data)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn word(&self, offset: usize) -> Option<u32> {
        let bytes = self.data.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn initial_sp(&self) -> u32 {
        self.word(0).unwrap_or_default()
    }

    pub fn initial_pc(&self) -> RvAddr {
        self.word(4).unwrap_or_default()
    }

    /// Handler address for interrupt `line` in the table at `table_offset`.
    pub fn vector(&self, table_offset: u32, line: u32) -> Option<RvAddr> {
        let offset = (line as usize)
            .checked_mul(4)?
            .checked_add(table_offset as usize)?;
        self.word(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_vectors() {
        let mut data = vec![0u8; 0x50];
        data[0..4].copy_from_slice(&0x1000_8000u32.to_le_bytes());
        data[4..8].copy_from_slice(&0x0000_0101u32.to_le_bytes());
        data[0x44..0x48].copy_from_slice(&0x0000_0201u32.to_le_bytes());
        let image = FirmwareImage::new(data).unwrap();
        assert_eq!(image.initial_sp(), 0x1000_8000);
        assert_eq!(image.initial_pc(), 0x101);
        assert_eq!(image.vector(0x40, 1), Some(0x201));
        assert_eq!(image.vector(0x40, 3), Some(0));
        assert_eq!(image.vector(0x40, 4), None);
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(matches!(
            FirmwareImage::new(vec![0; 7]),
            Err(FirmwareError::TooShort { len: 7 })
        ));
        // Capacity depends on the configured instruction RAM, checked by the
        // scenario driver.
        assert!(FirmwareImage::new(vec![0; 0x2_0000]).is_ok());
        assert!(matches!(
            FirmwareImage::load(Path::new("/nonexistent/avd.bin")),
            Err(FirmwareError::Io { .. })
        ));
    }
}
