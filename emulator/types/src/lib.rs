/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the primitive types shared by the bus and peripherals.

--*/

/// Physical address as seen by the emulated core.
pub type RvAddr = u32;

/// Data word moved across the bus.
pub type RvData = u32;

/// Width of a single bus access.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RvSize {
    Byte = 1,
    HalfWord = 2,
    Word = 4,
    Invalid = 0,
}

impl RvSize {
    /// Number of bytes covered by an access of this size.
    pub fn bytes(self) -> usize {
        self as usize
    }
}

impl From<usize> for RvSize {
    fn from(value: usize) -> Self {
        match value {
            1 => RvSize::Byte,
            2 => RvSize::HalfWord,
            4 => RvSize::Word,
            _ => RvSize::Invalid,
        }
    }
}
