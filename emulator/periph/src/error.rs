// Licensed under the Apache-2.0 license

use emulator_bus::BusError;
use emulator_types::RvAddr;
use thiserror::Error;

/// Conditions that stop the run. Recoverable model gaps are reported as
/// [`crate::Event`]s instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriphError {
    #[error("address 0x{addr:08x} is already claimed by {owner}")]
    AddressInUse { addr: RvAddr, owner: &'static str },
    #[error("emulated memory access at 0x{addr:08x} failed: {source}")]
    Bus { addr: RvAddr, source: BusError },
    #[error("PIODMA command 0x{command:08x} does not carry sub-opcode 0x11")]
    DmaBadOpcode { command: u32 },
    #[error("PIODMA packet word 0x{word:08x} has tag bits {tag:#04b}, expected 0b01")]
    DmaBadPacketTag { word: u32, tag: u8 },
    #[error("PIODMA packet word 0x{word:08x} has reserved bits 30-31 set")]
    DmaReservedBits { word: u32 },
    #[error("PIODMA command length {cmd_len} does not match packet length {packet_len} + 2")]
    DmaLengthMismatch { cmd_len: u32, packet_len: u32 },
    #[error("PIODMA destination offset 0x{offset:08x} outside the accepted window")]
    DmaDestinationOutOfWindow { offset: u32 },
    #[error("PIODMA read of {len} bytes at iova 0x{iova:x} exceeds the parameter buffer")]
    DmaParamOutOfRange { iova: u64, len: usize },
}
