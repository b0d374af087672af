/*++

Licensed under the Apache-2.0 license.

File Name:

    piodma.rs

Abstract:

    File contains the PIODMA descriptor engine. The firmware latches an IOVA
    into the host parameter buffer and issues a command; the engine parses
    the packet header found there and copies the payload into data RAM.
    Transfers complete synchronously on the command write.

--*/

use crate::{Event, EventSink, MmioPeripheral, PeriphError};
use bitfield::bitfield;
use emulator_bus::Bus;
use emulator_consts::{
    DRAM_OFFSET, PIODMA_COMMAND_IDLE, PIODMA_COMMAND_OFFSET, PIODMA_IOVA_HI_OFFSET,
    PIODMA_IOVA_LO_OFFSET, PIODMA_SUB_OPCODE, PIODMA_WINDOW_SIZE, PIODMA_WINDOW_START,
};
use emulator_types::{RvAddr, RvData, RvSize};
use std::sync::mpsc;

bitfield! {
    /// Value written to the command register.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PioDmaCommand(u32);
    impl Debug;
    pub u8, sub_opcode, set_sub_opcode: 7, 0;
    /// Transfer length in words, header included.
    pub u32, cmd_len, set_cmd_len: 29, 8;
}

bitfield! {
    /// First word of a packet in the parameter buffer.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PacketWord(u32);
    impl Debug;
    pub u8, tag, set_tag: 1, 0;
    pub u32, packet_len, set_packet_len: 29, 24;
    pub u8, reserved, _: 31, 30;
}

impl PacketWord {
    const TAG_DATA: u8 = 0b01;

    /// Byte offset of the destination, bits 2-23.
    pub fn dest_offset(&self) -> u32 {
        self.0 & 0x00ff_fffc
    }
}

/// Where packet destinations land in emulated memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PioDmaConfig {
    pub data_ram_base: RvAddr,
    pub window_start: u32,
    pub window_size: u32,
}

impl Default for PioDmaConfig {
    fn default() -> Self {
        Self {
            data_ram_base: DRAM_OFFSET,
            window_start: PIODMA_WINDOW_START,
            window_size: PIODMA_WINDOW_SIZE,
        }
    }
}

impl PioDmaConfig {
    fn target(&self, offset: u32) -> Option<RvAddr> {
        let rel = offset.checked_sub(self.window_start)?;
        (rel < self.window_size).then(|| self.data_ram_base.wrapping_add(rel))
    }
}

pub struct PioDma {
    iova_lo: u32,
    iova_hi: u32,
    /// Host memory reachable through IOVAs.
    params: Vec<u8>,
    config: PioDmaConfig,
    events: EventSink,
}

impl PioDma {
    pub fn new(params: Vec<u8>, config: PioDmaConfig) -> Self {
        Self {
            iova_lo: 0,
            iova_hi: 0,
            params,
            config,
            events: EventSink::default(),
        }
    }

    pub fn iova(&self) -> u64 {
        (u64::from(self.iova_hi) << 32) | u64::from(self.iova_lo)
    }

    fn params_at(&self, iova: u64, len: usize) -> Result<&[u8], PeriphError> {
        usize::try_from(iova)
            .ok()
            .and_then(|start| Some(start..start.checked_add(len)?))
            .and_then(|range| self.params.get(range))
            .ok_or(PeriphError::DmaParamOutOfRange { iova, len })
    }

    fn execute(&mut self, mem: &mut dyn Bus, command: PioDmaCommand) -> Result<(), PeriphError> {
        if command.sub_opcode() != PIODMA_SUB_OPCODE {
            return Err(PeriphError::DmaBadOpcode { command: command.0 });
        }
        let iova = self.iova();
        let header = self.params_at(iova, 4)?;
        let word = PacketWord(u32::from_le_bytes([
            header[0], header[1], header[2], header[3],
        ]));
        if word.tag() != PacketWord::TAG_DATA {
            return Err(PeriphError::DmaBadPacketTag {
                word: word.0,
                tag: word.tag(),
            });
        }
        if word.reserved() != 0 {
            return Err(PeriphError::DmaReservedBits { word: word.0 });
        }
        if word.packet_len() + 2 != command.cmd_len() {
            return Err(PeriphError::DmaLengthMismatch {
                cmd_len: command.cmd_len(),
                packet_len: word.packet_len(),
            });
        }
        let offset = word.dest_offset();
        let dest = self
            .config
            .target(offset)
            .ok_or(PeriphError::DmaDestinationOutOfWindow { offset })?;

        // One word short of the command length, matching observed hardware.
        let words = word.packet_len() + 1;
        let payload = self.params_at(iova + 4, words as usize * 4)?;
        mem.write_bytes(dest, payload)
            .map_err(|source| PeriphError::Bus { addr: dest, source })?;
        self.events.emit(Event::DmaTransfer { iova, dest, words });
        Ok(())
    }
}

impl MmioPeripheral for PioDma {
    fn name(&self) -> &'static str {
        "piodma"
    }

    fn addresses(&self) -> Vec<RvAddr> {
        vec![
            PIODMA_IOVA_LO_OFFSET,
            PIODMA_IOVA_HI_OFFSET,
            PIODMA_COMMAND_OFFSET,
        ]
    }

    fn read(
        &mut self,
        _mem: &mut dyn Bus,
        _size: RvSize,
        addr: RvAddr,
    ) -> Result<Option<RvData>, PeriphError> {
        Ok(match addr {
            PIODMA_IOVA_LO_OFFSET => Some(self.iova_lo),
            PIODMA_IOVA_HI_OFFSET => Some(self.iova_hi),
            PIODMA_COMMAND_OFFSET => Some(PIODMA_COMMAND_IDLE),
            _ => None,
        })
    }

    fn write(
        &mut self,
        mem: &mut dyn Bus,
        _size: RvSize,
        addr: RvAddr,
        val: RvData,
    ) -> Result<(), PeriphError> {
        match addr {
            PIODMA_IOVA_LO_OFFSET => self.iova_lo = val,
            PIODMA_IOVA_HI_OFFSET => self.iova_hi = val,
            PIODMA_COMMAND_OFFSET => self.execute(mem, PioDmaCommand(val))?,
            _ => {}
        }
        Ok(())
    }

    fn register_outgoing_events(&mut self, sender: mpsc::Sender<Event>) {
        self.events.register(sender);
    }
}
