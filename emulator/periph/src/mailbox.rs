/*++

Licensed under the Apache-2.0 license.

File Name:

    mailbox.rs

Abstract:

    File contains the command/reply mailbox of the CM3 control block.
    Commands are staged in data RAM by the host; the firmware pulls their
    addresses one at a time and posts replies by offset.

--*/

use crate::{Event, EventSink, MmioPeripheral, PeriphError};
use emulator_bus::Bus;
use emulator_consts::{
    MAILBOX_COMMAND_BASE, MAILBOX_COMMAND_STRIDE, MAILBOX_MAX_COMMANDS, MAILBOX_REPLY_BASE,
    MAILBOX_RETRIEVE_OFFSET, MAILBOX_STATUS_OFFSET, MAILBOX_STATUS_READY, MAILBOX_SUBMIT_OFFSET,
};
use emulator_types::{RvAddr, RvData, RvSize};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc;

/// Where commands and replies live in emulated memory. Shared by the
/// mailbox model and whoever stages the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxLayout {
    pub command_base: RvAddr,
    pub command_stride: u32,
    pub max_commands: usize,
    pub reply_base: RvAddr,
}

impl Default for MailboxLayout {
    fn default() -> Self {
        Self {
            command_base: MAILBOX_COMMAND_BASE,
            command_stride: MAILBOX_COMMAND_STRIDE,
            max_commands: MAILBOX_MAX_COMMANDS,
            reply_base: MAILBOX_REPLY_BASE,
        }
    }
}

impl MailboxLayout {
    pub fn command_addr(&self, index: u32) -> RvAddr {
        self.command_base
            .wrapping_add(index.wrapping_mul(self.command_stride))
    }
}

pub struct Mailbox {
    layout: MailboxLayout,
    index: u32,
    loaded: Rc<Cell<Option<usize>>>,
    events: EventSink,
}

impl Mailbox {
    pub fn new(layout: MailboxLayout) -> Self {
        Self {
            layout,
            index: 0,
            loaded: Rc::new(Cell::new(None)),
            events: EventSink::default(),
        }
    }

    /// Handle through which the command feeder reports how many commands
    /// are staged. Unknown until set.
    pub fn loaded_commands(&self) -> Rc<Cell<Option<usize>>> {
        self.loaded.clone()
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn retrieve(&mut self) -> RvAddr {
        let index = self.index;
        let addr = self.layout.command_addr(index);
        self.index = index.wrapping_add(1);
        self.events.emit(Event::CommandRetrieved { index, addr });
        if let Some(loaded) = self.loaded.get() {
            if index as usize >= loaded {
                self.events
                    .emit(Event::CommandIndexOverrun { index, loaded });
            }
        }
        addr
    }

    fn submit(&mut self, mem: &mut dyn Bus, offset: RvData) -> Result<(), PeriphError> {
        let addr = self.layout.reply_base.wrapping_add(offset);
        let reply = mem
            .read_bytes(addr, self.layout.command_stride as usize)
            .map_err(|source| PeriphError::Bus { addr, source })?;
        self.events.emit(Event::ReplySubmitted { addr, reply });
        Ok(())
    }
}

impl MmioPeripheral for Mailbox {
    fn name(&self) -> &'static str {
        "mailbox"
    }

    fn addresses(&self) -> Vec<RvAddr> {
        vec![
            MAILBOX_STATUS_OFFSET,
            MAILBOX_RETRIEVE_OFFSET,
            MAILBOX_SUBMIT_OFFSET,
        ]
    }

    fn read(
        &mut self,
        _mem: &mut dyn Bus,
        _size: RvSize,
        addr: RvAddr,
    ) -> Result<Option<RvData>, PeriphError> {
        Ok(match addr {
            MAILBOX_STATUS_OFFSET => Some(MAILBOX_STATUS_READY),
            MAILBOX_RETRIEVE_OFFSET => Some(self.retrieve()),
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
            MAILBOX_SUBMIT_OFFSET => self.submit(mem, val),
            _ => {
                self.events
                    .emit(Event::WriteIgnored { addr, value: val });
                Ok(())
            }
        }
    }

    fn register_outgoing_events(&mut self, sender: mpsc::Sender<Event>) {
        self.events.register(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emulator_bus::{BusError, MemoryMap};
    use emulator_consts::{DRAM_OFFSET, DRAM_SIZE};

    fn mailbox() -> (Mailbox, MemoryMap, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        let mut mailbox = Mailbox::new(MailboxLayout::default());
        mailbox.register_outgoing_events(tx);
        let mut mem = MemoryMap::new();
        mem.map(DRAM_OFFSET, DRAM_SIZE).unwrap();
        (mailbox, mem, rx)
    }

    #[test]
    fn test_retrieve_sequence() {
        let (mut mailbox, mut mem, rx) = mailbox();
        for i in 0..3 {
            assert_eq!(
                mailbox
                    .read(&mut mem, RvSize::Word, MAILBOX_RETRIEVE_OFFSET)
                    .unwrap(),
                Some(MAILBOX_COMMAND_BASE + i * MAILBOX_COMMAND_STRIDE)
            );
        }
        assert_eq!(mailbox.index(), 3);
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![
                Event::CommandRetrieved {
                    index: 0,
                    addr: 0x1000_4000
                },
                Event::CommandRetrieved {
                    index: 1,
                    addr: 0x1000_4060
                },
                Event::CommandRetrieved {
                    index: 2,
                    addr: 0x1000_40c0
                },
            ]
        );
    }

    #[test]
    fn test_retrieve_past_loaded_still_returns_address() {
        let (mut mailbox, mut mem, rx) = mailbox();
        mailbox.loaded_commands().set(Some(1));
        mailbox
            .read(&mut mem, RvSize::Word, MAILBOX_RETRIEVE_OFFSET)
            .unwrap();
        rx.try_iter().for_each(drop);

        assert_eq!(
            mailbox
                .read(&mut mem, RvSize::Word, MAILBOX_RETRIEVE_OFFSET)
                .unwrap(),
            Some(0x1000_4060)
        );
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![
                Event::CommandRetrieved {
                    index: 1,
                    addr: 0x1000_4060
                },
                Event::CommandIndexOverrun {
                    index: 1,
                    loaded: 1
                },
            ]
        );
    }

    #[test]
    fn test_status_is_constant() {
        let (mut mailbox, mut mem, _rx) = mailbox();
        for _ in 0..2 {
            assert_eq!(
                mailbox
                    .read(&mut mem, RvSize::Word, MAILBOX_STATUS_OFFSET)
                    .unwrap(),
                Some(MAILBOX_STATUS_READY)
            );
        }
        assert_eq!(mailbox.index(), 0);
    }

    #[test]
    fn test_submit_reads_reply() {
        let (mut mailbox, mut mem, rx) = mailbox();
        let reply: Vec<u8> = (0..0x60).collect();
        mem.write_bytes(DRAM_OFFSET + 0x200, &reply).unwrap();
        mailbox
            .write(&mut mem, RvSize::Word, MAILBOX_SUBMIT_OFFSET, 0x200)
            .unwrap();
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![Event::ReplySubmitted {
                addr: 0x1000_0200,
                reply
            }]
        );
        assert_eq!(mailbox.index(), 0);
    }

    #[test]
    fn test_submit_outside_memory() {
        let (mut mailbox, mut mem, _rx) = mailbox();
        let err = mailbox
            .write(&mut mem, RvSize::Word, MAILBOX_SUBMIT_OFFSET, DRAM_SIZE)
            .unwrap_err();
        assert_eq!(
            err,
            PeriphError::Bus {
                addr: DRAM_OFFSET + DRAM_SIZE,
                source: BusError::LoadAccessFault
            }
        );
    }

    #[test]
    fn test_write_to_retrieve_ignored() {
        let (mut mailbox, mut mem, rx) = mailbox();
        mailbox
            .write(&mut mem, RvSize::Word, MAILBOX_RETRIEVE_OFFSET, 5)
            .unwrap();
        assert_eq!(mailbox.index(), 0);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![Event::WriteIgnored {
                addr: MAILBOX_RETRIEVE_OFFSET,
                value: 5
            }]
        );
        assert!(events[0].is_model_gap());
    }
}
