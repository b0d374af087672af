/*++

Licensed under the Apache-2.0 license.

File Name:

    event.rs

Abstract:

    File contains the diagnostic events raised by the peripheral models.

--*/

use emulator_types::{RvAddr, RvData, RvSize};
use std::fmt;
use std::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqController {
    /// Core interrupt controller in the System Control Space.
    Nvic,
    /// Interrupt block of the CM3 control registers.
    Cm3Ctrl,
}

impl fmt::Display for IrqController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrqController::Nvic => f.write_str("NVIC"),
            IrqController::Cm3Ctrl => f.write_str("CM3 control"),
        }
    }
}

/// Observable side effects of MMIO traffic. Events never alter control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    IrqEnabled {
        controller: IrqController,
        line: u32,
    },
    IrqDisabled {
        controller: IrqController,
        line: u32,
    },
    IrqCleared {
        line: u32,
    },
    VectorTableRelocated {
        value: RvData,
    },
    UnknownRead {
        pc: RvAddr,
        addr: RvAddr,
        size: RvSize,
    },
    UnknownWrite {
        pc: RvAddr,
        addr: RvAddr,
        size: RvSize,
        value: RvData,
    },
    ReadNotImplemented {
        addr: RvAddr,
    },
    WriteIgnored {
        addr: RvAddr,
        value: RvData,
    },
    CommandRetrieved {
        index: u32,
        addr: RvAddr,
    },
    CommandIndexOverrun {
        index: u32,
        loaded: usize,
    },
    ReplySubmitted {
        addr: RvAddr,
        reply: Vec<u8>,
    },
    DmaTransfer {
        iova: u64,
        dest: RvAddr,
        words: u32,
    },
}

impl Event {
    /// Events that point at a gap in the peripheral model.
    pub fn is_model_gap(&self) -> bool {
        matches!(
            self,
            Event::UnknownRead { .. }
                | Event::UnknownWrite { .. }
                | Event::ReadNotImplemented { .. }
                | Event::WriteIgnored { .. }
                | Event::CommandIndexOverrun { .. }
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::IrqEnabled { controller, line } => {
                write!(f, "{controller} enabling IRQ {line}")
            }
            Event::IrqDisabled { controller, line } => {
                write!(f, "{controller} disabling IRQ {line}")
            }
            Event::IrqCleared { line } => write!(f, "CM3 control clearing IRQ {line}"),
            Event::VectorTableRelocated { value } => write!(f, "VTOR = {value:08x}"),
            Event::UnknownRead { pc, addr, size } => write!(
                f,
                "UNKNOWN read @ PC {pc:08x} of size {} to register {addr:08x}",
                size.bytes()
            ),
            Event::UnknownWrite {
                pc,
                addr,
                size,
                value,
            } => write!(
                f,
                "UNKNOWN write @ PC {pc:08x} of size {} to register {addr:08x} with value {value:08x}",
                size.bytes()
            ),
            Event::ReadNotImplemented { addr } => {
                write!(f, "read of register {addr:08x} not implemented")
            }
            Event::WriteIgnored { addr, value } => write!(
                f,
                "write of {value:08x} to read-only register {addr:08x} ignored"
            ),
            Event::CommandRetrieved { index, addr } => {
                write!(f, "mailbox retrieve #{index} -> {addr:08x}")
            }
            Event::CommandIndexOverrun { index, loaded } => write!(
                f,
                "mailbox retrieve #{index} beyond the {loaded} loaded commands"
            ),
            Event::ReplySubmitted { addr, reply } => {
                write!(f, "mailbox reply @ {addr:08x}: {}", hex::encode(reply))
            }
            Event::DmaTransfer { iova, dest, words } => write!(
                f,
                "PIODMA copy iova {iova:x} -> {dest:08x} ({words} words)"
            ),
        }
    }
}

/// Logs events and forwards them to an optional outgoing channel.
#[derive(Default, Clone)]
pub struct EventSink {
    sender: Option<mpsc::Sender<Event>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sender: mpsc::Sender<Event>) {
        self.sender = Some(sender);
    }

    /// Registered outgoing channel, if any.
    pub fn sender(&self) -> Option<&mpsc::Sender<Event>> {
        self.sender.as_ref()
    }

    pub fn emit(&self, event: Event) {
        if event.is_model_gap() {
            log::warn!("{event}");
        } else {
            log::info!("{event}");
        }
        if let Some(sender) = &self.sender {
            // The receiver going away only means nobody is watching anymore.
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_trace_format() {
        let event = Event::UnknownWrite {
            pc: 0x1234,
            addr: 0x5001_0040,
            size: RvSize::Word,
            value: 0xff,
        };
        assert_eq!(
            event.to_string(),
            "UNKNOWN write @ PC 00001234 of size 4 to register 50010040 with value 000000ff"
        );
        assert_eq!(
            Event::IrqEnabled {
                controller: IrqController::Nvic,
                line: 33
            }
            .to_string(),
            "NVIC enabling IRQ 33"
        );
        assert_eq!(
            Event::ReplySubmitted {
                addr: 0x1000_0010,
                reply: vec![0xde, 0xad]
            }
            .to_string(),
            "mailbox reply @ 10000010: dead"
        );
    }

    #[test]
    fn test_sink_forwards_events() {
        let (tx, rx) = mpsc::channel();
        let mut sink = EventSink::new();
        sink.emit(Event::IrqCleared { line: 1 });
        sink.register(tx);
        sink.emit(Event::IrqCleared { line: 2 });
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![Event::IrqCleared { line: 2 }]
        );
    }
}
