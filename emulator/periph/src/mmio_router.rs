/*++

Licensed under the Apache-2.0 license.

File Name:

    mmio_router.rs

Abstract:

    File contains the router that binds MMIO addresses to peripheral models.

--*/

use crate::{Event, EventSink, PeriphError};
use emulator_bus::Bus;
use emulator_types::{RvAddr, RvData, RvSize};
use std::collections::HashMap;
use std::sync::mpsc;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessKind {
    Read,
    Write,
}

/// A single intercepted access as reported by the CPU hook.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MmioAccess {
    pub kind: AccessKind,
    /// Program counter of the instruction performing the access.
    pub pc: RvAddr,
    pub addr: RvAddr,
    pub size: RvSize,
    /// Written value; ignored for reads.
    pub value: RvData,
}

impl MmioAccess {
    pub fn read(pc: RvAddr, size: RvSize, addr: RvAddr) -> Self {
        Self {
            kind: AccessKind::Read,
            pc,
            addr,
            size,
            value: 0,
        }
    }

    pub fn write(pc: RvAddr, size: RvSize, addr: RvAddr, value: RvData) -> Self {
        Self {
            kind: AccessKind::Write,
            pc,
            addr,
            size,
            value,
        }
    }
}

/// A peripheral model reachable through the router.
///
/// `mem` is the emulated memory, for models that move data in or out of RAM.
pub trait MmioPeripheral {
    fn name(&self) -> &'static str;

    /// Every register address this model decodes.
    fn addresses(&self) -> Vec<RvAddr>;

    /// Returns the value the CPU observes, or `None` to leave it undefined.
    fn read(
        &mut self,
        mem: &mut dyn Bus,
        size: RvSize,
        addr: RvAddr,
    ) -> Result<Option<RvData>, PeriphError>;

    fn write(
        &mut self,
        mem: &mut dyn Bus,
        size: RvSize,
        addr: RvAddr,
        val: RvData,
    ) -> Result<(), PeriphError>;

    fn register_outgoing_events(&mut self, _sender: mpsc::Sender<Event>) {
        // By default, do nothing
    }
}

/// Address-keyed table of peripheral models. Holds no register state itself.
#[derive(Default)]
pub struct MmioRouter {
    peripherals: Vec<Box<dyn MmioPeripheral>>,
    handlers: HashMap<RvAddr, usize>,
    events: EventSink,
}

impl MmioRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peripheral(
        &mut self,
        mut peripheral: Box<dyn MmioPeripheral>,
    ) -> Result<(), PeriphError> {
        let addresses = peripheral.addresses();
        if let Some(addr) = addresses
            .iter()
            .find(|addr| self.handlers.contains_key(*addr))
        {
            let owner = self.peripherals[self.handlers[addr]].name();
            return Err(PeriphError::AddressInUse { addr: *addr, owner });
        }
        if let Some(sender) = self.events.sender() {
            peripheral.register_outgoing_events(sender.clone());
        }
        let idx = self.peripherals.len();
        for addr in addresses {
            self.handlers.insert(addr, idx);
        }
        log::debug!("registered {} at index {idx}", peripheral.name());
        self.peripherals.push(peripheral);
        Ok(())
    }

    pub fn handles(&self, addr: RvAddr) -> bool {
        self.handlers.contains_key(&addr)
    }

    pub fn dispatch(
        &mut self,
        mem: &mut dyn Bus,
        access: MmioAccess,
    ) -> Result<Option<RvData>, PeriphError> {
        let Some(&idx) = self.handlers.get(&access.addr) else {
            self.events.emit(match access.kind {
                AccessKind::Read => Event::UnknownRead {
                    pc: access.pc,
                    addr: access.addr,
                    size: access.size,
                },
                AccessKind::Write => Event::UnknownWrite {
                    pc: access.pc,
                    addr: access.addr,
                    size: access.size,
                    value: access.value,
                },
            });
            return Ok(None);
        };
        let peripheral = &mut self.peripherals[idx];
        match access.kind {
            AccessKind::Read => peripheral.read(mem, access.size, access.addr),
            AccessKind::Write => peripheral
                .write(mem, access.size, access.addr, access.value)
                .map(|_| None),
        }
    }

    pub fn register_outgoing_events(&mut self, sender: mpsc::Sender<Event>) {
        for peripheral in self.peripherals.iter_mut() {
            peripheral.register_outgoing_events(sender.clone());
        }
        self.events.register(sender);
    }
}
