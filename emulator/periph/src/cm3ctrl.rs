/*++

Licensed under the Apache-2.0 license.

File Name:

    cm3ctrl.rs

Abstract:

    File contains the interrupt block of the CM3 control registers. Unlike
    the NVIC tracker, lines are enabled and disabled, and status bits are
    write-one-to-clear.

--*/

use crate::{Event, EventSink, IrqController, MmioPeripheral, PeriphError};
use emulator_bus::Bus;
use emulator_consts::{
    CM3CTRL_IRQ0_LINES, CM3CTRL_IRQ_BANK_COUNT, CM3CTRL_IRQ_EN0_OFFSET, CM3CTRL_IRQ_EN_OFFSET,
    CM3CTRL_IRQ_STATUS0_OFFSET, CM3CTRL_IRQ_STATUS_OFFSET,
};
use emulator_types::{RvAddr, RvData, RvSize};
use std::sync::mpsc;

/// Register families in the block. Banks index the 32-line registers that
/// follow the 14-line register 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Cm3CtrlReg {
    IrqEnable0,
    IrqEnable(usize),
    IrqStatus0,
    IrqStatus(usize),
}

fn bank_index(addr: RvAddr, base: RvAddr) -> Option<usize> {
    let offset = addr.checked_sub(base)?;
    let idx = (offset / 4) as usize;
    (offset % 4 == 0 && idx < CM3CTRL_IRQ_BANK_COUNT).then_some(idx)
}

impl Cm3CtrlReg {
    fn decode(addr: RvAddr) -> Option<Self> {
        match addr {
            CM3CTRL_IRQ_EN0_OFFSET => Some(Cm3CtrlReg::IrqEnable0),
            CM3CTRL_IRQ_STATUS0_OFFSET => Some(Cm3CtrlReg::IrqStatus0),
            _ => bank_index(addr, CM3CTRL_IRQ_EN_OFFSET)
                .map(Cm3CtrlReg::IrqEnable)
                .or_else(|| bank_index(addr, CM3CTRL_IRQ_STATUS_OFFSET).map(Cm3CtrlReg::IrqStatus)),
        }
    }

    /// Absolute line number of bit 0 and the number of lines covered.
    fn lines(self) -> (u32, u32) {
        match self {
            Cm3CtrlReg::IrqEnable0 | Cm3CtrlReg::IrqStatus0 => (0, CM3CTRL_IRQ0_LINES),
            Cm3CtrlReg::IrqEnable(bank) | Cm3CtrlReg::IrqStatus(bank) => {
                (CM3CTRL_IRQ0_LINES + bank as u32 * 32, 32)
            }
        }
    }
}

#[derive(Default)]
pub struct Cm3Ctrl {
    irq_enable0: u32,
    irq_enable: [u32; CM3CTRL_IRQ_BANK_COUNT],
    events: EventSink,
}

impl Cm3Ctrl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, line: u32) -> bool {
        if line < CM3CTRL_IRQ0_LINES {
            return self.irq_enable0 & (1 << line) != 0;
        }
        let rel = line - CM3CTRL_IRQ0_LINES;
        let bank = (rel / 32) as usize;
        bank < CM3CTRL_IRQ_BANK_COUNT && self.irq_enable[bank] & (1 << (rel % 32)) != 0
    }

    fn enable_slot(&mut self, reg: Cm3CtrlReg) -> Option<&mut u32> {
        match reg {
            Cm3CtrlReg::IrqEnable0 => Some(&mut self.irq_enable0),
            Cm3CtrlReg::IrqEnable(bank) => Some(&mut self.irq_enable[bank]),
            _ => None,
        }
    }

    fn write_enable(&mut self, reg: Cm3CtrlReg, val: RvData) {
        let (first_line, count) = reg.lines();
        let Some(slot) = self.enable_slot(reg) else {
            return;
        };
        let old = std::mem::replace(slot, val);
        for bit in 0..count {
            let mask = 1 << bit;
            let line = first_line + bit;
            match (old & mask != 0, val & mask != 0) {
                (false, true) => self.events.emit(Event::IrqEnabled {
                    controller: IrqController::Cm3Ctrl,
                    line,
                }),
                (true, false) => self.events.emit(Event::IrqDisabled {
                    controller: IrqController::Cm3Ctrl,
                    line,
                }),
                _ => {}
            }
        }
    }

    fn write_status(&mut self, reg: Cm3CtrlReg, val: RvData) {
        let (first_line, count) = reg.lines();
        for bit in (0..count).filter(|bit| val & (1 << bit) != 0) {
            self.events.emit(Event::IrqCleared {
                line: first_line + bit,
            });
        }
    }
}

impl MmioPeripheral for Cm3Ctrl {
    fn name(&self) -> &'static str {
        "cm3ctrl"
    }

    fn addresses(&self) -> Vec<RvAddr> {
        let banks = |base: RvAddr| (0..CM3CTRL_IRQ_BANK_COUNT as RvAddr).map(move |i| base + i * 4);
        std::iter::once(CM3CTRL_IRQ_EN0_OFFSET)
            .chain(banks(CM3CTRL_IRQ_EN_OFFSET))
            .chain(std::iter::once(CM3CTRL_IRQ_STATUS0_OFFSET))
            .chain(banks(CM3CTRL_IRQ_STATUS_OFFSET))
            .collect()
    }

    fn read(
        &mut self,
        _mem: &mut dyn Bus,
        _size: RvSize,
        addr: RvAddr,
    ) -> Result<Option<RvData>, PeriphError> {
        Ok(match Cm3CtrlReg::decode(addr) {
            Some(Cm3CtrlReg::IrqEnable0) => Some(self.irq_enable0),
            Some(Cm3CtrlReg::IrqEnable(bank)) => Some(self.irq_enable[bank]),
            Some(Cm3CtrlReg::IrqStatus0 | Cm3CtrlReg::IrqStatus(_)) => {
                self.events.emit(Event::ReadNotImplemented { addr });
                None
            }
            None => None,
        })
    }

    fn write(
        &mut self,
        _mem: &mut dyn Bus,
        _size: RvSize,
        addr: RvAddr,
        val: RvData,
    ) -> Result<(), PeriphError> {
        match Cm3CtrlReg::decode(addr) {
            Some(reg @ (Cm3CtrlReg::IrqEnable0 | Cm3CtrlReg::IrqEnable(_))) => {
                self.write_enable(reg, val)
            }
            Some(reg @ (Cm3CtrlReg::IrqStatus0 | Cm3CtrlReg::IrqStatus(_))) => {
                self.write_status(reg, val)
            }
            None => {}
        }
        Ok(())
    }

    fn register_outgoing_events(&mut self, sender: mpsc::Sender<Event>) {
        self.events.register(sender);
    }
}
