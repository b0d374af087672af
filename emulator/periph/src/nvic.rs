/*++

Licensed under the Apache-2.0 license.

File Name:

    nvic.rs

Abstract:

    File contains the interrupt enable tracker for the core NVIC and the
    vector table offset register.

--*/

use crate::{Event, EventSink, IrqController, MmioPeripheral, PeriphError};
use emulator_bus::Bus;
use emulator_consts::{NVIC_ISER_COUNT, NVIC_ISER_OFFSET, SCB_VTOR_OFFSET};
use emulator_types::{RvAddr, RvData, RvSize};
use std::sync::mpsc;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum NvicReg {
    /// Interrupt set-enable register covering lines `32 * n .. 32 * n + 32`.
    Iser(usize),
    Vtor,
}

impl NvicReg {
    fn decode(addr: RvAddr) -> Option<Self> {
        if addr == SCB_VTOR_OFFSET {
            return Some(NvicReg::Vtor);
        }
        let offset = addr.checked_sub(NVIC_ISER_OFFSET)?;
        let idx = (offset / 4) as usize;
        (offset % 4 == 0 && idx < NVIC_ISER_COUNT).then_some(NvicReg::Iser(idx))
    }
}

/// Tracks which interrupt lines the firmware enables. Lines are never disabled.
#[derive(Default)]
pub struct Nvic {
    iser: [u32; NVIC_ISER_COUNT],
    vtor: Option<u32>,
    events: EventSink,
}

impl Nvic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled_mask(&self, idx: usize) -> u32 {
        self.iser[idx]
    }

    pub fn is_enabled(&self, line: u32) -> bool {
        let idx = (line / 32) as usize;
        idx < NVIC_ISER_COUNT && self.iser[idx] & (1 << (line % 32)) != 0
    }

    /// Last value written to VTOR, if any.
    pub fn vtor(&self) -> Option<u32> {
        self.vtor
    }

    fn write_iser(&mut self, idx: usize, val: RvData) {
        let newly_enabled = val & !self.iser[idx];
        for bit in 0..32 {
            if newly_enabled & (1 << bit) != 0 {
                self.events.emit(Event::IrqEnabled {
                    controller: IrqController::Nvic,
                    line: idx as u32 * 32 + bit,
                });
            }
        }
        self.iser[idx] |= val;
    }
}

impl MmioPeripheral for Nvic {
    fn name(&self) -> &'static str {
        "nvic"
    }

    fn addresses(&self) -> Vec<RvAddr> {
        (0..NVIC_ISER_COUNT as RvAddr)
            .map(|idx| NVIC_ISER_OFFSET + idx * 4)
            .chain(std::iter::once(SCB_VTOR_OFFSET))
            .collect()
    }

    fn read(
        &mut self,
        _mem: &mut dyn Bus,
        _size: RvSize,
        addr: RvAddr,
    ) -> Result<Option<RvData>, PeriphError> {
        Ok(match NvicReg::decode(addr) {
            Some(NvicReg::Iser(idx)) => Some(self.iser[idx]),
            Some(NvicReg::Vtor) | None => None,
        })
    }

    fn write(
        &mut self,
        _mem: &mut dyn Bus,
        _size: RvSize,
        addr: RvAddr,
        val: RvData,
    ) -> Result<(), PeriphError> {
        match NvicReg::decode(addr) {
            Some(NvicReg::Iser(idx)) => self.write_iser(idx, val),
            Some(NvicReg::Vtor) => {
                self.vtor = Some(val);
                self.events.emit(Event::VectorTableRelocated { value: val });
            }
            None => {}
        }
        Ok(())
    }

    fn register_outgoing_events(&mut self, sender: mpsc::Sender<Event>) {
        self.events.register(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emulator_bus::Ram;

    fn nvic() -> (Nvic, Ram, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        let mut nvic = Nvic::new();
        nvic.register_outgoing_events(tx);
        (nvic, Ram::new(vec![]), rx)
    }

    fn enabled(line: u32) -> Event {
        Event::IrqEnabled {
            controller: IrqController::Nvic,
            line,
        }
    }

    #[test]
    fn test_decode() {
        assert_eq!(NvicReg::decode(0xe000_e100), Some(NvicReg::Iser(0)));
        assert_eq!(NvicReg::decode(0xe000_e11c), Some(NvicReg::Iser(7)));
        assert_eq!(NvicReg::decode(0xe000_e120), None);
        assert_eq!(NvicReg::decode(0xe000_e102), None);
        assert_eq!(NvicReg::decode(0xe000_ed08), Some(NvicReg::Vtor));
    }

    #[test]
    fn test_enable_emits_once_per_new_line() {
        let (mut nvic, mut mem, rx) = nvic();
        nvic.write(&mut mem, RvSize::Word, 0xe000_e104, 0b101)
            .unwrap();
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![enabled(32), enabled(34)]);
        assert_eq!(nvic.enabled_mask(1), 0b101);

        // Re-writing the same value is silent, new bits still report.
        nvic.write(&mut mem, RvSize::Word, 0xe000_e104, 0b101)
            .unwrap();
        assert_eq!(rx.try_iter().count(), 0);
        nvic.write(&mut mem, RvSize::Word, 0xe000_e104, 0b110)
            .unwrap();
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![enabled(33)]);
        assert_eq!(nvic.enabled_mask(1), 0b111);
    }

    #[test]
    fn test_never_disables() {
        let (mut nvic, mut mem, rx) = nvic();
        nvic.write(&mut mem, RvSize::Word, 0xe000_e11c, 0x8000_0000)
            .unwrap();
        nvic.write(&mut mem, RvSize::Word, 0xe000_e11c, 0).unwrap();
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![enabled(255)]);
        assert!(nvic.is_enabled(255));
        assert_eq!(
            nvic.read(&mut mem, RvSize::Word, 0xe000_e11c).unwrap(),
            Some(0x8000_0000)
        );
        assert_eq!(nvic.read(&mut mem, RvSize::Word, 0xe000_e100).unwrap(), Some(0));
    }

    #[test]
    fn test_vtor() {
        let (mut nvic, mut mem, rx) = nvic();
        nvic.write(&mut mem, RvSize::Word, 0xe000_ed08, 0x0000_1000)
            .unwrap();
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![Event::VectorTableRelocated { value: 0x1000 }]
        );
        assert_eq!(nvic.vtor(), Some(0x1000));
        assert_eq!(nvic.read(&mut mem, RvSize::Word, 0xe000_ed08).unwrap(), None);
    }
}
