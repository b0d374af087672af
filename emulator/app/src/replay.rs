/*++

Licensed under the Apache-2.0 license.

File Name:

    replay.rs

Abstract:

    File contains a CPU backend that replays a recorded memory access trace
    instead of executing instructions. Each call to `run` consumes one phase
    of the trace and pushes its loads and stores through the same memory
    and MMIO paths a real CPU hook would take.

--*/

use crate::cpu::{CpuAdapter, CpuError, CpuReg};
use emulator_bus::{Bus, MemoryMap};
use emulator_periph::{MmioAccess, MmioRouter};
use emulator_types::{RvAddr, RvData, RvSize};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("cannot read trace {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed trace: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceAccessKind {
    Read,
    Write,
}

/// One load or store as recorded from the firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAccess {
    pub kind: TraceAccessKind,
    pub pc: RvAddr,
    pub addr: RvAddr,
    /// Access width in bytes.
    pub size: usize,
    #[serde(default)]
    pub value: RvData,
}

/// Accesses performed between one `run` call and the next halt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracePhase {
    pub name: String,
    /// PC at which the firmware stopped on its own, e.g. a WFI loop.
    pub halt_pc: RvAddr,
    #[serde(default)]
    pub accesses: Vec<TraceAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub phases: Vec<TracePhase>,
}

impl Trace {
    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let json = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

/// Record of one completed `run` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub phase: String,
    pub begin: RvAddr,
    pub until: Option<RvAddr>,
    /// Link register on entry.
    pub lr: RvData,
}

struct Intercept {
    base: RvAddr,
    len: u32,
    router: Rc<RefCell<MmioRouter>>,
}

impl Intercept {
    fn contains(&self, addr: RvAddr) -> bool {
        addr >= self.base && (addr - self.base) < self.len
    }
}

pub struct ReplayCpu {
    mem: MemoryMap,
    regs: [RvData; CpuReg::COUNT],
    intercepts: Vec<Intercept>,
    phases: VecDeque<TracePhase>,
    runs: Vec<RunRecord>,
}

impl ReplayCpu {
    pub fn new(trace: Trace) -> Self {
        Self {
            mem: MemoryMap::new(),
            regs: [0; CpuReg::COUNT],
            intercepts: Vec::new(),
            phases: trace.phases.into(),
            runs: Vec::new(),
        }
    }

    pub fn remaining_phases(&self) -> usize {
        self.phases.len()
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    fn router_for(&self, addr: RvAddr) -> Option<Rc<RefCell<MmioRouter>>> {
        self.intercepts
            .iter()
            .find(|i| i.contains(addr))
            .map(|i| i.router.clone())
    }

    fn replay(&mut self, access: &TraceAccess) -> Result<(), CpuError> {
        let size = RvSize::from(access.size);
        if size == RvSize::Invalid {
            return Err(CpuError::InvalidAccessSize {
                pc: access.pc,
                size: access.size,
            });
        }
        if !self.mem.is_mapped(access.addr, size.bytes()) {
            return Err(CpuError::Unmapped {
                addr: access.addr,
                len: size.bytes(),
            });
        }
        self.regs[CpuReg::Pc.index()] = access.pc;

        let router = self.router_for(access.addr);
        match (access.kind, router) {
            (TraceAccessKind::Read, Some(router)) => {
                let mmio = MmioAccess::read(access.pc, size, access.addr);
                let value = router.borrow_mut().dispatch(&mut self.mem, mmio)?;
                if let Some(value) = value {
                    self.store(size, access.addr, value)?;
                }
                let observed = self.load(size, access.addr)?;
                log::debug!(
                    "PC {:08x}: read {:08x} -> {observed:08x}",
                    access.pc,
                    access.addr
                );
            }
            (TraceAccessKind::Write, Some(router)) => {
                // The backing store keeps the raw bytes whether or not a
                // model claims the register.
                self.store(size, access.addr, access.value)?;
                let mmio = MmioAccess::write(access.pc, size, access.addr, access.value);
                router.borrow_mut().dispatch(&mut self.mem, mmio)?;
            }
            (TraceAccessKind::Read, None) => {
                self.load(size, access.addr)?;
            }
            (TraceAccessKind::Write, None) => {
                self.store(size, access.addr, access.value)?;
            }
        }
        Ok(())
    }

    fn load(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, CpuError> {
        self.mem
            .read(size, addr)
            .map_err(|source| CpuError::Bus { addr, source })
    }

    fn store(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), CpuError> {
        self.mem
            .write(size, addr, val)
            .map_err(|source| CpuError::Bus { addr, source })
    }
}

impl CpuAdapter for ReplayCpu {
    fn map_region(&mut self, base: RvAddr, len: u32) -> Result<(), CpuError> {
        self.mem.map(base, len)?;
        Ok(())
    }

    fn write_memory(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), CpuError> {
        if !self.mem.is_mapped(addr, data.len()) {
            return Err(CpuError::Unmapped {
                addr,
                len: data.len(),
            });
        }
        self.mem
            .write_bytes(addr, data)
            .map_err(|source| CpuError::Bus { addr, source })
    }

    fn read_memory(&mut self, addr: RvAddr, len: usize) -> Result<Vec<u8>, CpuError> {
        if !self.mem.is_mapped(addr, len) {
            return Err(CpuError::Unmapped { addr, len });
        }
        self.mem
            .read_bytes(addr, len)
            .map_err(|source| CpuError::Bus { addr, source })
    }

    fn reg_read(&self, reg: CpuReg) -> RvData {
        self.regs[reg.index()]
    }

    fn reg_write(&mut self, reg: CpuReg, val: RvData) {
        self.regs[reg.index()] = val;
    }

    fn register_intercept(
        &mut self,
        base: RvAddr,
        len: u32,
        router: Rc<RefCell<MmioRouter>>,
    ) -> Result<(), CpuError> {
        if !self.mem.is_mapped(base, len as usize) {
            return Err(CpuError::InterceptNotMapped { base, len });
        }
        self.intercepts.push(Intercept { base, len, router });
        Ok(())
    }

    fn run(&mut self, begin: RvAddr, until: Option<RvAddr>) -> Result<(), CpuError> {
        let phase = self
            .phases
            .pop_front()
            .ok_or(CpuError::TraceExhausted { begin })?;
        log::debug!(
            "replaying phase {} ({} accesses) from {begin:08x}",
            phase.name,
            phase.accesses.len()
        );
        self.runs.push(RunRecord {
            phase: phase.name.clone(),
            begin,
            until,
            lr: self.regs[CpuReg::Lr.index()],
        });
        self.regs[CpuReg::Pc.index()] = begin;
        for access in &phase.accesses {
            self.replay(access)?;
        }
        self.regs[CpuReg::Pc.index()] = until.unwrap_or(phase.halt_pc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emulator_periph::{Event, MmioPeripheral, Nvic, PeriphError};
    use std::sync::mpsc;

    const WINDOW: RvAddr = 0xe000_c000;

    struct Fixed;

    impl MmioPeripheral for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn addresses(&self) -> Vec<RvAddr> {
            vec![WINDOW + 0x10]
        }

        fn read(
            &mut self,
            _mem: &mut dyn Bus,
            _size: RvSize,
            _addr: RvAddr,
        ) -> Result<Option<RvData>, PeriphError> {
            Ok(Some(0xcafe_f00d))
        }

        fn write(
            &mut self,
            _mem: &mut dyn Bus,
            _size: RvSize,
            _addr: RvAddr,
            _val: RvData,
        ) -> Result<(), PeriphError> {
            Ok(())
        }
    }

    fn cpu(json: &str) -> (ReplayCpu, mpsc::Receiver<Event>) {
        let mut router = MmioRouter::new();
        router.add_peripheral(Box::new(Fixed)).unwrap();
        router.add_peripheral(Box::new(Nvic::new())).unwrap();
        let (tx, rx) = mpsc::channel();
        router.register_outgoing_events(tx);

        let mut cpu = ReplayCpu::new(Trace::from_json(json).unwrap());
        cpu.map_region(0, 0x1000).unwrap();
        cpu.map_region(WINDOW, 0x4000).unwrap();
        cpu.register_intercept(WINDOW, 0x4000, Rc::new(RefCell::new(router)))
            .unwrap();
        (cpu, rx)
    }

    #[test]
    fn test_router_value_lands_in_backing_store() {
        let (mut cpu, rx) = cpu(r#"{"phases": [{"name": "boot", "halt_pc": 258, "accesses": [
            {"kind": "read", "pc": 256, "addr": 3758145552, "size": 4},
            {"kind": "read", "pc": 260, "addr": 3758145556, "size": 4},
            {"kind": "write", "pc": 264, "addr": 3758153984, "size": 4, "value": 6}
        ]}]}"#);
        cpu.run(0x100, None).unwrap();
        assert_eq!(
            cpu.read_memory(WINDOW + 0x10, 4).unwrap(),
            0xcafe_f00du32.to_le_bytes()
        );
        // Unclaimed register keeps whatever was last stored there.
        assert_eq!(cpu.read_memory(WINDOW + 0x14, 4).unwrap(), [0; 4]);
        assert_eq!(cpu.reg_read(CpuReg::Pc), 258);
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![
                Event::UnknownRead {
                    pc: 260,
                    addr: WINDOW + 0x14,
                    size: RvSize::Word
                },
                Event::IrqEnabled {
                    controller: emulator_periph::IrqController::Nvic,
                    line: 1
                },
                Event::IrqEnabled {
                    controller: emulator_periph::IrqController::Nvic,
                    line: 2
                },
            ]
        );
    }

    #[test]
    fn test_run_until_and_exhaustion() {
        let (mut cpu, _rx) = cpu(r#"{"phases": [{"name": "irq", "halt_pc": 0}]}"#);
        cpu.reg_write(CpuReg::Lr, 0xfff0);
        cpu.run(0x201, Some(0xfff0)).unwrap();
        assert_eq!(cpu.reg_read(CpuReg::Pc), 0xfff0);
        assert_eq!(
            cpu.runs(),
            [RunRecord {
                phase: "irq".into(),
                begin: 0x201,
                until: Some(0xfff0),
                lr: 0xfff0
            }]
        );
        assert_eq!(cpu.remaining_phases(), 0);
        assert!(matches!(
            cpu.run(0x201, None),
            Err(CpuError::TraceExhausted { begin: 0x201 })
        ));
    }

    #[test]
    fn test_memory_faults() {
        let (mut cpu, _rx) = cpu(r#"{"phases": [{"name": "bad", "halt_pc": 0, "accesses": [
            {"kind": "write", "pc": 16, "addr": 268435456, "size": 4, "value": 1}
        ]}]}"#);
        assert!(matches!(
            cpu.map_region(0x800, 0x1000),
            Err(CpuError::Map(_))
        ));
        assert!(matches!(
            cpu.write_memory(0xffc, &[0; 8]),
            Err(CpuError::Unmapped { addr: 0xffc, len: 8 })
        ));
        assert!(matches!(
            cpu.register_intercept(0x5001_0000, 0x4000, Rc::new(RefCell::new(MmioRouter::new()))),
            Err(CpuError::InterceptNotMapped { .. })
        ));
        assert!(matches!(
            cpu.run(0, None),
            Err(CpuError::Unmapped {
                addr: 0x1000_0000,
                len: 4
            })
        ));
    }

    #[test]
    fn test_trace_parse_errors() {
        assert!(matches!(
            Trace::from_json(r#"{"phases": [{"name": "x"}]}"#),
            Err(TraceError::Parse(_))
        ));
        assert!(matches!(
            Trace::load(Path::new("/nonexistent/trace.json")),
            Err(TraceError::Io { .. })
        ));
    }
}
