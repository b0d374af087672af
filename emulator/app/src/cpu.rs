/*++

Licensed under the Apache-2.0 license.

File Name:

    cpu.rs

Abstract:

    File contains the boundary between the scenario driver and the
    instruction-level CPU emulator.

--*/

use emulator_bus::{BusError, MapError};
use emulator_periph::{MmioRouter, PeriphError};
use emulator_types::{RvAddr, RvData};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use strum_macros::EnumIter;
use thiserror::Error;

/// Core registers visible to the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum CpuReg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    Sp,
    Lr,
    Pc,
}

impl CpuReg {
    pub const COUNT: usize = 16;

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CpuReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuReg::Sp => f.pad("SP"),
            CpuReg::Lr => f.pad("LR"),
            CpuReg::Pc => f.pad("PC"),
            reg => f.pad(&format!("R{}", reg.index())),
        }
    }
}

#[derive(Error, Debug)]
pub enum CpuError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("access of {len} bytes at 0x{addr:08x} hits unmapped memory")]
    Unmapped { addr: RvAddr, len: usize },
    #[error("memory access at 0x{addr:08x} faulted: {source}")]
    Bus { addr: RvAddr, source: BusError },
    #[error("intercept 0x{base:08x}+0x{len:x} is not backed by a mapped region")]
    InterceptNotMapped { base: RvAddr, len: u32 },
    #[error("invalid access size {size} at PC 0x{pc:08x}")]
    InvalidAccessSize { pc: RvAddr, size: usize },
    #[error(transparent)]
    Peripheral(#[from] PeriphError),
    #[error("execution from 0x{begin:08x} requested but the trace has no phases left")]
    TraceExhausted { begin: RvAddr },
}

/// Operations the harness needs from a CPU emulator.
///
/// Memory accesses that fall inside an intercepted window must be routed
/// through the registered [`MmioRouter`] while `run` executes.
pub trait CpuAdapter {
    /// Maps zero-initialised memory. Regions must not overlap.
    fn map_region(&mut self, base: RvAddr, len: u32) -> Result<(), CpuError>;

    fn write_memory(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), CpuError>;

    fn read_memory(&mut self, addr: RvAddr, len: usize) -> Result<Vec<u8>, CpuError>;

    fn reg_read(&self, reg: CpuReg) -> RvData;

    fn reg_write(&mut self, reg: CpuReg, val: RvData);

    /// Routes every access to `[base, base + len)` through `router`.
    fn register_intercept(
        &mut self,
        base: RvAddr,
        len: u32,
        router: Rc<RefCell<MmioRouter>>,
    ) -> Result<(), CpuError>;

    /// Executes from `begin` until PC reaches `until`, or until the
    /// firmware halts on its own when `until` is `None`.
    fn run(&mut self, begin: RvAddr, until: Option<RvAddr>) -> Result<(), CpuError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_register_names() {
        let names: Vec<String> = CpuReg::iter().map(|r| r.to_string()).collect();
        assert_eq!(names.len(), CpuReg::COUNT);
        assert_eq!(names[0], "R0");
        assert_eq!(names[12], "R12");
        assert_eq!(names[13..], ["SP", "LR", "PC"]);
        assert_eq!(format!("{:<3}|", CpuReg::R4), "R4 |");
        assert_eq!(CpuReg::Pc.index(), 15);
    }
}
