/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Library interface for the AVD coprocessor firmware emulator.

--*/

pub mod args;
pub mod cpu;
pub mod firmware;
pub mod replay;
pub mod scenario;

pub use args::EmulatorArgs;
pub use cpu::{CpuAdapter, CpuError, CpuReg};
pub use firmware::{FirmwareError, FirmwareImage};
pub use replay::{ReplayCpu, RunRecord, Trace, TraceAccess, TraceAccessKind, TraceError, TracePhase};
pub use scenario::{
    build_router, MemoryLayout, RegisterDump, Scenario, ScenarioConfig, ScenarioError,
    ScenarioState,
};
