/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the emulator bus library.

--*/

mod bus;
mod memory_map;
mod ram;

pub use bus::{Bus, BusError};
pub use memory_map::{MapError, MemoryMap, Region};
pub use ram::Ram;
