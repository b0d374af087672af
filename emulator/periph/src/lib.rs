/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the AVD peripheral emulation library.

--*/

mod cm3ctrl;
mod error;
mod event;
mod mailbox;
mod mmio_router;
mod nvic;
mod piodma;

pub use cm3ctrl::Cm3Ctrl;
pub use error::PeriphError;
pub use event::{Event, EventSink, IrqController};
pub use mailbox::{Mailbox, MailboxLayout};
pub use mmio_router::{AccessKind, MmioAccess, MmioPeripheral, MmioRouter};
pub use nvic::Nvic;
pub use piodma::{PacketWord, PioDma, PioDmaCommand, PioDmaConfig};
