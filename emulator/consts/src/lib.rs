/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the memory map and register addresses of the captured
    AVD coprocessor firmware.

--*/

// Memory map
pub const IRAM_OFFSET: u32 = 0x0000_0000;
pub const IRAM_SIZE: u32 = 0x1_0000;
pub const DRAM_OFFSET: u32 = 0x1000_0000;
pub const DRAM_SIZE: u32 = 0x1_0000;

// MMIO windows
pub const CM3CTRL_OFFSET: u32 = 0x5001_0000;
pub const CM3CTRL_SIZE: u32 = 0x4000;
pub const PIODMA_OFFSET: u32 = 0x5005_0000;
pub const PIODMA_SIZE: u32 = 0x4000;
pub const SCS_OFFSET: u32 = 0xe000_c000;
pub const SCS_SIZE: u32 = 0x4000;

// System Control Space
pub const NVIC_ISER_OFFSET: u32 = 0xe000_e100;
pub const NVIC_ISER_COUNT: usize = 8;
pub const SCB_VTOR_OFFSET: u32 = 0xe000_ed08;

// CM3 control block interrupt registers
pub const CM3CTRL_IRQ_EN0_OFFSET: u32 = CM3CTRL_OFFSET + 0x10;
pub const CM3CTRL_IRQ_EN_OFFSET: u32 = CM3CTRL_OFFSET + 0x14;
pub const CM3CTRL_IRQ_STATUS0_OFFSET: u32 = CM3CTRL_OFFSET + 0x30;
pub const CM3CTRL_IRQ_STATUS_OFFSET: u32 = CM3CTRL_OFFSET + 0x34;
pub const CM3CTRL_IRQ_BANK_COUNT: usize = 6;
/// Lines covered by the first enable/status register.
pub const CM3CTRL_IRQ0_LINES: u32 = 14;

// Mailbox
pub const MAILBOX_STATUS_OFFSET: u32 = CM3CTRL_OFFSET + 0x100;
pub const MAILBOX_RETRIEVE_OFFSET: u32 = CM3CTRL_OFFSET + 0x104;
pub const MAILBOX_SUBMIT_OFFSET: u32 = CM3CTRL_OFFSET + 0x108;
pub const MAILBOX_STATUS_READY: u32 = 0x1;
pub const MAILBOX_COMMAND_BASE: u32 = DRAM_OFFSET + 0x4000;
pub const MAILBOX_COMMAND_STRIDE: u32 = 0x60;
pub const MAILBOX_MAX_COMMANDS: usize = 8;
pub const MAILBOX_REPLY_BASE: u32 = DRAM_OFFSET;

// PIODMA descriptor engine
pub const PIODMA_IOVA_LO_OFFSET: u32 = PIODMA_OFFSET + 0x04;
pub const PIODMA_IOVA_HI_OFFSET: u32 = PIODMA_OFFSET + 0x08;
pub const PIODMA_COMMAND_OFFSET: u32 = PIODMA_OFFSET + 0x0c;
pub const PIODMA_SUB_OPCODE: u8 = 0x11;
pub const PIODMA_COMMAND_IDLE: u32 = 0;
pub const PIODMA_WINDOW_START: u32 = 0x0001_0000;
pub const PIODMA_WINDOW_SIZE: u32 = 0x1_0000;

// Interrupt injection
pub const VECTOR_TABLE_OFFSET: u32 = 0x40;
pub const IRQ_RETURN_SENTINEL: u32 = 0x0000_fff0;
pub const CMD_IRQ_LINE: u32 = 1;
pub const REPLY_IRQ_LINE: u32 = 2;
