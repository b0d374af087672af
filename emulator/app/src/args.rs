/*++

Licensed under the Apache-2.0 license.

File Name:

    args.rs

Abstract:

    File contains the command line arguments of the AVD emulator.

--*/

use crate::scenario::ScenarioConfig;
use clap::Parser;
use clap_num::maybe_hex;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, name = "AVD Emulator")]
pub struct EmulatorArgs {
    /// Firmware image, loaded at instruction RAM address 0.
    #[arg(short, long)]
    pub firmware: PathBuf,

    /// Recorded access trace to replay, one phase per run.
    #[arg(short, long)]
    pub trace: PathBuf,

    /// Concatenated 0x60-byte mailbox commands.
    #[arg(short, long)]
    pub commands: Option<PathBuf>,

    /// Host buffer the DMA engine reads through IOVAs.
    #[arg(short, long)]
    pub params: Option<PathBuf>,

    /// Directory in which to write RAM snapshots and register dumps.
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    #[arg(long, default_value = "avd_ram")]
    pub snapshot_prefix: String,

    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,

    /// Override instruction RAM size
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub iram_size: Option<u32>,
    /// Override data RAM offset
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub dram_base: Option<u32>,
    /// Override data RAM size
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub dram_size: Option<u32>,
    /// Override mailbox command area offset (applied after --dram-base)
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub cmd_base: Option<u32>,
    /// Override mailbox reply base offset (applied after --dram-base)
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub reply_base: Option<u32>,
    /// Override the number of commands the mailbox accepts
    #[arg(long)]
    pub max_commands: Option<usize>,
    /// Override PIODMA destination window start
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub dma_window_start: Option<u32>,
    /// Override vector table offset
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub vector_table_offset: Option<u32>,
    /// Override the return address planted in LR for injected interrupts
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub return_sentinel: Option<u32>,
    /// Override command IRQ line
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub cmd_irq: Option<u32>,
    /// Override reply IRQ line
    #[arg(long, value_parser=maybe_hex::<u32>)]
    pub reply_irq: Option<u32>,
}

impl EmulatorArgs {
    /// Default layout with every override from the command line applied.
    pub fn scenario_config(&self) -> ScenarioConfig {
        let mut config = ScenarioConfig {
            out_dir: self.out_dir.clone(),
            snapshot_prefix: self.snapshot_prefix.clone(),
            ..Default::default()
        };
        if let Some(size) = self.iram_size {
            config.memory.iram_size = size;
        }
        if let Some(base) = self.dram_base {
            // The mailbox areas live in data RAM and move with it.
            let delta = base.wrapping_sub(config.memory.dram_base);
            config.memory.dram_base = base;
            config.dma.data_ram_base = base;
            config.mailbox.command_base = config.mailbox.command_base.wrapping_add(delta);
            config.mailbox.reply_base = config.mailbox.reply_base.wrapping_add(delta);
        }
        if let Some(size) = self.dram_size {
            config.memory.dram_size = size;
        }
        if let Some(base) = self.cmd_base {
            config.mailbox.command_base = base;
        }
        if let Some(base) = self.reply_base {
            config.mailbox.reply_base = base;
        }
        if let Some(max) = self.max_commands {
            config.mailbox.max_commands = max;
        }
        if let Some(start) = self.dma_window_start {
            config.dma.window_start = start;
        }
        if let Some(offset) = self.vector_table_offset {
            config.vector_table_offset = offset;
        }
        if let Some(sentinel) = self.return_sentinel {
            config.return_sentinel = sentinel;
        }
        if let Some(line) = self.cmd_irq {
            config.cmd_irq = line;
        }
        if let Some(line) = self.reply_irq {
            config.reply_irq = line;
        }
        config
    }
}
