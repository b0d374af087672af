/*++

Licensed under the Apache-2.0 license.

File Name:

    scenario.rs

Abstract:

    File contains the scenario driver: boots the firmware, stages mailbox
    commands, injects the command and reply interrupts and snapshots data
    RAM and registers after every phase.

--*/

use crate::cpu::{CpuAdapter, CpuError, CpuReg};
use crate::firmware::{FirmwareError, FirmwareImage};
use emulator_consts::{
    CM3CTRL_OFFSET, CM3CTRL_SIZE, CMD_IRQ_LINE, DRAM_OFFSET, DRAM_SIZE, IRAM_OFFSET, IRAM_SIZE,
    IRQ_RETURN_SENTINEL, PIODMA_OFFSET, PIODMA_SIZE, REPLY_IRQ_LINE, SCS_OFFSET, SCS_SIZE,
    VECTOR_TABLE_OFFSET,
};
use emulator_periph::{
    Cm3Ctrl, Event, Mailbox, MailboxLayout, MmioRouter, Nvic, PeriphError, PioDma, PioDmaConfig,
};
use emulator_types::{RvAddr, RvData};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc;
use strum::IntoEnumIterator;
use thiserror::Error;

/// Memory regions mapped at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    pub iram_base: RvAddr,
    pub iram_size: u32,
    pub dram_base: RvAddr,
    pub dram_size: u32,
    /// `(base, len)` of every window routed to the peripheral models.
    pub mmio_windows: Vec<(RvAddr, u32)>,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            iram_base: IRAM_OFFSET,
            iram_size: IRAM_SIZE,
            dram_base: DRAM_OFFSET,
            dram_size: DRAM_SIZE,
            mmio_windows: vec![
                (CM3CTRL_OFFSET, CM3CTRL_SIZE),
                (PIODMA_OFFSET, PIODMA_SIZE),
                (SCS_OFFSET, SCS_SIZE),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub memory: MemoryLayout,
    pub mailbox: MailboxLayout,
    pub dma: PioDmaConfig,
    pub vector_table_offset: u32,
    /// Return address planted in LR before an injected handler runs.
    pub return_sentinel: RvAddr,
    pub cmd_irq: u32,
    pub reply_irq: u32,
    /// Snapshots are only written when set.
    pub out_dir: Option<PathBuf>,
    pub snapshot_prefix: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            memory: MemoryLayout::default(),
            mailbox: MailboxLayout::default(),
            dma: PioDmaConfig::default(),
            vector_table_offset: VECTOR_TABLE_OFFSET,
            return_sentinel: IRQ_RETURN_SENTINEL,
            cmd_irq: CMD_IRQ_LINE,
            reply_irq: REPLY_IRQ_LINE,
            out_dir: None,
            snapshot_prefix: "avd_ram".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    Idle,
    Booted,
    CommandHandled(usize),
    ReplyHandled(usize),
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("{count} commands exceed the mailbox capacity of {max}")]
    TooManyCommands { count: usize, max: usize },
    #[error("command buffer of {len} bytes is not a whole number of 0x{stride:x}-byte records")]
    MisalignedCommands { len: usize, stride: u32 },
    #[error("firmware has no vector for IRQ line {line}")]
    MissingVector { line: u32 },
    #[error("firmware has not been booted")]
    NotBooted,
    #[error(transparent)]
    Firmware(#[from] FirmwareError),
    #[error(transparent)]
    Cpu(#[from] CpuError),
    #[error(transparent)]
    Peripheral(#[from] PeriphError),
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Core register values at the end of a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDump {
    regs: [RvData; CpuReg::COUNT],
}

impl RegisterDump {
    pub fn read(cpu: &dyn CpuAdapter) -> Self {
        let mut regs = [0; CpuReg::COUNT];
        for reg in CpuReg::iter() {
            regs[reg.index()] = cpu.reg_read(reg);
        }
        Self { regs }
    }

    pub fn get(&self, reg: CpuReg) -> RvData {
        self.regs[reg.index()]
    }
}

impl fmt::Display for RegisterDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regs: Vec<CpuReg> = CpuReg::iter().collect();
        for row in regs.chunks(4) {
            let line: Vec<String> = row
                .iter()
                .map(|reg| format!("{reg:<3} = {:08X}", self.get(*reg)))
                .collect();
            writeln!(f, "{}", line.join("\t"))?;
        }
        Ok(())
    }
}

/// Router populated with every peripheral model the firmware touches.
/// Also returns the mailbox's loaded-command handle.
pub fn build_router(
    config: &ScenarioConfig,
    params: Vec<u8>,
) -> Result<(MmioRouter, Rc<Cell<Option<usize>>>), PeriphError> {
    let mailbox = Mailbox::new(config.mailbox);
    let loaded = mailbox.loaded_commands();
    let mut router = MmioRouter::new();
    router.add_peripheral(Box::new(Nvic::new()))?;
    router.add_peripheral(Box::new(Cm3Ctrl::new()))?;
    router.add_peripheral(Box::new(mailbox))?;
    router.add_peripheral(Box::new(PioDma::new(params, config.dma)))?;
    Ok((router, loaded))
}

pub struct Scenario<C: CpuAdapter> {
    cpu: C,
    firmware: FirmwareImage,
    config: ScenarioConfig,
    router: Rc<RefCell<MmioRouter>>,
    loaded_commands: Rc<Cell<Option<usize>>>,
    state: ScenarioState,
}

impl<C: CpuAdapter> Scenario<C> {
    /// `params` is the host memory the DMA engine reads through IOVAs.
    pub fn new(
        cpu: C,
        firmware: FirmwareImage,
        config: ScenarioConfig,
        params: Vec<u8>,
    ) -> Result<Self, ScenarioError> {
        let max = config.memory.iram_size;
        if firmware.data().len() > max as usize {
            return Err(FirmwareError::TooLarge {
                len: firmware.data().len(),
                max,
            }
            .into());
        }
        let (router, loaded_commands) = build_router(&config, params)?;
        Ok(Self {
            cpu,
            firmware,
            config,
            router: Rc::new(RefCell::new(router)),
            loaded_commands,
            state: ScenarioState::Idle,
        })
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn register_outgoing_events(&mut self, sender: mpsc::Sender<Event>) {
        self.router.borrow_mut().register_outgoing_events(sender);
    }

    pub fn boot(&mut self) -> Result<RegisterDump, ScenarioError> {
        let memory = self.config.memory.clone();
        self.cpu.map_region(memory.iram_base, memory.iram_size)?;
        self.cpu.map_region(memory.dram_base, memory.dram_size)?;
        for &(base, len) in &memory.mmio_windows {
            self.cpu.map_region(base, len)?;
            self.cpu
                .register_intercept(base, len, self.router.clone())?;
        }
        self.cpu
            .write_memory(memory.iram_base, self.firmware.data())?;

        let sp = self.firmware.initial_sp();
        let pc = self.firmware.initial_pc();
        log::info!("Starting @ {pc:08x} with SP {sp:08x}");
        self.cpu.reg_write(CpuReg::Sp, sp);
        self.cpu.reg_write(CpuReg::Pc, pc);
        self.cpu.run(pc, None)?;
        self.state = ScenarioState::Booted;
        self.capture("after_boot")
    }

    /// Dumps the registers and data RAM, writing both to the output
    /// directory when one is configured.
    pub fn capture(&mut self, phase: &str) -> Result<RegisterDump, ScenarioError> {
        let dump = RegisterDump::read(&self.cpu);
        log::info!("~~~~~ {phase} ~~~~~");
        for line in dump.to_string().lines() {
            log::info!("{line}");
        }
        let memory = &self.config.memory;
        let dram = self
            .cpu
            .read_memory(memory.dram_base, memory.dram_size as usize)?;
        if let Some(dir) = &self.config.out_dir {
            let snapshot = dir.join(format!("{}_{phase}.bin", self.config.snapshot_prefix));
            write_file(&snapshot, &dram)?;
            write_file(&dir.join(format!("{phase}_regs.txt")), dump.to_string().as_bytes())?;
            log::debug!("saved {}", snapshot.display());
        }
        Ok(dump)
    }

    /// Runs the handler of `line` until it returns to the sentinel.
    pub fn inject(&mut self, line: u32) -> Result<(), ScenarioError> {
        if self.state == ScenarioState::Idle {
            return Err(ScenarioError::NotBooted);
        }
        let handler = self
            .firmware
            .vector(self.config.vector_table_offset, line)
            .ok_or(ScenarioError::MissingVector { line })?;
        let sentinel = self.config.return_sentinel;
        log::info!("injecting IRQ {line} -> handler {handler:08x}");
        self.cpu.reg_write(CpuReg::Lr, sentinel);
        self.cpu.reg_write(CpuReg::Pc, handler);
        self.cpu.run(handler, Some(sentinel))?;
        Ok(())
    }

    /// Stages `buffer` in the mailbox command area and returns the number
    /// of commands it holds.
    pub fn feed_commands(&mut self, buffer: &[u8]) -> Result<usize, ScenarioError> {
        if self.state == ScenarioState::Idle {
            return Err(ScenarioError::NotBooted);
        }
        let layout = self.config.mailbox;
        let stride = layout.command_stride as usize;
        let count = buffer.len() / stride;
        if count > layout.max_commands {
            return Err(ScenarioError::TooManyCommands {
                count,
                max: layout.max_commands,
            });
        }
        if buffer.len() % stride != 0 {
            return Err(ScenarioError::MisalignedCommands {
                len: buffer.len(),
                stride: layout.command_stride,
            });
        }
        self.cpu.write_memory(layout.command_base, buffer)?;
        self.loaded_commands.set(Some(count));
        log::info!("loaded {count} commands @ {:08x}", layout.command_base);
        Ok(count)
    }

    /// Feeds `buffer`, then runs the command and reply handlers for each
    /// command with a capture after every handler.
    pub fn run_commands(&mut self, buffer: &[u8]) -> Result<(), ScenarioError> {
        let count = self.feed_commands(buffer)?;
        for i in 0..count {
            self.inject(self.config.cmd_irq)?;
            self.state = ScenarioState::CommandHandled(i);
            self.capture(&format!("after_cmd_{i}"))?;

            self.inject(self.config.reply_irq)?;
            self.state = ScenarioState::ReplyHandled(i);
            self.capture(&format!("after_reply_{i}"))?;
        }
        Ok(())
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), ScenarioError> {
    std::fs::write(path, data).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })
}
