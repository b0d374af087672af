/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    File contains main entrypoint for the AVD coprocessor firmware emulator.

--*/

use anyhow::{Context, Result};
use clap::Parser;
use emulator::{EmulatorArgs, FirmwareImage, ReplayCpu, Scenario, Trace};
use std::path::Path;

fn main() -> Result<()> {
    let cli = EmulatorArgs::parse();
    simple_logger::SimpleLogger::new()
        .with_level(cli.log_level)
        .init()
        .context("failed to initialize logger")?;

    run(cli).inspect_err(|err| log::error!("{err:#}"))
}

fn read_optional(path: Option<&Path>, what: &str) -> Result<Option<Vec<u8>>> {
    path.map(|path| {
        std::fs::read(path).with_context(|| format!("reading {what} {}", path.display()))
    })
    .transpose()
}

fn run(cli: EmulatorArgs) -> Result<()> {
    let firmware = FirmwareImage::load(&cli.firmware)?;
    let trace = Trace::load(&cli.trace)?;
    let params = read_optional(cli.params.as_deref(), "parameter buffer")?.unwrap_or_default();
    let commands = read_optional(cli.commands.as_deref(), "command buffer")?;

    if let Some(dir) = &cli.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let mut scenario = Scenario::new(
        ReplayCpu::new(trace),
        firmware,
        cli.scenario_config(),
        params,
    )?;
    scenario.boot().context("boot failed")?;
    if let Some(commands) = commands {
        scenario
            .run_commands(&commands)
            .context("command processing failed")?;
    }
    log::info!("finished in state {:?}", scenario.state());
    Ok(())
}
