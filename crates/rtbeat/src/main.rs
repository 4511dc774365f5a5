//! rtbeat - listen to an input device and send tempo changes to lighting
//! controllers

mod cli;
mod logging_setup;

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory};
use rtbeat_core::{
    list_input_devices, start_capture, BeatConfig, BeatPipeline, PipelineStatus, ShutdownReason,
    ShutdownTrigger, ShutdownWait,
};
use std::process::ExitCode;
use tracing::{error, info};

use cli::{BeatArgs, Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse_grouped();

    let _log_guard = match logging_setup::init(&cli.log_config()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Some(Command::List) => list_devices(),
        Some(Command::Beat(args)) => beat(args),
        None => {
            println!("Nothing to do. Use -h for help");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn list_devices() -> Result<()> {
    let devices = list_input_devices().context("Failed to list input devices")?;

    println!("Listing all available input devices:\n");
    for device in &devices {
        println!("{}", device);
    }
    println!("\nUse the number in the square brackets as device index");
    Ok(())
}

fn beat(args: &BeatArgs) -> Result<()> {
    let config = match args.to_config() {
        Ok(config) => config,
        // Exits with status 2
        Err(message) => Cli::command().error(ErrorKind::ValueValidation, message).exit(),
    };

    run(&config)
}

fn run(config: &BeatConfig) -> Result<()> {
    info!(
        "Starting beat detection: bufsize={}, device={:?}, targets={}",
        config.buffer_size,
        config.device,
        config.targets.len()
    );

    let status = PipelineStatus::new();
    let pipeline =
        BeatPipeline::from_config(config, status).context("Failed to set up dispatch targets")?;
    let mut controller =
        start_capture(config, pipeline).context("Failed to open audio input")?;
    if let Some(device) = config.device {
        info!("Capturing from device {}", device);
    }

    let trigger = ShutdownTrigger::new();
    let reason = controller
        .run_until_shutdown(ShutdownWait::for_platform(), &trigger)
        .context("Failed while waiting for shutdown")?;

    if reason == ShutdownReason::Interrupt {
        println!(" ===> Ctrl + C");
    }
    println!("--- Stopped ---");
    Ok(())
}
