//! bwtool - control BitWizard SPI/I2C expansion boards
//!
//! One invocation opens a bus, performs a short transaction (register
//! access, identify, scan, EEPROM dump, display text) and exits. The same
//! engine serves all four physical transports; `--mode2` turns on the
//! reliability overlay for long bus runs.

mod buses;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

use bwtool_core::{Capabilities, Engine, EngineConfig};

/// Reads are unreliable above this clock on the stock boards
const MAX_READ_SPEED: u32 = 100_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {}
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let mut caps = Capabilities::empty();
    if cli.mode2 {
        caps |= Capabilities::MODE2;
    }
    if cli.extended_validation {
        caps |= Capabilities::EXTENDED_VALIDATION;
    }

    // Commands that read data back cap the SPI clock
    let reads_back = matches!(
        cli.command,
        Commands::Read { .. } | Commands::Identify | Commands::Scan | Commands::Eeprom
    );
    let speed = match cli.speed {
        Some(s) if reads_back && s > MAX_READ_SPEED => {
            log::debug!("clamping SPI clock to {} Hz for reads", MAX_READ_SPEED);
            Some(MAX_READ_SPEED)
        }
        other => other,
    };

    let bus = buses::open_bus(&cli, speed)?;

    let mut config = EngineConfig::new(cli.addr).with_caps(caps);
    if let Some(path) = &cli.tid_file {
        config = config.with_tid_file(path);
    }
    let mut engine = Engine::new(bus, config);

    match &cli.command {
        Commands::Write8 { items } => commands::write::run_write8(&mut engine, items, cli.decimal),
        Commands::Write { items } => commands::write::run_write(&mut engine, items, cli.decimal),
        Commands::Read { items } => commands::read::run_read(&mut engine, items, cli.decimal),
        Commands::Identify => commands::ident::run_identify(&mut engine),
        Commands::Scan => commands::ident::run_scan(&mut engine),
        Commands::Eeprom => commands::ident::run_eeprom(&mut engine),
        Commands::Text { reg, words } => commands::display::run_text(&mut engine, *reg, words),
        Commands::Cls => commands::display::run_cls(&mut engine),
        Commands::Raw { bytes } => commands::run_raw(&mut engine, bytes),
        Commands::Monitor { file } => commands::display::run_monitor(&mut engine, file),
    }
}
