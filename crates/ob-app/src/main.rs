use anyhow::Result;
use clap::Parser;

pub mod cli;
pub mod commands;
pub mod pipeline;

use cli::Command;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Dispatcher
    match cli.command {
        Command::Encode(ref args) => commands::run_encode(args),
        Command::Info { ref path, json } => commands::run_info(path, json),
        Command::Validate { ref path } => commands::run_validate(path),
        Command::Decode { ref path, frame } => commands::run_decode(path, frame),
    }
}
