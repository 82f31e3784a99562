// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::Result;
use clap::{Parser, Subcommand};
use fabric::Topology;
use fabric_common::cli::fabric_cli_style;
use fabric_common::log::{init_file_logger, init_logger};
use std::path::PathBuf;

mod hosts;
mod synth;
mod tables;

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = None,
    styles = fabric_cli_style(),
    infer_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Topology snapshot (JSON)
    #[arg(short, env = "FABRIC_TOPOLOGY", long)]
    topology: PathBuf,

    /// Write bunyan formatted logs to this file instead of the terminal
    #[arg(long)]
    log_file: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize forwarding tables and report link occupancy.
    Synth(synth::SynthArgs),

    /// Synthesize forwarding tables and print them per switch.
    Tables(tables::TablesArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log = match &cli.log_file {
        Some(path) => init_file_logger(path)?,
        None => init_logger(),
    };

    let topology = Topology::load(&cli.topology)?;

    match cli.command {
        Commands::Synth(args) => synth::run(topology, args, log)?,
        Commands::Tables(args) => tables::run(topology, args, log)?,
    }
    Ok(())
}
