// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Check a set of forwarding tables against the cabling: every switch
//! must know every address, and every host must reach every other host
//! without looping.

use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;
use fabric::verify::{Verifier, DEFAULT_MAX_HOPS};
use fabric::{ForwardingTables, Topology};
use fabric_common::cli::fabric_cli_style;
use fabric_common::println_nopipe;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None, styles = fabric_cli_style())]
struct Cli {
    /// Topology snapshot (JSON)
    #[arg(short, env = "FABRIC_TOPOLOGY", long)]
    topology: PathBuf,

    /// Forwarding tables as written by `fabricadm synth --out`
    tables: PathBuf,

    /// Walks longer than this many hops count as loops
    #[arg(long, default_value_t = DEFAULT_MAX_HOPS)]
    max_hops: usize,

    /// Also walk from every switch
    #[arg(long)]
    switches: bool,

    /// Only print the summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let topology = Topology::load(&cli.topology)?;
    let tables: ForwardingTables =
        serde_json::from_str(&std::fs::read_to_string(&cli.tables)?)?;
    let v = Verifier::from_topology(&topology, tables)
        .with_max_hops(cli.max_hops);

    let missing = v.check_missing_entries();
    let mut results = v.check_connectivity();
    if cli.switches {
        results.extend(v.check_switch_connectivity());
    }
    let failed: Vec<_> =
        results.iter().filter(|r| !r.outcome.is_ok()).collect();

    if !cli.quiet {
        for m in &missing {
            println_nopipe!("{}", m);
        }
        for r in &failed {
            println_nopipe!(
                "{} -> {}: {}",
                label(&topology, r.src),
                label(&topology, r.dst),
                r.outcome.to_string().red()
            );
        }
    }

    println_nopipe!(
        "{} pairs checked, {} failed, {} missing entries",
        results.len(),
        failed.len(),
        missing.len()
    );
    if !failed.is_empty() || !missing.is_empty() {
        bail!("verification failed");
    }
    println_nopipe!("{}", "ok".green());
    Ok(())
}

fn label(topology: &Topology, lid: fabric::Lid) -> String {
    topology
        .name(lid)
        .map_or_else(|| lid.to_string(), |n| n.to_string())
}
