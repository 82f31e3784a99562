// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::synth::{name, synthesize, SynthArgs};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use fabric::{Attachment, Topology, MANAGEMENT_PORT};
use fabric_common::println_nopipe;
use slog::Logger;
use std::io::{stdout, Write};
use tabwriter::TabWriter;

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(flatten)]
    synth: SynthArgs,

    /// Only print the table of this switch
    #[arg(long)]
    switch: Option<String>,
}

pub fn run(topology: Topology, args: TablesArgs, log: Logger) -> Result<()> {
    let only = match &args.switch {
        Some(n) => Some(
            topology
                .lid_by_name(n)
                .filter(|lid| topology.is_switch(*lid))
                .ok_or_else(|| anyhow!("unknown switch {n}"))?,
        ),
        None => None,
    };

    let (fabric, _) = synthesize(topology, &args.synth, log)?;
    let t = fabric.topology();

    for table in fabric.tables() {
        if only.is_some_and(|lid| lid != table.lid()) {
            continue;
        }
        println_nopipe!("{}", name(t, table.lid()).bold());
        let mut tw = TabWriter::new(stdout());
        writeln!(
            &mut tw,
            "{}\t{}\t{}",
            "Destination".dimmed(),
            "Port".dimmed(),
            "Next Hop".dimmed(),
        )?;
        for (dst, port) in table.entries() {
            let next = if port == MANAGEMENT_PORT {
                "local".to_string()
            } else {
                t.link(Attachment::new(table.lid(), port))
                    .map(|l| name(t, l.peer))
                    .unwrap_or_else(|| "-".to_string())
            };
            writeln!(&mut tw, "{}\t{}\t{}", name(t, dst), port, next)?;
        }
        tw.flush()?;
        println_nopipe!();
    }
    Ok(())
}
