// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::hosts::read_host_list;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use fabric::cost::Strategy;
use fabric::occupancy::Counter;
use fabric::verify::Verifier;
use fabric::{
    Fabric, FabricShape, Report, RoundRobinPlanner, SynthConfig, Synthesizer,
    Topology,
};
use fabric_common::println_nopipe;
use slog::Logger;
use std::io::{stdout, Write};
use std::path::PathBuf;
use tabwriter::TabWriter;

#[derive(Debug, Args)]
pub struct SynthArgs {
    /// File listing the priority source hosts by name
    #[arg(short, long)]
    pub sources: Option<PathBuf>,

    /// File listing the priority destination hosts by name
    #[arg(short, long)]
    pub destinations: Option<PathBuf>,

    /// Cost function used to rank candidate paths
    #[arg(long, value_enum, default_value_t = Strategy::SpineFirst)]
    pub strategy: Strategy,

    /// Expected number of leaf switches
    #[arg(long, env = "FABRIC_LEAVES")]
    pub leaves: Option<usize>,

    /// Expected number of spine switches
    #[arg(long, env = "FABRIC_SPINES")]
    pub spines: Option<usize>,

    /// Assign spines round robin instead of ranking paths
    #[arg(long)]
    pub planner: bool,

    /// Leave switch to switch entries unfilled
    #[arg(long)]
    pub no_inter_switch_routes: bool,

    /// Write the forwarding tables as JSON to this file
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub fn synthesize(
    topology: Topology,
    args: &SynthArgs,
    log: Logger,
) -> Result<(Fabric, Report)> {
    let cfg = SynthConfig {
        priority_sources: read_host_list(args.sources.as_deref(), &topology)?,
        priority_destinations: read_host_list(
            args.destinations.as_deref(),
            &topology,
        )?,
        inter_switch_routes: !args.no_inter_switch_routes,
    };
    let shape = FabricShape {
        leaves: args.leaves,
        spines: args.spines,
    };
    let fabric = Fabric::new(topology, shape, log.clone())?;

    if args.planner {
        let mut p = RoundRobinPlanner::new(fabric, log)?;
        let report = p.run(&cfg)?;
        return Ok((p.into_fabric(), report));
    }
    let cost = args.strategy.build(fabric.spines().iter().copied());
    let mut s = Synthesizer::new(fabric, cost, log);
    let report = s.run(&cfg)?;
    Ok((s.into_fabric(), report))
}

pub fn run(topology: Topology, args: SynthArgs, log: Logger) -> Result<()> {
    let (fabric, report) = synthesize(topology, &args, log)?;

    println_nopipe!(
        "{} priority routes, {} other routes",
        report.priority_routes,
        report.other_routes
    );
    println_nopipe!();

    let o = &report.priority;
    histogram("Spine", o.spines())?;
    histogram("Leaf to spine cable", o.leaf_to_spine())?;
    histogram("Spine to leaf cable", o.spine_to_leaf())?;
    histogram("Source host cable", o.host_to_leaf())?;
    histogram("Destination host cable", o.leaf_to_host())?;

    if report.oversubscribed.is_empty() {
        println_nopipe!("{}", "no oversubscribed spine to leaf cables".green());
    } else {
        let mut tw = TabWriter::new(stdout());
        writeln!(
            &mut tw,
            "{}\t{}\t{}\t{}",
            "Spine".dimmed(),
            "Leaf".dimmed(),
            "Destinations".dimmed(),
            "Cables".dimmed(),
        )?;
        for x in &report.oversubscribed {
            writeln!(
                &mut tw,
                "{}\t{}\t{}\t{}",
                name(fabric.topology(), x.spine),
                name(fabric.topology(), x.leaf),
                x.destinations.to_string().red(),
                x.cables,
            )?;
        }
        tw.flush()?;
    }
    println_nopipe!();

    if let Some(path) = &args.out {
        let tables = fabric.forwarding_tables();
        std::fs::write(path, serde_json::to_string_pretty(&tables)?)?;
        println_nopipe!("tables written to {}", path.display());
    }

    let v = Verifier::from_fabric(&fabric);
    let missing = v.check_missing_entries().len();
    let failed = v
        .check_connectivity()
        .iter()
        .filter(|r| !r.outcome.is_ok())
        .count();
    if missing == 0 && failed == 0 {
        println_nopipe!("verification {}", "passed".green());
    } else {
        println_nopipe!(
            "verification {}: {} missing entries, {} unreachable pairs",
            "failed".red(),
            missing,
            failed
        );
    }
    Ok(())
}

fn histogram<K: Ord + Copy>(title: &str, counter: &Counter<K>) -> Result<()> {
    println_nopipe!("{} occupancy (max {})", title, counter.max());
    let mut tw = TabWriter::new(stdout());
    writeln!(&mut tw, "{}\t{}", "Routes".dimmed(), "Count".dimmed())?;
    for (occupancy, count) in counter.histogram() {
        writeln!(&mut tw, "{}\t{}", occupancy, count)?;
    }
    tw.flush()?;
    println_nopipe!();
    Ok(())
}

pub fn name(topology: &Topology, lid: fabric::Lid) -> String {
    match topology.name(lid) {
        Some(n) => format!("{n} ({lid})"),
        None => lid.to_string(),
    }
}
