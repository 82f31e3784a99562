// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cost driven route synthesis.
//!
//! The synthesizer routes every ordered pair of hosts in two passes. The
//! priority pass covers traffic from the priority sources to the priority
//! destinations and commits strictly, so any inconsistency is fatal. The
//! occupancy at that point is kept as the priority load. The best effort
//! pass then routes all remaining pairs on top, reusing whatever the
//! priority pass decided.
//!
//! Within a pass pairs are taken in order. Each one is routed over the
//! candidate path with the smallest score, and every pending pair with the
//! same destination whose source shares the input leaf is committed to the
//! same path right away: those sources have no choice left and must not be
//! ranked again.

use crate::cost::CostFunction;
use crate::error::Error;
use crate::fabric::{Candidates, Fabric, Oversubscription};
use crate::log::fab_log;
use crate::occupancy::Occupancy;
use crate::path::Path;
use crate::types::{CommitMode, Lid};
use slog::Logger;
use std::collections::{BTreeSet, VecDeque};
use std::fmt::{self, Display, Formatter};

const UNIT_SYNTH: &str = "synth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Priority,
    Snapshot,
    BestEffort,
    Done,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Priority => "priority",
            Phase::Snapshot => "snapshot",
            Phase::BestEffort => "best-effort",
            Phase::Done => "done",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthConfig {
    pub priority_sources: BTreeSet<Lid>,
    pub priority_destinations: BTreeSet<Lid>,
    /// Complete the tables with switch to switch routes after host routing.
    pub inter_switch_routes: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            priority_sources: BTreeSet::new(),
            priority_destinations: BTreeSet::new(),
            inter_switch_routes: true,
        }
    }
}

impl SynthConfig {
    pub fn is_priority(&self, src: Lid, dst: Lid) -> bool {
        self.priority_sources.contains(&src)
            && self.priority_destinations.contains(&dst)
    }

    /// Every configured LID must name a host of `fabric`.
    pub fn validate(&self, fabric: &Fabric) -> Result<(), Error> {
        self.priority_sources
            .iter()
            .chain(self.priority_destinations.iter())
            .find(|lid| !fabric.topology().is_host(**lid))
            .map_or(Ok(()), |lid| Err(Error::AddressNotFound(*lid)))
    }
}

/// What a synthesis run did.
#[derive(Debug, Clone)]
pub struct Report {
    /// Priority pairs committed, excluding loopback and same leaf pairs.
    pub priority_routes: usize,
    /// Remaining pairs committed in the best effort phase.
    pub other_routes: usize,
    /// Occupancy right after the priority phase.
    pub priority: Occupancy,
    /// Occupancy at the end of the run.
    pub total: Occupancy,
    pub oversubscribed: Vec<Oversubscription>,
}

pub struct Synthesizer<C: CostFunction> {
    fabric: Fabric,
    occupancy: Occupancy,
    cost: C,
    phase: Phase,
    log: Logger,
}

impl<C: CostFunction> Synthesizer<C> {
    pub fn new(fabric: Fabric, cost: C, log: Logger) -> Self {
        Self {
            fabric,
            occupancy: Occupancy::new(),
            cost,
            phase: Phase::Idle,
            log,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn fabric(&self) -> &Fabric {
        &self.fabric
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    pub fn into_fabric(self) -> Fabric {
        self.fabric
    }

    /// All ordered host pairs, source major in ascending LID order, split
    /// into priority pairs and the rest.
    pub fn pairs(
        &self,
        cfg: &SynthConfig,
    ) -> (Vec<(Lid, Lid)>, Vec<(Lid, Lid)>) {
        let hosts: Vec<Lid> = self.fabric.topology().host_lids().collect();
        hosts
            .iter()
            .flat_map(|src| hosts.iter().map(move |dst| (*src, *dst)))
            .partition(|(src, dst)| cfg.is_priority(*src, *dst))
    }

    /// Run both phases. A synthesizer runs once, and a failed run leaves it
    /// in the phase that failed.
    pub fn run(&mut self, cfg: &SynthConfig) -> Result<Report, Error> {
        if self.phase != Phase::Idle {
            return Err(Error::NotIdle(self.phase.to_string()));
        }
        cfg.validate(&self.fabric)?;
        let (priority, other) = self.pairs(cfg);

        self.enter(Phase::Priority);
        let priority_routes = self.assign_batch(priority, CommitMode::Strict)?;
        let oversubscribed = self
            .fabric
            .oversubscription(cfg.priority_destinations.iter().copied());

        self.enter(Phase::Snapshot);
        let snapshot = self.occupancy.clone();

        self.enter(Phase::BestEffort);
        let other_routes = self.assign_batch(other, CommitMode::BestEffort)?;
        if cfg.inter_switch_routes {
            self.fabric.synthesize_inter_switch_routes()?;
        }

        self.enter(Phase::Done);
        fab_log!(self.log, info, UNIT_SYNTH, "synthesis complete";
            "priority_routes" => priority_routes,
            "other_routes" => other_routes,
            "oversubscribed" => oversubscribed.len()
        );

        Ok(Report {
            priority_routes,
            other_routes,
            priority: snapshot,
            total: self.occupancy.clone(),
            oversubscribed,
        })
    }

    fn enter(&mut self, phase: Phase) {
        fab_log!(self.log, info, UNIT_SYNTH, "entering phase {}", phase;
            "from" => self.phase.to_string()
        );
        self.phase = phase;
    }

    /// Route `pairs` in order and return how many were committed.
    pub fn assign_batch(
        &mut self,
        pairs: Vec<(Lid, Lid)>,
        mode: CommitMode,
    ) -> Result<usize, Error> {
        let mut pending: VecDeque<(Lid, Lid)> = pairs.into();
        let mut committed = 0;

        while let Some((src, dst)) = pending.pop_front() {
            if src == dst {
                continue;
            }
            let paths = match self.fabric.candidate_paths(src, dst)? {
                Candidates::SameLeaf => continue,
                Candidates::Paths(paths) => paths,
            };
            let best = self.select(&paths, src, dst)?;
            self.record(src, dst, &best, mode)?;
            committed += 1;

            let leaf = best.input_leaf();
            let topology = self.fabric.topology();
            let (forced, rest): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|(s, d)| {
                    *d == dst
                        && topology.attachment(*s).map(|a| a.switch)
                            == Some(leaf)
                });
            pending = rest.into();
            for (s, _) in forced {
                self.record(s, dst, &best, mode)?;
                committed += 1;
            }
        }
        Ok(committed)
    }

    /// The first candidate with the smallest score.
    fn select(
        &mut self,
        paths: &[Path],
        src: Lid,
        dst: Lid,
    ) -> Result<Path, Error> {
        let mut best: Option<(Vec<u64>, Path)> = None;
        for p in paths {
            let score = self.cost.score(&self.occupancy, p, src, dst);
            if best.as_ref().map_or(true, |(b, _)| score < *b) {
                best = Some((score, *p));
            }
        }
        best.map(|(_, p)| p).ok_or(Error::NoPath { src, dst })
    }

    fn record(
        &mut self,
        src: Lid,
        dst: Lid,
        path: &Path,
        mode: CommitMode,
    ) -> Result<(), Error> {
        self.fabric.commit(path, dst, mode)?;
        let at = self
            .fabric
            .topology()
            .attachment(dst)
            .ok_or(Error::AddressNotFound(dst))?;
        self.occupancy.add_path(src, at, path);
        fab_log!(self.log, debug, UNIT_SYNTH, "route assigned {}", path;
            "src" => src,
            "dst" => dst
        );
        Ok(())
    }
}
