// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static round robin routing.
//!
//! Instead of ranking candidates, the planner deals destinations out to
//! spines in turn, leaf by leaf, so the destinations behind one leaf end up
//! on as many different spines as possible. Cables are then dealt out in
//! turn among the parallel ones of each leaf/spine pair. The result does
//! not depend on any load measurement, which makes it easy to reason about
//! when the traffic pattern is known to be uniform.

use crate::error::Error;
use crate::fabric::Fabric;
use crate::log::fab_log;
use crate::occupancy::Occupancy;
use crate::path::Path;
use crate::synth::{Phase, Report, SynthConfig};
use crate::types::{CommitMode, Lid, PortNumber};
use slog::Logger;
use std::collections::{BTreeMap, BTreeSet};

const UNIT_PLANNER: &str = "planner";

/// Round robin over a fixed list of ports. The number of picks so far is
/// the number of routes put on the cables.
#[derive(Debug, Clone, Default)]
struct PortCycle {
    ports: Vec<PortNumber>,
    picks: usize,
}

impl PortCycle {
    fn pick(&mut self) -> Option<PortNumber> {
        if self.ports.is_empty() {
            return None;
        }
        let port = self.ports[self.picks % self.ports.len()];
        self.picks += 1;
        Some(port)
    }
}

pub struct RoundRobinPlanner {
    fabric: Fabric,
    occupancy: Occupancy,
    leaf_to_spine: BTreeMap<(Lid, Lid), PortCycle>,
    spine_to_leaf: BTreeMap<(Lid, Lid), PortCycle>,
    /// Position in the spine list, carried over between passes.
    next_spine: usize,
    phase: Phase,
    log: Logger,
}

impl RoundRobinPlanner {
    pub fn new(fabric: Fabric, log: Logger) -> Result<Self, Error> {
        let mut leaf_to_spine = BTreeMap::new();
        let mut spine_to_leaf = BTreeMap::new();
        for leaf in fabric.leaves() {
            for spine in fabric.spines() {
                let up = ports_toward(&fabric, *leaf, *spine)?;
                let down = ports_toward(&fabric, *spine, *leaf)?;
                leaf_to_spine.insert((*leaf, *spine), up);
                spine_to_leaf.insert((*spine, *leaf), down);
            }
        }
        Ok(Self {
            fabric,
            occupancy: Occupancy::new(),
            leaf_to_spine,
            spine_to_leaf,
            next_spine: 0,
            phase: Phase::Idle,
            log,
        })
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

    /// Route the priority destinations, then the reverse direction.
    pub fn run(&mut self, cfg: &SynthConfig) -> Result<Report, Error> {
        if self.phase != Phase::Idle {
            return Err(Error::NotIdle(self.phase.to_string()));
        }
        cfg.validate(&self.fabric)?;

        self.enter(Phase::Priority);
        let priority_routes = self.make_routes(
            &cfg.priority_destinations,
            &cfg.priority_sources,
        )?;
        let oversubscribed = self
            .fabric
            .oversubscription(cfg.priority_destinations.iter().copied());

        self.enter(Phase::Snapshot);
        let snapshot = self.occupancy.clone();

        self.enter(Phase::BestEffort);
        let other_routes = self.make_routes(
            &cfg.priority_sources,
            &cfg.priority_destinations,
        )?;
        if cfg.inter_switch_routes {
            self.fabric.synthesize_inter_switch_routes()?;
        }

        self.enter(Phase::Done);
        Ok(Report {
            priority_routes,
            other_routes,
            priority: snapshot,
            total: self.occupancy.clone(),
            oversubscribed,
        })
    }

    fn enter(&mut self, phase: Phase) {
        fab_log!(self.log, info, UNIT_PLANNER, "entering phase {}", phase;
            "from" => self.phase.to_string()
        );
        self.phase = phase;
    }

    /// The spine each destination goes through. Destinations are taken
    /// leaf by leaf so the ones sharing a leaf land on different spines.
    fn assign_spines(
        &mut self,
        destinations: &BTreeSet<Lid>,
    ) -> Result<BTreeMap<Lid, Lid>, Error> {
        let spines: Vec<Lid> = self.fabric.spines().iter().copied().collect();
        let mut by_leaf = BTreeMap::<Lid, Vec<Lid>>::new();
        for dst in destinations {
            let leaf = self.fabric.find_leaf_for(*dst)?;
            by_leaf.entry(leaf).or_default().push(*dst);
        }

        let leaves = self.fabric.leaves().len();
        if destinations.len() > leaves && by_leaf.len() < leaves {
            fab_log!(self.log, warn, UNIT_PLANNER,
                "destinations are not spread over all leaves";
                "destinations" => destinations.len(),
                "leaves_used" => by_leaf.len(),
                "leaves" => leaves
            );
        }

        let mut assigned = BTreeMap::new();
        if spines.is_empty() {
            return Ok(assigned);
        }
        let mut load = BTreeMap::<(Lid, Lid), usize>::new();
        for (leaf, dsts) in &by_leaf {
            for dst in dsts {
                let spine = spines[self.next_spine % spines.len()];
                self.next_spine += 1;
                assigned.insert(*dst, spine);
                *load.entry((spine, *leaf)).or_default() += 1;
            }
        }

        for ((spine, leaf), n) in load {
            let cables = self
                .spine_to_leaf
                .get(&(spine, leaf))
                .map_or(0, |c| c.ports.len());
            if n > cables {
                fab_log!(self.log, warn, UNIT_PLANNER,
                    "spine would carry more destinations to a leaf than it \
                     has cables";
                    "spine" => spine,
                    "leaf" => leaf,
                    "destinations" => n,
                    "cables" => cables
                );
            }
        }
        Ok(assigned)
    }

    /// Route every leaf toward `destinations` and account for the traffic of
    /// `senders`. Returns the number of sender/destination pairs routed.
    fn make_routes(
        &mut self,
        destinations: &BTreeSet<Lid>,
        senders: &BTreeSet<Lid>,
    ) -> Result<usize, Error> {
        let assigned = self.assign_spines(destinations)?;
        let leaves: Vec<Lid> = self.fabric.leaves().iter().copied().collect();
        let mut local = BTreeMap::<Lid, Vec<Lid>>::new();
        for s in senders {
            local.entry(self.fabric.find_leaf_for(*s)?).or_default().push(*s);
        }

        let mut routed = 0;
        for leaf in leaves {
            for (dst, spine) in &assigned {
                let output = self.fabric.find_leaf_for(*dst)?;
                if output == leaf {
                    continue;
                }
                let existing = self
                    .fabric
                    .table(leaf)
                    .and_then(|t| t.entry(*dst))
                    .is_some();
                let path = if existing {
                    // decided by an earlier pass
                    match self.existing_path(leaf, *dst, &local)? {
                        Some(p) => p,
                        None => continue,
                    }
                } else {
                    let p = self.plan(leaf, *spine, output, *dst)?;
                    self.fabric.commit(&p, *dst, CommitMode::Strict)?;
                    fab_log!(self.log, debug, UNIT_PLANNER,
                        "route planned {}", p;
                        "dst" => *dst
                    );
                    p
                };

                let at = self
                    .fabric
                    .topology()
                    .attachment(*dst)
                    .ok_or(Error::AddressNotFound(*dst))?;
                for src in local.get(&leaf).into_iter().flatten() {
                    self.occupancy.add_path(*src, at, &path);
                    routed += 1;
                }
            }
        }
        Ok(routed)
    }

    fn existing_path(
        &self,
        leaf: Lid,
        dst: Lid,
        local: &BTreeMap<Lid, Vec<Lid>>,
    ) -> Result<Option<Path>, Error> {
        match local.get(&leaf).and_then(|s| s.first()) {
            Some(src) => self.fabric.existing_path(*src, dst),
            None => Ok(None),
        }
    }

    fn plan(
        &mut self,
        leaf: Lid,
        spine: Lid,
        output: Lid,
        dst: Lid,
    ) -> Result<Path, Error> {
        let no_cable = || {
            Error::InvalidTopology(format!(
                "no cable between leaf {leaf} and spine {spine}"
            ))
        };
        let input_port = self
            .leaf_to_spine
            .get_mut(&(leaf, spine))
            .and_then(PortCycle::pick)
            .ok_or_else(no_cable)?;

        let current = self
            .fabric
            .table(spine)
            .ok_or(Error::AddressNotFound(spine))?
            .entry(dst);
        let spine_port = match current {
            Some(port) => port,
            None => self
                .spine_to_leaf
                .get_mut(&(spine, output))
                .and_then(PortCycle::pick)
                .ok_or_else(|| {
                    Error::InvalidTopology(format!(
                        "no cable between spine {spine} and leaf {output}"
                    ))
                })?,
        };
        Path::new(self.fabric.topology(), leaf, input_port, spine, spine_port)
    }
}

fn ports_toward(
    fabric: &Fabric,
    from: Lid,
    to: Lid,
) -> Result<PortCycle, Error> {
    let table = fabric.table(from).ok_or(Error::AddressNotFound(from))?;
    Ok(PortCycle {
        ports: table.local_ports(to),
        picks: 0,
    })
}
