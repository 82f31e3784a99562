// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hop by hop replay of forwarding tables.
//!
//! The verifier does not trust anything the synthesizer knows. It only
//! needs the tables themselves and the cabling, so it works equally on a
//! freshly synthesized [`Fabric`] and on tables read back from a dump.

use crate::fabric::Fabric;
use crate::topology::Topology;
use crate::types::{Attachment, ForwardingTables, Lid, PeerKind};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// Walks longer than this are considered loops.
pub const DEFAULT_MAX_HOPS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// Reached, with the switches visited in order.
    Ok(Vec<Lid>),
    /// The walk got stuck at switch `at`.
    NoRoute { at: Lid },
    LoopDetected { visited: Vec<Lid> },
}

impl PairOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, PairOutcome::Ok(_))
    }
}

impl Display for PairOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let hops = |v: &[Lid]| {
            v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" -> ")
        };
        match self {
            PairOutcome::Ok(path) => write!(f, "ok via {}", hops(path)),
            PairOutcome::NoRoute { at } => write!(f, "no route at {at}"),
            PairOutcome::LoopDetected { visited } => {
                write!(f, "loop detected {}", hops(visited))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairResult {
    pub src: Lid,
    pub dst: Lid,
    pub outcome: PairOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingEntry {
    pub switch: Lid,
    pub dst: Lid,
    pub kind: PeerKind,
}

impl Display for MissingEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "switch {} does not have an entry for {} {}",
            self.switch, self.kind, self.dst
        )
    }
}

pub struct Verifier {
    tables: ForwardingTables,
    switches: BTreeSet<Lid>,
    hosts: BTreeMap<Lid, Attachment>,
    links: BTreeMap<Attachment, Lid>,
    max_hops: usize,
}

impl Verifier {
    pub fn from_topology(
        topology: &Topology,
        tables: ForwardingTables,
    ) -> Self {
        Self {
            tables,
            switches: topology.switch_lids().collect(),
            hosts: topology.host_attachments().clone(),
            links: topology.link_map(),
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    pub fn from_fabric(fabric: &Fabric) -> Self {
        Self::from_topology(fabric.topology(), fabric.forwarding_tables())
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Follow the tables from `src` toward `dst`. A host source starts at
    /// the switch it is cabled to, a switch source starts at itself.
    pub fn check_pair(&self, src: Lid, dst: Lid) -> PairOutcome {
        let start = match self.hosts.get(&src) {
            Some(at) => at.switch,
            None => src,
        };
        let mut current = start;
        let mut visited = vec![start];

        for _ in 0..self.max_hops {
            let arrived = match self.hosts.get(&dst) {
                Some(at) => at.switch == current,
                None => current == dst,
            };
            if arrived {
                return PairOutcome::Ok(visited);
            }

            let next = self
                .tables
                .get(&current)
                .and_then(|t| t.get(&dst))
                .and_then(|port| {
                    self.links.get(&Attachment::new(current, *port))
                })
                .filter(|peer| self.switches.contains(peer));
            match next {
                Some(peer) => {
                    current = *peer;
                    visited.push(current);
                }
                None => return PairOutcome::NoRoute { at: current },
            }
        }
        PairOutcome::LoopDetected { visited }
    }

    /// Every ordered pair of distinct hosts.
    pub fn check_connectivity(&self) -> Vec<PairResult> {
        self.check_all(self.hosts.keys().copied())
    }

    /// Every switch toward every host and every other switch.
    pub fn check_switch_connectivity(&self) -> Vec<PairResult> {
        let mut results = Vec::new();
        for src in &self.switches {
            for dst in self.hosts.keys().chain(self.switches.iter()) {
                if src == dst {
                    continue;
                }
                results.push(PairResult {
                    src: *src,
                    dst: *dst,
                    outcome: self.check_pair(*src, *dst),
                });
            }
        }
        results
    }

    fn check_all(
        &self,
        dsts: impl Iterator<Item = Lid> + Clone,
    ) -> Vec<PairResult> {
        let mut results = Vec::new();
        for src in self.hosts.keys() {
            for dst in dsts.clone() {
                if *src == dst {
                    continue;
                }
                results.push(PairResult {
                    src: *src,
                    dst,
                    outcome: self.check_pair(*src, dst),
                });
            }
        }
        results
    }

    /// Entries every switch should have but does not, for every known
    /// host and switch.
    pub fn check_missing_entries(&self) -> Vec<MissingEntry> {
        let empty = BTreeMap::new();
        let mut missing = Vec::new();
        for switch in &self.switches {
            let table = self.tables.get(switch).unwrap_or(&empty);
            let targets = self
                .hosts
                .keys()
                .map(|h| (*h, PeerKind::Host))
                .chain(self.switches.iter().map(|s| (*s, PeerKind::Switch)));
            for (dst, kind) in targets {
                if !table.contains_key(&dst) {
                    missing.push(MissingEntry {
                        switch: *switch,
                        dst,
                        kind,
                    });
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cost::SpineFirst;
    use crate::synth::{SynthConfig, Synthesizer};
    use crate::test::{leaf_spine, leaf_spine_fabric, test_logger, LeafSpine};
    use crate::types::MANAGEMENT_PORT;
    use pretty_assertions::assert_eq;

    const CFG: LeafSpine = LeafSpine {
        leaves: 2,
        spines: 2,
        cables: 1,
        hosts_per_leaf: 1,
    };

    #[test]
    fn loop_between_leaf_and_spine() {
        let (h1, h2) = (CFG.host(0, 0), CFG.host(1, 0));
        let (leaf, spine) = (CFG.leaf(0), CFG.spine(0));
        let mut tables = ForwardingTables::new();
        tables.entry(leaf).or_default().insert(h2, CFG.leaf_port(0, 0));
        tables.entry(spine).or_default().insert(h2, CFG.spine_port(0, 0));

        let v = Verifier::from_topology(&leaf_spine(&CFG), tables);
        match v.check_pair(h1, h2) {
            PairOutcome::LoopDetected { visited } => {
                assert_eq!(visited.len(), DEFAULT_MAX_HOPS + 1);
                assert_eq!(visited[..3].to_vec(), vec![leaf, spine, leaf]);
            }
            other => panic!("expected a loop, got {other:?}"),
        }
    }

    #[test]
    fn missing_entry_stops_walk() {
        let (h1, h2) = (CFG.host(0, 0), CFG.host(1, 0));
        let mut tables = ForwardingTables::new();
        tables
            .entry(CFG.leaf(0))
            .or_default()
            .insert(h2, CFG.leaf_port(1, 0));

        let v = Verifier::from_topology(&leaf_spine(&CFG), tables);
        assert_eq!(v.check_pair(h1, h2), PairOutcome::NoRoute {
            at: CFG.spine(1)
        });
        assert_eq!(v.check_pair(h2, h1), PairOutcome::NoRoute {
            at: CFG.leaf(1)
        });
    }

    #[test]
    fn entry_into_a_host_port_is_no_route() {
        let (h1, h2) = (CFG.host(0, 0), CFG.host(1, 0));
        let mut tables = ForwardingTables::new();
        tables.entry(CFG.leaf(0)).or_default().insert(h2, 1);
        let v = Verifier::from_topology(&leaf_spine(&CFG), tables);
        assert_eq!(v.check_pair(h1, h2), PairOutcome::NoRoute {
            at: CFG.leaf(0)
        });
    }

    #[test]
    fn missing_entries_by_kind() {
        let f = leaf_spine_fabric(&CFG);
        let v = Verifier::from_fabric(&f);
        let missing = v.check_missing_entries();
        // leaves miss the remote host and leaf, spines miss both hosts
        assert!(missing.contains(&MissingEntry {
            switch: CFG.leaf(0),
            dst: CFG.host(1, 0),
            kind: PeerKind::Host,
        }));
        assert!(missing.contains(&MissingEntry {
            switch: CFG.leaf(0),
            dst: CFG.leaf(1),
            kind: PeerKind::Switch,
        }));
        assert!(missing.contains(&MissingEntry {
            switch: CFG.spine(0),
            dst: CFG.host(0, 0),
            kind: PeerKind::Host,
        }));
        assert!(!missing.iter().any(|m| m.dst == m.switch));
    }

    #[test]
    fn synthesized_tables_pass() {
        let cfg = LeafSpine {
            leaves: 3,
            spines: 2,
            cables: 2,
            hosts_per_leaf: 2,
        };
        let mut s = Synthesizer::new(
            leaf_spine_fabric(&cfg),
            SpineFirst,
            test_logger(),
        );
        s.run(&SynthConfig {
            priority_sources: [cfg.host(0, 0)].into(),
            priority_destinations: [cfg.host(2, 1)].into(),
            inter_switch_routes: true,
        })
        .expect("run");

        let v = Verifier::from_fabric(s.fabric());
        assert_eq!(v.check_missing_entries(), vec![]);
        for r in v.check_connectivity() {
            match &r.outcome {
                PairOutcome::Ok(path) => {
                    assert!(path.len() == 1 || path.len() == 3)
                }
                other => panic!("{} -> {}: {other}", r.src, r.dst),
            }
        }
        assert!(v
            .check_switch_connectivity()
            .iter()
            .all(|r| r.outcome.is_ok()));
        for lid in cfg.hosts() {
            let t = &s.fabric().forwarding_tables()[&cfg.leaf(0)];
            assert!(t.contains_key(&lid));
        }
        assert_eq!(
            s.fabric().table(cfg.spine(0)).expect("t").entry(cfg.spine(0)),
            Some(MANAGEMENT_PORT)
        );
    }
}
