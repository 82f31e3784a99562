// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The set of forwarding tables of a leaf/spine fabric.
//!
//! A [`Fabric`] owns one [`SwitchTable`] per switch. Host routes are only
//! ever added through [`Fabric::commit`], which writes the input leaf and
//! spine halves of a [`Path`]; the output leaf already knows its hosts from
//! the cabling. Once a destination has an entry on a switch that entry is
//! never changed, so route discovery treats existing entries as decisions
//! that constrain all later ones.

use crate::error::Error;
use crate::log::fab_log;
use crate::path::Path;
use crate::table::SwitchTable;
use crate::topology::Topology;
use crate::types::{
    Assignment, CommitMode, FabricShape, ForwardingTables, Lid, PeerKind,
};
use slog::Logger;
use std::collections::{BTreeMap, BTreeSet};

const UNIT_FABRIC: &str = "fabric";

/// Route discovery result for a pair of hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// Both hosts hang off the same leaf, which forwards between them
    /// without using any cable to a spine.
    SameLeaf,
    /// Possible cross-fabric paths in enumeration order.
    Paths(Vec<Path>),
}

/// More destinations behind one spine/leaf pair than there are cables
/// between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oversubscription {
    pub spine: Lid,
    pub leaf: Lid,
    pub destinations: usize,
    pub cables: usize,
}

pub struct Fabric {
    topology: Topology,
    tables: BTreeMap<Lid, SwitchTable>,
    leaves: BTreeSet<Lid>,
    spines: BTreeSet<Lid>,
    log: Logger,
}

impl Fabric {
    pub fn new(
        topology: Topology,
        shape: FabricShape,
        log: Logger,
    ) -> Result<Self, Error> {
        let (leaves, spines) = topology.classify();
        check_shape("leaf", shape.leaves, leaves.len())?;
        check_shape("spine", shape.spines, spines.len())?;

        let mut tables = BTreeMap::new();
        for lid in topology.switch_lids() {
            for l in topology.links(lid)? {
                if l.peer_kind == PeerKind::Switch
                    && leaves.contains(&lid) == leaves.contains(&l.peer)
                {
                    return Err(Error::InvalidTopology(format!(
                        "switches {} and {} are cabled within the same tier",
                        lid, l.peer
                    )));
                }
            }
            tables.insert(lid, SwitchTable::new(&topology, lid)?);
        }

        fab_log!(log, info, UNIT_FABRIC, "fabric built";
            "leaves" => leaves.len(),
            "spines" => spines.len(),
            "hosts" => topology.host_attachments().len()
        );

        Ok(Self {
            topology,
            tables,
            leaves,
            spines,
            log,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn leaves(&self) -> &BTreeSet<Lid> {
        &self.leaves
    }

    pub fn spines(&self) -> &BTreeSet<Lid> {
        &self.spines
    }

    pub fn table(&self, lid: Lid) -> Option<&SwitchTable> {
        self.tables.get(&lid)
    }

    pub fn tables(&self) -> impl Iterator<Item = &SwitchTable> {
        self.tables.values()
    }

    fn table_ref(&self, lid: Lid) -> Result<&SwitchTable, Error> {
        self.tables.get(&lid).ok_or(Error::AddressNotFound(lid))
    }

    fn table_mut(&mut self, lid: Lid) -> Result<&mut SwitchTable, Error> {
        self.tables.get_mut(&lid).ok_or(Error::AddressNotFound(lid))
    }

    /// The leaf switch `host` is cabled to.
    pub fn find_leaf_for(&self, host: Lid) -> Result<Lid, Error> {
        if !self.topology.is_host(host) {
            return Err(Error::AddressNotFound(host));
        }
        self.leaves
            .iter()
            .copied()
            .find(|l| self.tables[l].is_connected_to(host))
            .ok_or(Error::AddressNotFound(host))
    }

    /// The path traffic from `src` to `dst` is already committed to, if any.
    ///
    /// The two hosts must be on different leaves. A leaf entry without the
    /// matching spine entry means a commit was interrupted half way and is
    /// reported as an error rather than as a missing path.
    pub fn existing_path(
        &self,
        src: Lid,
        dst: Lid,
    ) -> Result<Option<Path>, Error> {
        let input = self.find_leaf_for(src)?;
        let output = self.find_leaf_for(dst)?;
        if input == output {
            return Err(Error::SameLeafMisuse {
                src,
                dst,
                leaf: input,
            });
        }
        self.existing_path_from(input, dst)
    }

    fn existing_path_from(
        &self,
        input: Lid,
        dst: Lid,
    ) -> Result<Option<Path>, Error> {
        let leaf = self.table_ref(input)?;
        let Some(port) = leaf.entry(dst) else {
            return Ok(None);
        };
        let spine = leaf
            .peer(port)
            .filter(|x| self.spines.contains(x))
            .ok_or_else(|| {
                Error::InvalidTopology(format!(
                    "leaf {input} forwards {dst} to port {port} which does \
                     not lead to a spine"
                ))
            })?;
        let Some(spine_port) = self.table_ref(spine)?.entry(dst) else {
            return Err(Error::DanglingPartialRoute {
                dst,
                leaf: input,
                port,
                spine,
            });
        };
        Path::new(&self.topology, input, port, spine, spine_port).map(Some)
    }

    /// Every path traffic from `src` to `dst` could take given what has been
    /// committed so far.
    ///
    /// A committed path is the only candidate. Otherwise paths are
    /// enumerated by ascending input leaf port, then ascending spine port.
    /// A spine that already forwards `dst` somewhere only offers that port,
    /// so a destination is never split across two spine egress ports.
    pub fn candidate_paths(
        &self,
        src: Lid,
        dst: Lid,
    ) -> Result<Candidates, Error> {
        let input = self.find_leaf_for(src)?;
        let output = self.find_leaf_for(dst)?;
        if input == output {
            return Ok(Candidates::SameLeaf);
        }

        if let Some(path) = self.existing_path_from(input, dst)? {
            return Ok(Candidates::Paths(vec![path]));
        }

        let mut paths = Vec::new();
        for (input_port, spine) in self.table_ref(input)?.local() {
            if !self.spines.contains(&spine) {
                continue;
            }
            let spine_table = self.table_ref(spine)?;
            let allowed = match spine_table.entry(dst) {
                Some(port) => vec![port],
                None => spine_table.local().map(|(port, _)| port).collect(),
            };
            for spine_port in allowed {
                if spine_table.peer(spine_port) != Some(output) {
                    continue;
                }
                paths.push(Path::new(
                    &self.topology,
                    input,
                    input_port,
                    spine,
                    spine_port,
                )?);
            }
        }
        Ok(Candidates::Paths(paths))
    }

    /// Install `path` as the route toward `dst` on its input leaf and spine.
    ///
    /// In best effort mode an input leaf that already has an entry for `dst`
    /// stops the commit, the spine is left alone. The output leaf is never
    /// written, it knows its own hosts from the start.
    pub fn commit(
        &mut self,
        path: &Path,
        dst: Lid,
        mode: CommitMode,
    ) -> Result<Assignment, Error> {
        let leaf = self.table_mut(path.input_leaf())?.set_entry(
            dst,
            path.input_port(),
            mode,
        )?;
        if leaf == Assignment::AlreadyAssigned && mode == CommitMode::BestEffort
        {
            return Ok(leaf);
        }
        self.table_mut(path.spine())?.set_entry(
            dst,
            path.spine_port(),
            mode,
        )?;

        fab_log!(self.log, debug, UNIT_FABRIC, "committed {}", path;
            "dst" => dst,
            "assignment" => format!("{leaf:?}")
        );
        Ok(leaf)
    }

    /// Fill the entries host routing leaves open, so that every switch can
    /// reach every other switch and every host.
    ///
    /// Direct leaf/spine routes normally exist from the cabling. Everything
    /// else takes a detour through a switch of the other tier picked round
    /// robin among those that already reach the destination. These routes
    /// carry management traffic only and are not balanced. Existing entries
    /// are never touched.
    pub fn synthesize_inter_switch_routes(&mut self) -> Result<(), Error> {
        let leaves: Vec<Lid> = self.leaves.iter().copied().collect();
        let spines: Vec<Lid> = self.spines.iter().copied().collect();

        for leaf in &leaves {
            for spine in &spines {
                self.fill_direct(*leaf, *spine)?;
                self.fill_direct(*spine, *leaf)?;
            }
        }

        // spines toward hosts, spreading over parallel cables
        let hosts: Vec<(Lid, Lid)> = self
            .topology
            .host_attachments()
            .iter()
            .map(|(h, at)| (*h, at.switch))
            .collect();
        for spine in &spines {
            let mut next = BTreeMap::<Lid, usize>::new();
            for (host, leaf) in &hosts {
                let table = self.table_ref(*spine)?;
                if table.entry(*host).is_some() {
                    continue;
                }
                let ports = table.local_ports(*leaf);
                if ports.is_empty() {
                    fab_log!(self.log, warn, UNIT_FABRIC,
                        "spine not cabled to leaf of host";
                        "spine" => *spine,
                        "leaf" => *leaf,
                        "host" => *host
                    );
                    continue;
                }
                let i = next.entry(*leaf).or_default();
                let port = ports[*i % ports.len()];
                *i += 1;
                self.table_mut(*spine)?.set_entry(
                    *host,
                    port,
                    CommitMode::BestEffort,
                )?;
            }
        }

        let host_lids: Vec<Lid> = hosts.iter().map(|(h, _)| *h).collect();
        self.fill_via(&leaves, &host_lids, &spines)?;
        self.fill_via(&leaves, &leaves, &spines)?;
        self.fill_via(&spines, &spines, &leaves)?;

        fab_log!(self.log, info, UNIT_FABRIC, "inter-switch routes complete");
        Ok(())
    }

    /// Give `from` a route to `to` over a direct cable if it has none.
    fn fill_direct(&mut self, from: Lid, to: Lid) -> Result<(), Error> {
        let table = self.table_ref(from)?;
        if table.entry(to).is_some() {
            return Ok(());
        }
        match table.local_ports(to).first().copied() {
            Some(port) => {
                fab_log!(self.log, warn, UNIT_FABRIC,
                    "cabled switches without a route, using first port";
                    "switch" => from,
                    "dst" => to,
                    "port" => port
                );
                self.table_mut(from)?.set_entry(
                    to,
                    port,
                    CommitMode::BestEffort,
                )?;
            }
            None => {
                fab_log!(self.log, warn, UNIT_FABRIC,
                    "asymmetric topology, switches are not cabled";
                    "switch" => from,
                    "dst" => to
                );
            }
        }
        Ok(())
    }

    /// For every switch in `from` without a route to a LID in `to`, route
    /// through a switch in `via` that is reachable and already reaches the
    /// destination, rotating through the eligible ones.
    fn fill_via(
        &mut self,
        from: &[Lid],
        to: &[Lid],
        via: &[Lid],
    ) -> Result<(), Error> {
        let mut next = 0usize;
        for src in from {
            for dst in to {
                if src == dst {
                    continue;
                }
                let table = self.table_ref(*src)?;
                if table.entry(*dst).is_some() {
                    continue;
                }
                let mut eligible = Vec::new();
                for v in via {
                    let Some(port) = table.entry(*v) else {
                        continue;
                    };
                    if self.table_ref(*v)?.entry(*dst).is_some() {
                        eligible.push(port);
                    }
                }
                if eligible.is_empty() {
                    fab_log!(self.log, warn, UNIT_FABRIC,
                        "no intermediate switch reaches destination";
                        "switch" => *src,
                        "dst" => *dst
                    );
                    continue;
                }
                let port = eligible[next % eligible.len()];
                next += 1;
                self.table_mut(*src)?.set_entry(
                    *dst,
                    port,
                    CommitMode::BestEffort,
                )?;
            }
        }
        Ok(())
    }

    /// Spine/leaf pairs carrying more of `destinations` than they have
    /// cables. Each finding is also logged as a warning.
    pub fn oversubscription(
        &self,
        destinations: impl IntoIterator<Item = Lid>,
    ) -> Vec<Oversubscription> {
        let mut behind = BTreeMap::<(Lid, Lid), BTreeSet<Lid>>::new();
        let destinations: BTreeSet<Lid> = destinations.into_iter().collect();
        for spine in &self.spines {
            let table = &self.tables[spine];
            for dst in &destinations {
                let leaf = table.entry(*dst).and_then(|p| table.peer(p));
                if let Some(leaf) = leaf.filter(|l| self.leaves.contains(l)) {
                    behind.entry((*spine, leaf)).or_default().insert(*dst);
                }
            }
        }

        let mut result = Vec::new();
        for ((spine, leaf), dsts) in behind {
            let cables = self.tables[&spine].local_ports(leaf).len();
            if dsts.len() > cables {
                fab_log!(self.log, warn, UNIT_FABRIC,
                    "oversubscribed spine to leaf cables";
                    "spine" => spine,
                    "leaf" => leaf,
                    "destinations" => dsts.len(),
                    "cables" => cables
                );
                result.push(Oversubscription {
                    spine,
                    leaf,
                    destinations: dsts.len(),
                    cables,
                });
            }
        }
        result
    }

    /// Export all decided entries.
    pub fn forwarding_tables(&self) -> ForwardingTables {
        self.tables
            .iter()
            .map(|(lid, t)| (*lid, t.entries().collect()))
            .collect()
    }
}

fn check_shape(
    kind: &'static str,
    expected: Option<usize>,
    found: usize,
) -> Result<(), Error> {
    match expected {
        Some(expected) if expected != found => Err(Error::ShapeMismatch {
            kind,
            expected,
            found,
        }),
        _ => Ok(()),
    }
}
