// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;
use crate::topology::Topology;
use crate::types::{
    Assignment, CommitMode, Lid, PortNumber, MANAGEMENT_PORT,
};
use std::collections::BTreeMap;

/// The linear forwarding table of a single switch.
///
/// Entries are indexed by destination LID up to the highest LID in the
/// fabric. A missing entry means no route has been decided yet, which is
/// different from an entry pointing at port 0.
#[derive(Debug, Clone)]
pub struct SwitchTable {
    lid: Lid,
    entries: Vec<Option<PortNumber>>,
    /// Cabled ports and the LID at the other end. Parallel cables to the
    /// same peer show up as separate ports.
    local: BTreeMap<PortNumber, Lid>,
}

impl SwitchTable {
    /// Build the table of `lid`, seeded with a route to every directly
    /// cabled peer and to the switch itself. Where several cables lead to
    /// the same peer the lowest port is used.
    pub fn new(topology: &Topology, lid: Lid) -> Result<Self, Error> {
        let links = topology.links(lid)?;
        let mut t = Self {
            lid,
            entries: vec![None; topology.max_lid() as usize + 1],
            local: BTreeMap::new(),
        };
        t.entries[lid as usize] = Some(MANAGEMENT_PORT);
        for l in links {
            t.local.insert(l.port, l.peer);
            let e = &mut t.entries[l.peer as usize];
            if e.is_none() {
                *e = Some(l.port);
            }
        }
        Ok(t)
    }

    pub fn lid(&self) -> Lid {
        self.lid
    }

    /// The port traffic for `dst` currently leaves through.
    pub fn entry(&self, dst: Lid) -> Option<PortNumber> {
        self.entries.get(dst as usize).copied().flatten()
    }

    /// Set the entry for `dst`. An absent entry is always created. When one
    /// is present it is never changed; in strict mode it must agree with
    /// `port`.
    pub fn set_entry(
        &mut self,
        dst: Lid,
        port: PortNumber,
        mode: CommitMode,
    ) -> Result<Assignment, Error> {
        let lid = self.lid;
        let e = self
            .entries
            .get_mut(dst as usize)
            .ok_or(Error::AddressNotFound(dst))?;
        match (*e, mode) {
            (None, _) => {
                *e = Some(port);
                Ok(Assignment::Assigned)
            }
            (Some(existing), CommitMode::Strict) if existing != port => {
                Err(Error::RouteConflict {
                    switch: lid,
                    dst,
                    existing,
                    requested: port,
                })
            }
            (Some(_), _) => Ok(Assignment::AlreadyAssigned),
        }
    }

    pub fn is_connected_to(&self, lid: Lid) -> bool {
        self.local.values().any(|x| *x == lid)
    }

    /// All ports cabled to `lid`, ascending.
    pub fn local_ports(&self, lid: Lid) -> Vec<PortNumber> {
        self.local
            .iter()
            .filter(|(_, peer)| **peer == lid)
            .map(|(port, _)| *port)
            .collect()
    }

    /// The LID cabled to `port`, if any.
    pub fn peer(&self, port: PortNumber) -> Option<Lid> {
        self.local.get(&port).copied()
    }

    /// Cabled ports in ascending order.
    pub fn local(&self) -> impl Iterator<Item = (PortNumber, Lid)> + '_ {
        self.local.iter().map(|(p, l)| (*p, *l))
    }

    /// Decided entries in ascending destination order.
    pub fn entries(&self) -> impl Iterator<Item = (Lid, PortNumber)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(dst, port)| port.map(|p| (dst as Lid, p)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{leaf_spine, LeafSpine};

    const CFG: LeafSpine = LeafSpine {
        leaves: 2,
        spines: 2,
        cables: 3,
        hosts_per_leaf: 2,
    };

    #[test]
    fn seeded_from_cables() {
        let t = SwitchTable::new(&leaf_spine(&CFG), CFG.leaf(0))
            .expect("table");

        assert_eq!(t.entry(CFG.leaf(0)), Some(MANAGEMENT_PORT));
        assert_eq!(t.entry(CFG.host(0, 1)), Some(2));
        assert_eq!(t.entry(CFG.spine(1)), Some(CFG.leaf_port(1, 0)));
        assert_eq!(t.entry(CFG.host(1, 0)), None);
        assert_eq!(t.entry(CFG.leaf(1)), None);

        // parallel cables are kept apart
        assert_eq!(
            t.local_ports(CFG.spine(0)),
            vec![
                CFG.leaf_port(0, 0),
                CFG.leaf_port(0, 1),
                CFG.leaf_port(0, 2)
            ]
        );
        assert!(t.is_connected_to(CFG.host(0, 0)));
        assert!(!t.is_connected_to(CFG.host(1, 0)));
    }

    #[test]
    fn strict_conflict() {
        let mut t = SwitchTable::new(&leaf_spine(&CFG), CFG.leaf(0))
            .expect("table");
        let dst = CFG.host(1, 0);

        assert_eq!(
            t.set_entry(dst, 3, CommitMode::Strict).expect("first"),
            Assignment::Assigned
        );
        assert_eq!(
            t.set_entry(dst, 3, CommitMode::Strict).expect("same port"),
            Assignment::AlreadyAssigned
        );
        match t.set_entry(dst, 4, CommitMode::Strict) {
            Err(Error::RouteConflict {
                existing: 3,
                requested: 4,
                ..
            }) => {}
            other => panic!("expected route conflict, got {other:?}"),
        }
        assert_eq!(t.entry(dst), Some(3));
    }

    #[test]
    fn best_effort_keeps_existing() {
        let mut t = SwitchTable::new(&leaf_spine(&CFG), CFG.leaf(0))
            .expect("table");
        let dst = CFG.host(1, 1);

        assert_eq!(
            t.set_entry(dst, 3, CommitMode::BestEffort).expect("first"),
            Assignment::Assigned
        );
        assert_eq!(
            t.set_entry(dst, 5, CommitMode::BestEffort).expect("second"),
            Assignment::AlreadyAssigned
        );
        assert_eq!(t.entry(dst), Some(3));
    }

    #[test]
    fn out_of_range_destination() {
        let mut t = SwitchTable::new(&leaf_spine(&CFG), CFG.leaf(0))
            .expect("table");
        assert!(matches!(
            t.set_entry(Lid::MAX, 3, CommitMode::Strict),
            Err(Error::AddressNotFound(Lid::MAX))
        ));
    }

    #[test]
    fn unknown_switch_is_not_found() {
        let t = leaf_spine(&CFG);
        assert!(matches!(
            SwitchTable::new(&t, 500),
            Err(Error::AddressNotFound(500))
        ));
        // hosts have no table either
        assert!(matches!(
            SwitchTable::new(&t, CFG.host(0, 0)),
            Err(Error::AddressNotFound(_))
        ));
    }
}
