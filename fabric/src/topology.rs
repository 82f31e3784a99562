// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Physical topology snapshots.
//!
//! A [`Topology`] is the validated view of what is cabled to what. It is
//! produced from a [`TopologySnapshot`], typically deserialized from the JSON
//! a link discovery tool emits, and is immutable afterwards. Everything the
//! routing code needs to know about the physical fabric, which switch port
//! leads to which peer and where each host hangs off, is answered here.

use crate::error::Error;
use crate::types::{Attachment, Lid, PeerKind, PortNumber};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One cabled switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub port: PortNumber,
    pub peer: Lid,
    pub peer_port: PortNumber,
    pub peer_kind: PeerKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchInfo {
    pub lid: Lid,
    pub name: String,
    /// Physical degree of the switch. Ports without a cable are simply not
    /// listed in `links`.
    pub num_ports: PortNumber,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub lid: Lid,
    pub name: String,
}

/// Unvalidated topology as it comes from a discovery tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub switches: Vec<SwitchInfo>,
    pub hosts: Vec<HostInfo>,
}

#[derive(Debug, Clone)]
pub struct Topology {
    switches: BTreeMap<Lid, SwitchInfo>,
    hosts: BTreeMap<Lid, HostInfo>,
    links: BTreeMap<Attachment, Link>,
    host_attachments: BTreeMap<Lid, Attachment>,
    names: BTreeMap<String, Lid>,
}

impl Topology {
    /// Validate a snapshot. LIDs must be non-zero and unique, names must be
    /// unique across switches and hosts, every cable must be described
    /// identically from both ends and every host must be attached to
    /// exactly one switch port.
    pub fn new(snapshot: TopologySnapshot) -> Result<Self, Error> {
        let mut switches = BTreeMap::new();
        let mut hosts = BTreeMap::new();
        let mut names = BTreeMap::new();

        for s in snapshot.switches {
            check_lid(s.lid, &switches, &hosts)?;
            insert_name(&mut names, &s.name, s.lid)?;
            switches.insert(s.lid, s);
        }
        for h in snapshot.hosts {
            check_lid(h.lid, &switches, &hosts)?;
            insert_name(&mut names, &h.name, h.lid)?;
            hosts.insert(h.lid, h);
        }

        let mut links = BTreeMap::new();
        let mut host_attachments = BTreeMap::new();

        for s in switches.values() {
            for l in &s.links {
                if l.port == 0 || l.port > s.num_ports {
                    return Err(Error::InvalidTopology(format!(
                        "switch {} has no port {} (degree {})",
                        s.lid, l.port, s.num_ports
                    )));
                }
                let at = Attachment::new(s.lid, l.port);
                if links.insert(at, *l).is_some() {
                    return Err(Error::InvalidTopology(format!(
                        "switch {} lists port {} twice",
                        s.lid, l.port
                    )));
                }
                match l.peer_kind {
                    PeerKind::Host => {
                        if !hosts.contains_key(&l.peer) {
                            return Err(Error::InvalidTopology(format!(
                                "switch {} port {} leads to unknown host {}",
                                s.lid, l.port, l.peer
                            )));
                        }
                        if let Some(prev) = host_attachments.insert(l.peer, at)
                        {
                            return Err(Error::InvalidTopology(format!(
                                "host {} is attached to both {} and {}",
                                l.peer, prev, at
                            )));
                        }
                    }
                    PeerKind::Switch => {
                        if l.peer == s.lid {
                            return Err(Error::InvalidTopology(format!(
                                "switch {} port {} is cabled to itself",
                                s.lid, l.port
                            )));
                        }
                        let peer = switches.get(&l.peer).ok_or_else(|| {
                            Error::InvalidTopology(format!(
                                "switch {} port {} leads to unknown switch {}",
                                s.lid, l.port, l.peer
                            ))
                        })?;
                        let back =
                            peer.links.iter().find(|x| x.port == l.peer_port);
                        let symmetric = matches!(
                            back,
                            Some(b) if b.peer == s.lid
                                && b.peer_port == l.port
                                && b.peer_kind == PeerKind::Switch
                        );
                        if !symmetric {
                            return Err(Error::InvalidTopology(format!(
                                "cable {} -> {} is not described from the \
                                 other end",
                                at,
                                Attachment::new(l.peer, l.peer_port)
                            )));
                        }
                    }
                }
            }
        }

        let detached =
            hosts.keys().find(|h| !host_attachments.contains_key(h));
        if let Some(h) = detached {
            return Err(Error::InvalidTopology(format!(
                "host {h} is not attached to any switch"
            )));
        }

        Ok(Self {
            switches,
            hosts,
            links,
            host_attachments,
            names,
        })
    }

    pub fn from_json(s: &str) -> Result<Self, Error> {
        Self::new(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn switch_lids(&self) -> impl Iterator<Item = Lid> + '_ {
        self.switches.keys().copied()
    }

    pub fn host_lids(&self) -> impl Iterator<Item = Lid> + '_ {
        self.hosts.keys().copied()
    }

    pub fn is_host(&self, lid: Lid) -> bool {
        self.hosts.contains_key(&lid)
    }

    pub fn is_switch(&self, lid: Lid) -> bool {
        self.switches.contains_key(&lid)
    }

    pub fn kind(&self, lid: Lid) -> Option<PeerKind> {
        if self.is_host(lid) {
            Some(PeerKind::Host)
        } else if self.is_switch(lid) {
            Some(PeerKind::Switch)
        } else {
            None
        }
    }

    /// Highest LID in the snapshot, zero for an empty one.
    pub fn max_lid(&self) -> Lid {
        let s = self.switches.keys().next_back().copied().unwrap_or(0);
        let h = self.hosts.keys().next_back().copied().unwrap_or(0);
        s.max(h)
    }

    /// Cabled ports of a switch in ascending port order.
    pub fn links(
        &self,
        switch: Lid,
    ) -> Result<impl Iterator<Item = &Link>, Error> {
        if !self.is_switch(switch) {
            return Err(Error::AddressNotFound(switch));
        }
        let first = Attachment::new(switch, 0);
        let last = Attachment::new(switch, PortNumber::MAX);
        Ok(self.links.range(first..=last).map(|(_, l)| l))
    }

    pub fn link(&self, at: Attachment) -> Option<&Link> {
        self.links.get(&at)
    }

    /// The switch port a host is cabled to.
    pub fn attachment(&self, host: Lid) -> Option<Attachment> {
        self.host_attachments.get(&host).copied()
    }

    pub fn host_attachments(&self) -> &BTreeMap<Lid, Attachment> {
        &self.host_attachments
    }

    /// Every cabled switch port and the LID at the other end.
    pub fn link_map(&self) -> BTreeMap<Attachment, Lid> {
        self.links.iter().map(|(at, l)| (*at, l.peer)).collect()
    }

    pub fn name(&self, lid: Lid) -> Option<&str> {
        self.switches
            .get(&lid)
            .map(|s| s.name.as_str())
            .or_else(|| self.hosts.get(&lid).map(|h| h.name.as_str()))
    }

    pub fn lid_by_name(&self, name: &str) -> Option<Lid> {
        self.names.get(name).copied()
    }

    /// Split switches into leaves, which have at least one host cabled to
    /// them, and spines, which have none.
    pub fn classify(&self) -> (BTreeSet<Lid>, BTreeSet<Lid>) {
        self.switches.values().map(|s| s.lid).partition(|lid| {
            self.host_attachments.values().any(|at| at.switch == *lid)
        })
    }
}

fn check_lid(
    lid: Lid,
    switches: &BTreeMap<Lid, SwitchInfo>,
    hosts: &BTreeMap<Lid, HostInfo>,
) -> Result<(), Error> {
    if lid == 0 {
        return Err(Error::InvalidTopology("lid 0 is reserved".into()));
    }
    if switches.contains_key(&lid) || hosts.contains_key(&lid) {
        return Err(Error::InvalidTopology(format!("duplicate lid {lid}")));
    }
    Ok(())
}

fn insert_name(
    names: &mut BTreeMap<String, Lid>,
    name: &str,
    lid: Lid,
) -> Result<(), Error> {
    if let Some(prev) = names.insert(name.to_string(), lid) {
        return Err(Error::InvalidTopology(format!(
            "duplicate name {name} (lids {prev} and {lid})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{leaf_spine, LeafSpine};

    #[test]
    fn classify_small_fabric() {
        let t = leaf_spine(&LeafSpine {
            leaves: 2,
            spines: 2,
            cables: 1,
            hosts_per_leaf: 2,
        });
        let (leaves, spines) = t.classify();
        assert_eq!(leaves.len(), 2);
        assert_eq!(spines.len(), 2);
        for h in t.host_lids() {
            let at = t.attachment(h).expect("attached");
            assert!(leaves.contains(&at.switch));
        }
    }

    #[test]
    fn reject_one_sided_cable() {
        let snapshot = TopologySnapshot {
            switches: vec![
                SwitchInfo {
                    lid: 1,
                    name: "leaf".into(),
                    num_ports: 4,
                    links: vec![Link {
                        port: 1,
                        peer: 2,
                        peer_port: 1,
                        peer_kind: PeerKind::Switch,
                    }],
                },
                SwitchInfo {
                    lid: 2,
                    name: "spine".into(),
                    num_ports: 4,
                    links: vec![],
                },
            ],
            hosts: vec![],
        };
        assert!(matches!(
            Topology::new(snapshot),
            Err(Error::InvalidTopology(_))
        ));
    }

    #[test]
    fn reject_reserved_and_duplicate_lids() {
        let sw = |lid| SwitchInfo {
            lid,
            name: format!("sw{lid}"),
            num_ports: 4,
            links: vec![],
        };
        let zero = TopologySnapshot {
            switches: vec![sw(0)],
            hosts: vec![],
        };
        assert!(Topology::new(zero).is_err());

        let dup = TopologySnapshot {
            switches: vec![sw(3)],
            hosts: vec![HostInfo {
                lid: 3,
                name: "h".into(),
            }],
        };
        assert!(Topology::new(dup).is_err());
    }

    #[test]
    fn reject_duplicate_names() {
        let mut snapshot = crate::test::leaf_spine_snapshot(&LeafSpine {
            leaves: 2,
            spines: 1,
            cables: 1,
            hosts_per_leaf: 1,
        });
        snapshot.hosts[0].name = "x".into();
        snapshot.hosts[1].name = "x".into();
        match Topology::new(snapshot.clone()) {
            Err(Error::InvalidTopology(msg)) => {
                assert!(msg.starts_with("duplicate name x"), "{msg}")
            }
            other => panic!("expected duplicate name, got {other:?}"),
        }

        // a host may not reuse a switch name either
        snapshot.hosts[1].name = snapshot.switches[0].name.clone();
        assert!(matches!(
            Topology::new(snapshot),
            Err(Error::InvalidTopology(_))
        ));
    }

    #[test]
    fn json_roundtrip_preserves_lookup() {
        let t = leaf_spine(&LeafSpine {
            leaves: 2,
            spines: 1,
            cables: 2,
            hosts_per_leaf: 1,
        });
        let snapshot = crate::test::leaf_spine_snapshot(&LeafSpine {
            leaves: 2,
            spines: 1,
            cables: 2,
            hosts_per_leaf: 1,
        });
        let json = serde_json::to_string(&snapshot).expect("serialize");
        let parsed = Topology::from_json(&json).expect("parse");
        assert_eq!(parsed.link_map(), t.link_map());
        for h in t.host_lids() {
            let name = t.name(h).expect("name");
            assert_eq!(parsed.lid_by_name(name), Some(h));
        }
    }
}
