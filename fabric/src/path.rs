// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;
use crate::topology::Topology;
use crate::types::{Attachment, Lid, PeerKind, PortNumber};
use std::fmt::{self, Display, Formatter};

/// A route across the fabric: up from an input leaf to a spine and down to
/// an output leaf. The output side is derived from the cabling when the path
/// is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
    input_leaf: Lid,
    input_port: PortNumber,
    spine: Lid,
    spine_port: PortNumber,
    output_leaf: Lid,
    output_port: PortNumber,
}

impl Path {
    /// Build the path leaving `input_leaf` through `input_port` to `spine`,
    /// which sends it on through `spine_port`.
    pub fn new(
        topology: &Topology,
        input_leaf: Lid,
        input_port: PortNumber,
        spine: Lid,
        spine_port: PortNumber,
    ) -> Result<Self, Error> {
        let up =
            switch_link(topology, Attachment::new(input_leaf, input_port))?;
        if up.switch != spine {
            return Err(Error::InvalidTopology(format!(
                "leaf {input_leaf} port {input_port} leads to {} not spine \
                 {spine}",
                up.switch
            )));
        }
        let down = switch_link(topology, Attachment::new(spine, spine_port))?;
        Ok(Self {
            input_leaf,
            input_port,
            spine,
            spine_port,
            output_leaf: down.switch,
            output_port: down.port,
        })
    }

    /// The path in the opposite direction over the same two cables: out of
    /// the output leaf toward the spine and from there back to the input
    /// leaf.
    pub fn reverse(&self, topology: &Topology) -> Result<Self, Error> {
        let back = switch_link(
            topology,
            Attachment::new(self.input_leaf, self.input_port),
        )?;
        Self::new(
            topology,
            self.output_leaf,
            self.output_port,
            self.spine,
            back.port,
        )
    }

    pub fn input_leaf(&self) -> Lid {
        self.input_leaf
    }

    pub fn input_port(&self) -> PortNumber {
        self.input_port
    }

    pub fn spine(&self) -> Lid {
        self.spine
    }

    pub fn spine_port(&self) -> PortNumber {
        self.spine_port
    }

    pub fn output_leaf(&self) -> Lid {
        self.output_leaf
    }

    /// The port the path enters the output leaf on.
    pub fn output_port(&self) -> PortNumber {
        self.output_port
    }

    /// The cable from the input leaf up to the spine.
    pub fn uplink(&self) -> Attachment {
        Attachment::new(self.input_leaf, self.input_port)
    }

    /// The cable from the spine down to the output leaf.
    pub fn downlink(&self) -> Attachment {
        Attachment::new(self.spine, self.spine_port)
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[leaf {}:{} -> spine {}:{} -> leaf {}:{}]",
            self.input_leaf,
            self.input_port,
            self.spine,
            self.spine_port,
            self.output_leaf,
            self.output_port,
        )
    }
}

/// The far end of a switch-to-switch cable.
fn switch_link(
    topology: &Topology,
    at: Attachment,
) -> Result<Attachment, Error> {
    match topology.link(at) {
        Some(l) if l.peer_kind == PeerKind::Switch => {
            Ok(Attachment::new(l.peer, l.peer_port))
        }
        Some(l) => Err(Error::InvalidTopology(format!(
            "{at} leads to host {}, not a switch",
            l.peer
        ))),
        None => Err(Error::InvalidTopology(format!("{at} is not cabled"))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{leaf_spine, LeafSpine};

    const CFG: LeafSpine = LeafSpine {
        leaves: 3,
        spines: 2,
        cables: 2,
        hosts_per_leaf: 1,
    };

    #[test]
    fn output_side_follows_cabling() {
        let t = leaf_spine(&CFG);
        let p = Path::new(
            &t,
            CFG.leaf(0),
            CFG.leaf_port(1, 1),
            CFG.spine(1),
            CFG.spine_port(2, 0),
        )
        .expect("path");

        assert_eq!(p.output_leaf(), CFG.leaf(2));
        assert_eq!(p.output_port(), CFG.leaf_port(1, 0));
        assert_eq!(p.to_string(), "[leaf 1:5 -> spine 5:5 -> leaf 3:4]");
    }

    #[test]
    fn reverse_uses_same_cables() {
        let t = leaf_spine(&CFG);
        let p = Path::new(
            &t,
            CFG.leaf(0),
            CFG.leaf_port(0, 1),
            CFG.spine(0),
            CFG.spine_port(1, 1),
        )
        .expect("path");
        let r = p.reverse(&t).expect("reverse");

        assert_eq!(r.input_leaf(), CFG.leaf(1));
        assert_eq!(r.input_port(), CFG.leaf_port(0, 1));
        assert_eq!(r.spine(), CFG.spine(0));
        assert_eq!(r.spine_port(), CFG.spine_port(0, 1));
        assert_eq!(r.output_leaf(), CFG.leaf(0));
        assert_eq!(r.output_port(), p.input_port());
        assert_eq!(r.reverse(&t).expect("reverse twice"), p);
    }

    #[test]
    fn input_port_must_reach_spine() {
        let t = leaf_spine(&CFG);
        // port 1 of a leaf is a host port
        assert!(Path::new(&t, CFG.leaf(0), 1, CFG.spine(0), 1).is_err());
        // uplink toward spine 0 does not reach spine 1
        assert!(Path::new(
            &t,
            CFG.leaf(0),
            CFG.leaf_port(0, 0),
            CFG.spine(1),
            CFG.spine_port(1, 0)
        )
        .is_err());
    }
}
