// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// A local identifier. Every host and switch in a fabric snapshot has exactly
/// one, and LID 0 is never assigned to an endpoint.
pub type Lid = u16;

/// A physical switch port. Port 0 is the switch management port, which is
/// where a switch forwards traffic addressed to itself.
pub type PortNumber = u8;

/// The port a switch forwards traffic destined to its own LID through.
pub const MANAGEMENT_PORT: PortNumber = 0;

/// Forwarding tables keyed by switch LID, then destination LID.
pub type ForwardingTables = BTreeMap<Lid, BTreeMap<Lid, PortNumber>>;

/// What sits at the far end of a cable.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PeerKind {
    Host,
    Switch,
}

impl Display for PeerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PeerKind::Host => write!(f, "host"),
            PeerKind::Switch => write!(f, "switch"),
        }
    }
}

/// A switch port and the switch it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attachment {
    pub switch: Lid,
    pub port: PortNumber,
}

impl Attachment {
    pub fn new(switch: Lid, port: PortNumber) -> Self {
        Self { switch, port }
    }
}

impl Display for Attachment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.switch, self.port)
    }
}

/// How a commit treats an entry that is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// An existing entry must agree with the one being set, anything else is
    /// a route conflict.
    Strict,
    /// An existing entry wins and stops further propagation of the route.
    BestEffort,
}

/// The result of setting a forwarding entry that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// The entry was absent and has been created.
    Assigned,
    /// An entry was already present and has been left as is.
    AlreadyAssigned,
}

/// Expected number of leaf and spine switches. A `None` accepts whatever
/// the topology contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FabricShape {
    pub leaves: Option<usize>,
    pub spines: Option<usize>,
}
