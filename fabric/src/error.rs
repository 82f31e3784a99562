// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::types::{Lid, PortNumber};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("address {0} not found in fabric")]
    AddressNotFound(Lid),

    #[error("hosts {src} and {dst} share leaf switch {leaf}")]
    SameLeafMisuse { src: Lid, dst: Lid, leaf: Lid },

    #[error(
        "route conflict on switch {switch}: destination {dst} uses port \
         {existing}, refusing port {requested}"
    )]
    RouteConflict {
        switch: Lid,
        dst: Lid,
        existing: PortNumber,
        requested: PortNumber,
    },

    #[error(
        "dangling partial route to {dst}: leaf {leaf} port {port} leads to \
         spine {spine} which has no entry"
    )]
    DanglingPartialRoute {
        dst: Lid,
        leaf: Lid,
        port: PortNumber,
        spine: Lid,
    },

    #[error("no path from {src} to {dst}")]
    NoPath { src: Lid, dst: Lid },

    #[error("synthesis already started, now {0}")]
    NotIdle(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("expected {expected} {kind} switches, found {found}")]
    ShapeMismatch {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("io error {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error {0}")]
    Serialization(#[from] serde_json::Error),
}
