// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Forwarding table synthesis and verification for two tier leaf/spine
//! fabrics.

pub mod cost;
pub mod error;
pub mod fabric;
pub mod occupancy;
pub mod path;
pub mod planner;
pub mod synth;
pub mod table;
pub mod topology;
pub mod types;
pub mod verify;

pub(crate) mod log;

pub use error::Error;
pub use fabric::{Candidates, Fabric, Oversubscription};
pub use planner::RoundRobinPlanner;
pub use synth::{Phase, Report, SynthConfig, Synthesizer};
pub use topology::Topology;
pub use types::*;
pub use verify::Verifier;

#[cfg(test)]
mod proptest;

pub const COMPONENT_FABRIC: &str = "fabric";
