// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ranking of candidate paths.
//!
//! A cost function turns a candidate [`Path`] into a [`Score`] given the
//! load committed so far. Scores compare lexicographically and the smallest
//! one wins, so the first element is the primary balancing goal and the
//! following ones break ties.

use crate::occupancy::Occupancy;
use crate::path::Path;
use crate::types::Lid;
#[cfg(feature = "clap")]
use clap::ValueEnum;
use std::collections::BTreeMap;

pub type Score = Vec<u64>;

pub trait CostFunction {
    fn score(
        &mut self,
        occupancy: &Occupancy,
        path: &Path,
        src: Lid,
        dst: Lid,
    ) -> Score;
}

impl<C: CostFunction + ?Sized> CostFunction for Box<C> {
    fn score(
        &mut self,
        occupancy: &Occupancy,
        path: &Path,
        src: Lid,
        dst: Lid,
    ) -> Score {
        (**self).score(occupancy, path, src, dst)
    }
}

/// Balance spines first, then leaf to spine cables, then spine to leaf
/// cables.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpineFirst;

impl CostFunction for SpineFirst {
    fn score(
        &mut self,
        occupancy: &Occupancy,
        path: &Path,
        _src: Lid,
        _dst: Lid,
    ) -> Score {
        vec![
            occupancy.spine_occupancy(path),
            occupancy.leaf_to_spine_occupancy(path),
            occupancy.spine_to_leaf_occupancy(path),
        ]
    }
}

/// Balance the busier of the two cables a path uses, then fall back to
/// spine load.
#[derive(Debug, Clone, Copy, Default)]
pub struct CableBalance;

impl CostFunction for CableBalance {
    fn score(
        &mut self,
        occupancy: &Occupancy,
        path: &Path,
        _src: Lid,
        _dst: Lid,
    ) -> Score {
        let spine = occupancy.spine_occupancy(path);
        let up = occupancy.leaf_to_spine_occupancy(path);
        let down = occupancy.spine_to_leaf_occupancy(path);
        vec![up.max(down), spine, up, down]
    }
}

/// Fat tree style routing: every destination is pinned to one spine the
/// first time it is seen, the least loaded one at that moment, and paths
/// through that spine are always preferred.
#[derive(Debug, Clone)]
pub struct StickySpine {
    spines: Vec<Lid>,
    pins: BTreeMap<Lid, Lid>,
}

impl StickySpine {
    pub fn new(spines: impl IntoIterator<Item = Lid>) -> Self {
        Self {
            spines: spines.into_iter().collect(),
            pins: BTreeMap::new(),
        }
    }

    /// The spine `dst` is pinned to, if it has been seen.
    pub fn pin(&self, dst: Lid) -> Option<Lid> {
        self.pins.get(&dst).copied()
    }
}

impl CostFunction for StickySpine {
    fn score(
        &mut self,
        occupancy: &Occupancy,
        path: &Path,
        _src: Lid,
        dst: Lid,
    ) -> Score {
        let spines = &self.spines;
        let pinned = *self.pins.entry(dst).or_insert_with(|| {
            spines
                .iter()
                .map(|s| (occupancy.spine_count(*s), *s))
                .min()
                .map(|(_, s)| s)
                .unwrap_or(path.spine())
        });
        vec![
            u64::from(pinned != path.spine()),
            occupancy.spine_to_leaf_occupancy(path),
            occupancy.leaf_to_spine_occupancy(path),
        ]
    }
}

/// The built in cost functions, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
pub enum Strategy {
    #[default]
    SpineFirst,
    CableBalance,
    Sticky,
}

impl Strategy {
    pub fn build(
        &self,
        spines: impl IntoIterator<Item = Lid>,
    ) -> Box<dyn CostFunction> {
        match self {
            Strategy::SpineFirst => Box::new(SpineFirst),
            Strategy::CableBalance => Box::new(CableBalance),
            Strategy::Sticky => Box::new(StickySpine::new(spines)),
        }
    }
}
