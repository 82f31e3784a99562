// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::path::Path;
use crate::types::{Attachment, Lid};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Number of committed routes per key. Keys that were never counted read
/// as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter<K: Ord> {
    counts: BTreeMap<K, u64>,
}

impl<K: Ord> Default for Counter<K> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> Counter<K> {
    pub fn inc(&mut self, key: K) {
        *self.counts.entry(key).or_default() += 1;
    }

    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn max(&self) -> u64 {
        self.counts.values().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// `(occupancy, number of keys with that occupancy)`, highest occupancy
    /// first.
    pub fn histogram(&self) -> Vec<(u64, usize)> {
        self.counts
            .values()
            .copied()
            .counts()
            .into_iter()
            .sorted_by(|a, b| b.0.cmp(&a.0))
            .collect()
    }
}

/// Load seen by spines and cables as routes are committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    /// Routes through each spine.
    spine: Counter<Lid>,
    /// Routes on each leaf to spine cable, keyed by the leaf end.
    leaf_to_spine: Counter<Attachment>,
    /// Routes on each spine to leaf cable, keyed by the spine end.
    spine_to_leaf: Counter<Attachment>,
    /// Routes leaving each source host.
    host_to_leaf: Counter<Lid>,
    /// Routes on each leaf to host cable, keyed by the leaf end.
    leaf_to_host: Counter<Attachment>,
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for traffic from host `src` along `path` to the host cabled
    /// to `dst`.
    pub fn add_path(&mut self, src: Lid, dst: Attachment, path: &Path) {
        self.spine.inc(path.spine());
        self.leaf_to_spine.inc(path.uplink());
        self.spine_to_leaf.inc(path.downlink());
        self.host_to_leaf.inc(src);
        self.leaf_to_host.inc(dst);
    }

    pub fn spine_occupancy(&self, path: &Path) -> u64 {
        self.spine.get(&path.spine())
    }

    pub fn leaf_to_spine_occupancy(&self, path: &Path) -> u64 {
        self.leaf_to_spine.get(&path.uplink())
    }

    pub fn spine_to_leaf_occupancy(&self, path: &Path) -> u64 {
        self.spine_to_leaf.get(&path.downlink())
    }

    pub fn spine_count(&self, spine: Lid) -> u64 {
        self.spine.get(&spine)
    }

    pub fn spines(&self) -> &Counter<Lid> {
        &self.spine
    }

    pub fn leaf_to_spine(&self) -> &Counter<Attachment> {
        &self.leaf_to_spine
    }

    pub fn spine_to_leaf(&self) -> &Counter<Attachment> {
        &self.spine_to_leaf
    }

    pub fn host_to_leaf(&self) -> &Counter<Lid> {
        &self.host_to_leaf
    }

    pub fn leaf_to_host(&self) -> &Counter<Attachment> {
        &self.leaf_to_host
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{leaf_spine, LeafSpine};
    use pretty_assertions::assert_eq;

    const CFG: LeafSpine = LeafSpine {
        leaves: 2,
        spines: 2,
        cables: 2,
        hosts_per_leaf: 2,
    };

    fn path(j: usize, c: usize) -> Path {
        Path::new(
            &leaf_spine(&CFG),
            CFG.leaf(0),
            CFG.leaf_port(j, c),
            CFG.spine(j),
            CFG.spine_port(1, c),
        )
        .expect("path")
    }

    #[test]
    fn counts_all_five_dimensions() {
        let mut o = Occupancy::new();
        let p = path(0, 1);
        let src = CFG.host(0, 0);
        let dst = Attachment::new(CFG.leaf(1), 1);

        o.add_path(src, dst, &p);
        o.add_path(CFG.host(0, 1), dst, &p);

        assert_eq!(o.spine_occupancy(&p), 2);
        assert_eq!(o.leaf_to_spine_occupancy(&p), 2);
        assert_eq!(o.spine_to_leaf_occupancy(&p), 2);
        assert_eq!(o.host_to_leaf().get(&src), 1);
        assert_eq!(o.leaf_to_host().get(&dst), 2);
        assert_eq!(o.spine_count(CFG.spine(1)), 0);
        assert_eq!(o.leaf_to_spine_occupancy(&path(0, 0)), 0);
    }

    #[test]
    fn snapshot_is_independent() {
        let mut o = Occupancy::new();
        let p = path(1, 0);
        let dst = Attachment::new(CFG.leaf(1), 2);
        o.add_path(CFG.host(0, 0), dst, &p);

        let snapshot = o.clone();
        o.add_path(CFG.host(0, 1), dst, &p);

        assert_eq!(snapshot.spine_occupancy(&p), 1);
        assert_eq!(o.spine_occupancy(&p), 2);
        assert_ne!(snapshot, o);
    }

    #[test]
    fn histogram_descending() {
        let mut c = Counter::default();
        for k in [1u16, 1, 1, 2, 2, 3, 4, 4, 4] {
            c.inc(k);
        }
        assert_eq!(c.histogram(), vec![(3, 2), (2, 1), (1, 1)]);
        assert_eq!(c.max(), 3);
        assert_eq!(c.total(), 9);
        assert!(Counter::<u16>::default().histogram().is_empty());
    }
}
