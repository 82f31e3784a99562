// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property-based tests for route synthesis over randomly shaped leaf/spine
//! fabrics and random priority traffic.

#[cfg(test)]
mod proptest {
    use crate::cost::{CostFunction, Strategy as CostStrategy};
    use crate::synth::{Report, SynthConfig, Synthesizer};
    use crate::test::{leaf_spine_fabric, test_logger, LeafSpine};
    use crate::types::Lid;
    use crate::verify::Verifier;
    use proptest::prelude::*;

    fn shape_strategy() -> impl Strategy<Value = LeafSpine> {
        (2usize..=4, 1usize..=3, 1usize..=3, 1usize..=3).prop_map(
            |(leaves, spines, cables, hosts_per_leaf)| LeafSpine {
                leaves,
                spines,
                cables,
                hosts_per_leaf,
            },
        )
    }

    fn cost_strategy() -> impl Strategy<Value = CostStrategy> {
        prop_oneof![
            Just(CostStrategy::SpineFirst),
            Just(CostStrategy::CableBalance),
            Just(CostStrategy::Sticky),
        ]
    }

    // Pick priority hosts with bit masks over the host list
    fn config(shape: &LeafSpine, src_mask: u64, dst_mask: u64) -> SynthConfig {
        let pick = |mask: u64| {
            shape
                .hosts()
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask & (1u64 << i) != 0)
                .map(|(_, h)| h)
                .collect()
        };
        SynthConfig {
            priority_sources: pick(src_mask),
            priority_destinations: pick(dst_mask),
            inter_switch_routes: true,
        }
    }

    fn synthesize(
        shape: &LeafSpine,
        strategy: CostStrategy,
        cfg: &SynthConfig,
    ) -> (Synthesizer<Box<dyn CostFunction>>, Report) {
        let f = leaf_spine_fabric(shape);
        let cost = strategy.build(f.spines().iter().copied());
        let mut s = Synthesizer::new(f, cost, test_logger());
        let report = s.run(cfg).expect("synthesis");
        (s, report)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: the output side of every committed path agrees with
        /// where the destination is cabled
        #[test]
        fn prop_committed_paths_end_at_destination_leaf(
            shape in shape_strategy(),
            strategy in cost_strategy(),
            src_mask in any::<u64>(),
            dst_mask in any::<u64>(),
        ) {
            let cfg = config(&shape, src_mask, dst_mask);
            let (s, _) = synthesize(&shape, strategy, &cfg);
            let fabric = s.fabric();
            let topology = fabric.topology();
            let hosts: Vec<Lid> = shape.hosts();

            for src in &hosts {
                for dst in &hosts {
                    let a = fabric.find_leaf_for(*src).expect("leaf");
                    let b = fabric.find_leaf_for(*dst).expect("leaf");
                    if a == b {
                        continue;
                    }
                    let path = fabric
                        .existing_path(*src, *dst)
                        .expect("lookup")
                        .expect("every pair is routed");
                    prop_assert_eq!(path.input_leaf(), a);
                    prop_assert_eq!(path.output_leaf(), b);
                    let link = topology
                        .link(path.downlink())
                        .expect("spine cable");
                    prop_assert_eq!(link.peer, path.output_leaf());
                    prop_assert_eq!(link.peer_port, path.output_port());
                }
            }
        }

        /// Property: identical inputs give identical tables and reports
        #[test]
        fn prop_synthesis_is_deterministic(
            shape in shape_strategy(),
            strategy in cost_strategy(),
            src_mask in any::<u64>(),
            dst_mask in any::<u64>(),
        ) {
            let cfg = config(&shape, src_mask, dst_mask);
            let (a, ra) = synthesize(&shape, strategy, &cfg);
            let (b, rb) = synthesize(&shape, strategy, &cfg);
            prop_assert_eq!(
                a.fabric().forwarding_tables(),
                b.fabric().forwarding_tables()
            );
            prop_assert_eq!(ra.priority, rb.priority);
            prop_assert_eq!(ra.total, rb.total);
        }

        /// Property: synthesized tables are complete, loop free and connect
        /// every host pair
        #[test]
        fn prop_synthesized_tables_verify(
            shape in shape_strategy(),
            strategy in cost_strategy(),
            src_mask in any::<u64>(),
            dst_mask in any::<u64>(),
        ) {
            let cfg = config(&shape, src_mask, dst_mask);
            let (s, _) = synthesize(&shape, strategy, &cfg);
            let v = Verifier::from_fabric(s.fabric());
            prop_assert!(v.check_missing_entries().is_empty());
            for r in v.check_connectivity() {
                prop_assert!(
                    r.outcome.is_ok(),
                    "{} -> {}: {}", r.src, r.dst, r.outcome
                );
            }
        }
    }
}
