//! Integration coverage for the bounded DFS cycle enumerator over SCCs
//! with more structure than a bare triangle: multiple overlapping
//! cycles, a cap that bites, and a depth limit that bites.

use loop_engine_core::cycles::{enumerate_cycles, EnumeratorConfig};
use loop_engine_core::graph::build_graph;
use loop_engine_core::model::{Item, Snapshot, Wallet};
use loop_engine_core::scc::{filter_cyclic_sccs, find_sccs, prune_non_cyclic};
use loop_engine_core::time::Deadline;

fn default_cfg() -> EnumeratorConfig {
    EnumeratorConfig {
        max_depth: 10,
        cycles_cap: 10_000,
        cycles_cap_dense: 500,
        dense_density_threshold: 0.2,
        dense_avg_out_degree_threshold: 5.0,
    }
}

/// A 4-clique in the wants-graph sense: every wallet wants every other
/// wallet's item. This SCC contains many elementary cycles of length 2
/// through 4.
fn four_clique() -> Snapshot {
    let mut snap = Snapshot::new();
    for id in ["A", "B", "C", "D"] {
        snap.insert_wallet(Wallet::new(id));
    }
    for id in ["A", "B", "C", "D"] {
        for other in ["a", "b", "c", "d"] {
            if other != id.to_lowercase() {
                snap.wallets.get_mut(&id.into()).unwrap().wanted_items.insert(other.into());
            }
        }
    }
    for (item, owner) in [("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")] {
        snap.insert_item(Item::new(item, owner));
    }
    snap
}

#[test]
fn clique_enumerates_multiple_distinct_cycle_lengths() {
    let graph = build_graph(&four_clique());
    let keep = prune_non_cyclic(&graph);
    let scc_result = find_sccs(&graph, &keep, &Deadline::from_millis(5_000), 1_000);
    let sccs = filter_cyclic_sccs(scc_result.sccs);
    assert_eq!(sccs.len(), 1);

    let result = enumerate_cycles(&graph, &sccs[0], &Deadline::from_millis(5_000), &default_cfg());
    assert!(!result.timed_out);
    assert!(!result.cycles.is_empty());
    let lengths: std::collections::BTreeSet<usize> = result.cycles.iter().map(|c| c.len()).collect();
    assert!(lengths.len() > 1, "a 4-clique should yield cycles of more than one length");
}

#[test]
fn cycles_cap_of_one_stops_after_first_cycle() {
    let graph = build_graph(&four_clique());
    let keep = prune_non_cyclic(&graph);
    let scc_result = find_sccs(&graph, &keep, &Deadline::from_millis(5_000), 1_000);
    let sccs = filter_cyclic_sccs(scc_result.sccs);

    let mut cfg = default_cfg();
    cfg.cycles_cap = 1;
    let result = enumerate_cycles(&graph, &sccs[0], &Deadline::from_millis(5_000), &cfg);
    assert_eq!(result.cycles.len(), 1);
}

#[test]
fn no_duplicate_canonical_cycles_are_emitted() {
    let graph = build_graph(&four_clique());
    let keep = prune_non_cyclic(&graph);
    let scc_result = find_sccs(&graph, &keep, &Deadline::from_millis(5_000), 1_000);
    let sccs = filter_cyclic_sccs(scc_result.sccs);
    let result = enumerate_cycles(&graph, &sccs[0], &Deadline::from_millis(5_000), &default_cfg());

    let mut keys = std::collections::HashSet::new();
    for cycle in &result.cycles {
        let key = loop_engine_core::canonical::canonical_vertex_key(cycle);
        assert!(keys.insert(key), "enumerator must never emit two cycles with the same canonical key");
    }
}
