//! Integration coverage for the Louvain-style community partitioner.

use loop_engine_core::graph::build_graph;
use loop_engine_core::model::{Item, Snapshot, Wallet};
use loop_engine_core::partition::{partition, should_partition};
use std::collections::BTreeSet;

fn many_small_clusters(cluster_count: usize) -> Snapshot {
    let mut snap = Snapshot::new();
    for cluster in 0..cluster_count {
        let names: Vec<String> = (0..3).map(|i| format!("c{cluster}w{i}")).collect();
        for name in &names {
            snap.insert_wallet(Wallet::new(name.as_str()));
        }
        for i in 0..3 {
            let wanter = &names[i];
            let item_owner = &names[(i + 1) % 3];
            let item_id = format!("{item_owner}-item");
            snap.wallets.get_mut(&wanter.as_str().into()).unwrap().wanted_items.insert(item_id.as_str().into());
        }
        for name in &names {
            snap.insert_item(Item::new(format!("{name}-item").as_str(), name.as_str()));
        }
    }
    snap
}

#[test]
fn small_graphs_skip_partitioning_per_guard() {
    assert!(!should_partition(10));
    assert!(!should_partition(5));
    assert!(should_partition(11));
}

#[test]
fn every_wallet_lands_in_exactly_one_partition_across_many_clusters() {
    let snap = many_small_clusters(8);
    let graph = build_graph(&snap);
    let parts = partition(&graph, 50, 7);

    let mut seen = BTreeSet::new();
    for p in &parts {
        for &v in &p.members {
            assert!(seen.insert(v));
        }
    }
    assert_eq!(seen.len(), graph.vertex_count());
}

#[test]
fn oversized_partitions_are_recursively_split_under_a_tight_cap() {
    let snap = many_small_clusters(20); // 60 wallets, all tightly clustered
    let graph = build_graph(&snap);
    let parts = partition(&graph, 5, 3);
    for p in &parts {
        assert!(p.members.len() <= 5, "every partition must respect max_community_size even after recursive splitting");
    }
}

#[test]
fn partitioning_is_deterministic_for_a_fixed_seed() {
    let snap = many_small_clusters(6);
    let graph = build_graph(&snap);
    let a = partition(&graph, 50, 42);
    let b = partition(&graph, 50, 42);

    let to_sets = |parts: &[loop_engine_core::partition::Partition]| -> BTreeSet<Vec<u32>> {
        parts.iter().map(|p| p.members.iter().map(|v| v.0).collect()).collect()
    };
    assert_eq!(to_sets(&a), to_sets(&b));
}
