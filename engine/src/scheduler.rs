//! Scheduler & budgets: dispatches partitions in bounded-concurrency
//! batches under a global deadline, via `std::thread::scope` rather than
//! an async runtime. The core is parallel-worker with cooperative
//! yielding at deadline checkpoints, not event-loop based.

use crate::canonical::{canonical_key, canonical_vertex_key};
use crate::config::DiscoveryConfig;
use crate::cycles::{enumerate_cycles, EnumeratorConfig};
use crate::dedup::Deduplicator;
use crate::graph::{VertexId, WantsGraph};
use crate::loops::construct_loop;
use crate::model::{ActivityTier, Snapshot, TradeLoop, WalletId};
use crate::partition::Partition;
use crate::scc::{filter_cyclic_sccs, find_sccs, prune_non_cyclic};
use crate::scorer::score;
use crate::time::Deadline;
use std::collections::BTreeSet;
use std::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct WorkerOutcome {
    pub loops: Vec<TradeLoop>,
    pub cycles_found: usize,
    pub permutations_eliminated: usize,
    pub timed_out: bool,
    pub scc_ms: u64,
    pub cycle_ms: u64,
    pub dedup_ms: u64,
}

/// A partition's priority inputs: item-diversity, size-optimality
/// (bell-curve centered near 30), connection density, new-user ratio.
fn priority_score(graph: &WantsGraph, partition: &Partition, snapshot: &Snapshot) -> f64 {
    let members = &partition.members;
    let n = members.len().max(1) as f64;

    let mut collections = BTreeSet::new();
    let mut new_user_count = 0usize;
    let mut owned_count = 0usize;
    for &v in members {
        let wallet_id = graph.wallet_of(v);
        if let Some(wallet) = snapshot.wallets.get(wallet_id) {
            owned_count += wallet.owned.len();
            for item_id in &wallet.owned {
                if let Some(item) = snapshot.items.get(item_id) {
                    if let Some(c) = &item.collection {
                        collections.insert(c.clone());
                    }
                }
            }
            if matches!(wallet.activity, Some(ActivityTier::New)) {
                new_user_count += 1;
            }
        }
    }
    let item_diversity = if owned_count == 0 { 0.0 } else { collections.len() as f64 / owned_count as f64 };

    // bell curve centered at 30, width chosen so partitions within ~15 of
    // the target still score reasonably; pure heuristic, no correctness
    // implication either way.
    let size_optimality = (-((n - 30.0).powi(2)) / (2.0 * 15.0 * 15.0)).exp();

    let possible_edges = (members.len() * members.len().saturating_sub(1)).max(1) as f64;
    let internal_edges: usize = members
        .iter()
        .map(|&v| graph.out_neighbors(v).filter(|w| members.contains(w)).count())
        .sum();
    let density = internal_edges as f64 / possible_edges;

    let new_user_ratio = new_user_count as f64 / n;

    0.25 * item_diversity + 0.25 * size_optimality + 0.25 * density + 0.25 * new_user_ratio
}

fn user_category(graph: &WantsGraph, partition: &Partition, snapshot: &Snapshot) -> Option<ActivityTier> {
    partition
        .members
        .iter()
        .find_map(|&v| snapshot.wallets.get(graph.wallet_of(v)).and_then(|w| w.activity))
}

/// Runs one partition through SCC decomposition, cycle enumeration,
/// canonical dedup, and scoring, and returns the scored loops it
/// produced.
fn run_partition(
    full_graph: &WantsGraph,
    partition: &Partition,
    snapshot: &Snapshot,
    config: &DiscoveryConfig,
    deadline: &Deadline,
    global_dedup: &Mutex<Deduplicator>,
) -> WorkerOutcome {
    let sub_graph = full_graph.induced_subgraph(&partition.members);
    let scc_deadline = if config.scc_timeout_ms == 0 {
        Deadline::never()
    } else {
        deadline.sub_deadline(config.scc_timeout_ms)
    };
    let keep = prune_non_cyclic(&sub_graph);
    let scc_result = find_sccs(&sub_graph, &keep, &scc_deadline, config.scc_batch_size);
    let sccs = filter_cyclic_sccs(scc_result.sccs);

    let enumerator_cfg = EnumeratorConfig {
        max_depth: config.max_depth,
        cycles_cap: config.cycles_cap,
        cycles_cap_dense: config.cycles_cap_dense,
        dense_density_threshold: config.dense_density_threshold,
        dense_avg_out_degree_threshold: config.dense_avg_out_degree_threshold,
    };

    let mut outcome = WorkerOutcome {
        timed_out: scc_result.metadata.timed_out,
        scc_ms: scc_result.metadata.elapsed_ms,
        ..Default::default()
    };

    for scc in &sccs {
        if deadline.is_expired() {
            outcome.timed_out = true;
            break;
        }
        let per_scc_deadline = deadline.sub_deadline(config.timeout_ms);
        let cycle_start = std::time::Instant::now();
        let enumeration = enumerate_cycles(&sub_graph, scc, &per_scc_deadline, &enumerator_cfg);
        outcome.cycle_ms += cycle_start.elapsed().as_millis() as u64;
        outcome.cycles_found += enumeration.cycles.len();
        outcome.permutations_eliminated += enumeration.permutations_eliminated;
        outcome.timed_out |= enumeration.timed_out;

        for cycle in &enumeration.cycles {
            let dedup_start = std::time::Instant::now();
            let wallets: Vec<VertexId> = cycle.clone();
            let Some(trade) = construct_loop(
                &sub_graph,
                &wallets,
                snapshot,
                config.enable_bundles,
                1.0,
                0.0,
                0.0,
                0,
            ) else {
                outcome.dedup_ms += dedup_start.elapsed().as_millis() as u64;
                continue;
            };

            let canonical_wallets: Vec<WalletId> = canonical_vertex_key(cycle)
                .into_iter()
                .map(|v| sub_graph.wallet_of(v).clone())
                .collect();
            let items = trade.all_items().into_iter().cloned().collect();
            let key = canonical_key(&canonical_wallets, &items);

            let is_new = {
                let mut dedup = global_dedup.lock().expect("dedup mutex poisoned");
                dedup.record(key)
            };
            if !is_new {
                outcome.dedup_ms += dedup_start.elapsed().as_millis() as u64;
                continue;
            }

            let Some(quality) = score(&trade, snapshot, config.min_efficiency) else {
                outcome.dedup_ms += dedup_start.elapsed().as_millis() as u64;
                continue;
            };
            let mut scored = trade;
            scored.quality = quality;
            outcome.loops.push(scored);
            outcome.dedup_ms += dedup_start.elapsed().as_millis() as u64;
        }
    }

    outcome
}

#[derive(Debug, Default)]
pub struct ScheduleStats {
    pub partitions_processed: usize,
    pub cycles_found: usize,
    pub permutations_eliminated: usize,
    pub timed_out: bool,
    pub scc_ms: u64,
    pub cycle_ms: u64,
    pub dedup_ms: u64,
}

/// Adaptive concurrency: reduce effective worker count by fixed
/// multipliers once host pressure (approximated here by queue backlog
/// relative to worker count, in the absence of a host metrics dependency)
/// crosses 60%/80% thresholds. Never below 1.
fn adaptive_concurrency(base: usize, pressure: f64) -> usize {
    let reduced = if pressure >= 0.8 {
        (base as f64 * 0.5).floor() as usize
    } else if pressure >= 0.6 {
        (base as f64 * 0.75).floor() as usize
    } else {
        base
    };
    reduced.max(1)
}

/// Runs all `partitions` under the shared global deadline, honoring
/// bounded concurrency, community prioritization, and the early-stop
/// policy.
pub fn schedule(
    full_graph: &WantsGraph,
    partitions: Vec<Partition>,
    snapshot: &Snapshot,
    config: &DiscoveryConfig,
    deadline: &Deadline,
) -> (Vec<TradeLoop>, ScheduleStats) {
    let mut ordered = partitions;
    ordered.sort_by(|a, b| {
        priority_score(full_graph, b, snapshot)
            .partial_cmp(&priority_score(full_graph, a, snapshot))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let global_dedup = Mutex::new(Deduplicator::new(
        config.enable_probabilistic_dedup,
        config.bloom_capacity,
        config.bloom_fp_rate,
    ));
    let results: RwLock<Vec<TradeLoop>> = RwLock::new(Vec::new());
    let stats = Mutex::new(ScheduleStats::default());
    let categories_seen: Mutex<BTreeSet<&'static str>> = Mutex::new(BTreeSet::new());

    let mut remaining = ordered.as_slice();
    while !remaining.is_empty() {
        if deadline.is_expired() {
            stats.lock().expect("stats mutex poisoned").timed_out = true;
            break;
        }

        let pressure = estimate_pressure();
        let batch_size = adaptive_concurrency(config.parallel_workers, pressure).min(remaining.len());
        let (batch, rest) = remaining.split_at(batch_size);
        remaining = rest;

        std::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|p| {
                    scope.spawn(|| run_partition(full_graph, p, snapshot, config, deadline, &global_dedup))
                })
                .collect();
            for handle in handles {
                let outcome = handle.join().expect("worker thread panicked");
                let mut s = stats.lock().expect("stats mutex poisoned");
                s.partitions_processed += 1;
                s.cycles_found += outcome.cycles_found;
                s.permutations_eliminated += outcome.permutations_eliminated;
                s.timed_out |= outcome.timed_out;
                s.scc_ms += outcome.scc_ms;
                s.cycle_ms += outcome.cycle_ms;
                s.dedup_ms += outcome.dedup_ms;
                drop(s);
                results.write().expect("results lock poisoned").extend(outcome.loops);
            }
        });

        for p in batch {
            if let Some(tier) = user_category(full_graph, p, snapshot) {
                categories_seen.lock().expect("poisoned").insert(match tier {
                    ActivityTier::New => "new",
                    ActivityTier::Standard => "standard",
                    ActivityTier::Power => "power",
                });
            }
        }

        let total_so_far = results.read().expect("results lock poisoned").len();
        let all_categories = categories_seen.lock().expect("poisoned").len() >= 3;
        let thirty_percent_of_cap = (config.max_results as f64 * 0.3).ceil() as usize;
        if total_so_far >= config.max_results {
            debug!(total_so_far, "scheduler early-stop: result cap reached");
            break;
        }
        if all_categories && total_so_far >= thirty_percent_of_cap {
            debug!(total_so_far, "scheduler early-stop: category coverage + 30% cap met");
            break;
        }
    }

    let mut loops = results.into_inner().expect("results lock poisoned");
    loops.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    loops.truncate(config.max_results);

    (loops, stats.into_inner().expect("stats mutex poisoned"))
}

/// Placeholder host-pressure sample. No host-metrics dependency is part of
/// the ambient stack, so this always reports no pressure; `parallel_workers`
/// alone still bounds concurrency per batch.
fn estimate_pressure() -> f64 {
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::model::{Item, Wallet};

    fn three_cycle_snapshot() -> Snapshot {
        let mut snap = Snapshot::new();
        let mut a = Wallet::new("A");
        a.wanted_items.insert("c".into());
        let mut b = Wallet::new("B");
        b.wanted_items.insert("a".into());
        let mut c = Wallet::new("C");
        c.wanted_items.insert("b".into());
        snap.insert_wallet(a);
        snap.insert_wallet(b);
        snap.insert_wallet(c);
        snap.insert_item(Item::new("a", "A"));
        snap.insert_item(Item::new("b", "B"));
        snap.insert_item(Item::new("c", "C"));
        snap
    }

    #[test]
    fn schedules_single_partition_and_finds_the_loop() {
        let snap = three_cycle_snapshot();
        let graph = build_graph(&snap);
        let all: BTreeSet<VertexId> = graph.vertices().collect();
        let partitions = vec![Partition { members: all }];
        let config = DiscoveryConfig::default();
        let deadline = Deadline::from_millis(5_000);
        let (loops, stats) = schedule(&graph, partitions, &snap, &config, &deadline);
        assert_eq!(loops.len(), 1);
        assert_eq!(stats.partitions_processed, 1);
        assert!(!stats.timed_out);
    }

    #[test]
    fn adaptive_concurrency_never_drops_below_one() {
        assert_eq!(adaptive_concurrency(1, 0.95), 1);
        assert_eq!(adaptive_concurrency(4, 0.9), 2);
    }
}
