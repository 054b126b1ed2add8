//! Top-level orchestration: wires the graph builder, partitioner, SCC
//! finder, cycle enumerator, canonical keys, deduplicator, and scorer
//! into full-graph discovery, and the delta front-end into incremental
//! discovery, with results persisted through the loop store.

use crate::config::DiscoveryConfig;
use crate::delta::{compute_affected_subgraph, loop_references_removed_entity, ChangeEvent};
use crate::error::DiscoveryError;
use crate::events::{DiscoveryEvent, EventSink, Trigger};
use crate::graph::build_graph;
use crate::model::{Snapshot, TradeLoop};
use crate::partition::{partition, should_partition, Partition};
use crate::scheduler::schedule;
use crate::store::LoopStore;
use crate::time::Deadline;
use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct DiscoveryStats {
    pub scc_ms: u64,
    pub cycle_ms: u64,
    pub dedup_ms: u64,
    pub cycles_found: usize,
    pub permutations_eliminated: usize,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub loops: Vec<TradeLoop>,
    pub stats: DiscoveryStats,
}

/// Owns the loop store and per-tenant delta mutual exclusion. One instance
/// typically lives for the lifetime of a tenant-serving process;
/// `discover` itself is stateless aside from this.
pub struct DiscoveryEngine {
    store: LoopStore,
    delta_locks: Mutex<std::collections::HashMap<String, std::sync::Arc<Mutex<()>>>>,
}

impl DiscoveryEngine {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            store: LoopStore::new(config.max_cache_entries, config.cache_ttl_ms, config.extended_cache_ttl_ms),
            delta_locks: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn tenant_lock(&self, tenant: &str) -> std::sync::Arc<Mutex<()>> {
        let mut locks = self.delta_locks.lock().expect("delta locks mutex poisoned");
        locks
            .entry(tenant.to_string())
            .or_insert_with(|| std::sync::Arc::new(Mutex::new(())))
            .clone()
    }

    /// Full-graph discovery.
    pub fn discover(&self, snapshot: &Snapshot, config: &DiscoveryConfig) -> DiscoveryResult {
        let deadline = Deadline::from_millis(config.timeout_ms);
        let start = std::time::Instant::now();
        let graph = build_graph(snapshot);

        let partitions = if config.enable_partitioner && should_partition(snapshot.wallets.len()) {
            partition(&graph, config.max_community_size, config.rng_seed)
        } else {
            vec![Partition {
                members: graph.vertices().collect(),
            }]
        };

        let (loops, sched_stats) = schedule(&graph, partitions, snapshot, config, &deadline);

        info!(
            loops_found = loops.len(),
            cycles_found = sched_stats.cycles_found,
            timed_out = sched_stats.timed_out,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "full discovery complete"
        );

        DiscoveryResult {
            loops,
            stats: DiscoveryStats {
                scc_ms: sched_stats.scc_ms,
                cycle_ms: sched_stats.cycle_ms,
                dedup_ms: sched_stats.dedup_ms,
                cycles_found: sched_stats.cycles_found,
                permutations_eliminated: sched_stats.permutations_eliminated,
                timed_out: sched_stats.timed_out,
            },
        }
    }

    /// Runs discovery restricted to the affected subgraph for `event`,
    /// stores newly discovered loops, and emits `loop_discovered` for
    /// each. Serialized per tenant.
    fn run_delta_discovery(
        &self,
        tenant: &str,
        snapshot: &Snapshot,
        event: ChangeEvent,
        trigger: Trigger,
        config: &DiscoveryConfig,
        sink: &dyn EventSink,
    ) -> Result<Vec<TradeLoop>, DiscoveryError> {
        let lock = self.tenant_lock(tenant);
        let _guard = lock.lock().expect("per-tenant delta lock poisoned");

        self.store.evict_expired(tenant);

        let deadline = Deadline::from_millis(config.timeout_ms);
        let sub_graph = compute_affected_subgraph(snapshot, &event, config.max_depth)?;
        let partitions = vec![Partition {
            members: sub_graph.vertices().collect(),
        }];
        let (loops, _stats) = schedule(&sub_graph, partitions, snapshot, config, &deadline);

        let mut newly_discovered = Vec::new();
        for loop_ in loops {
            if self.store.insert(tenant, loop_.clone()) {
                sink.emit(DiscoveryEvent::LoopDiscovered {
                    tenant: tenant.to_string(),
                    loop_: loop_.clone(),
                    trigger,
                });
                newly_discovered.push(loop_);
            }
        }
        Ok(newly_discovered)
    }

    pub fn on_item_added(&self, tenant: &str, snapshot: &Snapshot, item: crate::model::ItemId, owner: crate::model::WalletId, config: &DiscoveryConfig, sink: &dyn EventSink) -> Result<Vec<TradeLoop>, DiscoveryError> {
        self.run_delta_discovery(tenant, snapshot, ChangeEvent::ItemAdded { item, owner }, Trigger::ItemAdded, config, sink)
    }

    pub fn on_want_added(&self, tenant: &str, snapshot: &Snapshot, wallet: crate::model::WalletId, item: crate::model::ItemId, config: &DiscoveryConfig, sink: &dyn EventSink) -> Result<Vec<TradeLoop>, DiscoveryError> {
        self.run_delta_discovery(tenant, snapshot, ChangeEvent::WantAdded { wallet, item }, Trigger::WantAdded, config, sink)
    }

    /// Invalidates every stored loop referencing the removed item,
    /// emitting `loop_invalidated` for each.
    pub fn on_item_removed(&self, tenant: &str, item: crate::model::ItemId, sink: &dyn EventSink) {
        self.invalidate_referencing(tenant, ChangeEvent::ItemRemoved { item }, sink);
    }

    pub fn on_want_removed(&self, tenant: &str, wallet: crate::model::WalletId, item: crate::model::ItemId, sink: &dyn EventSink) {
        self.invalidate_referencing(tenant, ChangeEvent::WantRemoved { wallet, item }, sink);
    }

    fn invalidate_referencing(&self, tenant: &str, event: ChangeEvent, sink: &dyn EventSink) {
        let lock = self.tenant_lock(tenant);
        let _guard = lock.lock().expect("per-tenant delta lock poisoned");

        self.store.evict_expired(tenant);

        let wallets: BTreeSet<String> = match &event {
            ChangeEvent::WantRemoved { wallet, .. } => BTreeSet::from([wallet.to_string()]),
            _ => BTreeSet::new(),
        };
        let candidate_ids: BTreeSet<String> = if wallets.is_empty() {
            // item-removal events have no single wallet filter to start
            // from; every stored loop must be checked.
            self.store.all_loops(tenant).into_iter().map(|l| l.id).collect()
        } else {
            wallets
                .iter()
                .flat_map(|w| self.store.loops_for_wallet(tenant, w))
                .map(|l| l.id)
                .collect()
        };

        for loop_id in candidate_ids {
            if let Some(loop_) = self.store.invalidate(tenant, &loop_id) {
                let wallet_seq = loop_.wallet_sequence();
                let items = loop_.all_items();
                if loop_references_removed_entity(&wallet_seq, &items, &event) {
                    sink.emit(DiscoveryEvent::LoopInvalidated {
                        tenant: tenant.to_string(),
                        loop_id: loop_.id.clone(),
                        reason: match &event {
                            ChangeEvent::ItemRemoved { .. } => "item_removed".to_string(),
                            ChangeEvent::WantRemoved { .. } => "want_removed".to_string(),
                            _ => unreachable!(),
                        },
                    });
                } else {
                    // not actually affected; re-insert since we removed it
                    // only to inspect it under the per-tenant lock.
                    self.store.insert(tenant, loop_);
                }
            }
        }
    }

    pub fn loops_for_wallet(&self, tenant: &str, wallet: &str) -> Vec<TradeLoop> {
        self.store.loops_for_wallet(tenant, wallet)
    }

    pub fn active_loop_count(&self, tenant: &str) -> usize {
        self.store.active_loop_count(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
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
    fn discover_finds_the_three_party_loop() {
        let snap = three_cycle_snapshot();
        let config = DiscoveryConfig::default();
        let engine = DiscoveryEngine::new(&config);
        let result = engine.discover(&snap, &config);
        assert_eq!(result.loops.len(), 1);
        assert_eq!(result.loops[0].participants, 3);
    }

    #[test]
    fn on_want_added_discovers_and_stores_a_new_loop() {
        let snap = three_cycle_snapshot();
        let config = DiscoveryConfig::default();
        let engine = DiscoveryEngine::new(&config);
        let sink = RecordingSink::new();
        let found = engine
            .on_want_added(
                "tenant-1",
                &snap,
                "A".into(),
                "c".into(),
                &config,
                &sink,
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(engine.active_loop_count("tenant-1"), 1);
        assert_eq!(sink.take().len(), 1);
    }

    #[test]
    fn on_item_removed_invalidates_dependent_loops() {
        let snap = three_cycle_snapshot();
        let config = DiscoveryConfig::default();
        let engine = DiscoveryEngine::new(&config);
        let sink = RecordingSink::new();
        engine.on_want_added("tenant-1", &snap, "A".into(), "c".into(), &config, &sink).unwrap();
        assert_eq!(engine.active_loop_count("tenant-1"), 1);

        engine.on_item_removed("tenant-1", "a".into(), &sink);
        assert_eq!(engine.active_loop_count("tenant-1"), 0);
    }
}
