//! Loop store: keeps canonical loops by id, supports lookup /
//! invalidation / per-wallet query, with LRU-by-last-access eviction
//! beyond `max_cache_entries`. The store is guarded by per-tenant mutual
//! exclusion: one writer at a time, concurrent readers.

use crate::model::TradeLoop;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry {
    loop_: TradeLoop,
    last_access: Instant,
    inserted_at: Instant,
}

struct TenantStore {
    entries: HashMap<String, Entry>,
    /// Index from wallet id to the set of loop ids it participates in, for
    /// `loops_for_wallet` without scanning every entry.
    by_wallet: HashMap<String, Vec<String>>,
}

impl TenantStore {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_wallet: HashMap::new(),
        }
    }
}

/// Per-tenant collection of loop stores, each independently capped and
/// evicted.
pub struct LoopStore {
    tenants: RwLock<HashMap<String, RwLock<TenantStore>>>,
    max_cache_entries: usize,
    cache_ttl: Duration,
    extended_cache_ttl: Duration,
}

impl LoopStore {
    pub fn new(max_cache_entries: usize, cache_ttl_ms: u64, extended_cache_ttl_ms: u64) -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
            max_cache_entries,
            cache_ttl: Duration::from_millis(cache_ttl_ms),
            extended_cache_ttl: Duration::from_millis(extended_cache_ttl_ms),
        }
    }

    fn with_tenant<R>(&self, tenant: &str, f: impl FnOnce(&mut TenantStore) -> R) -> R {
        {
            let tenants = self.tenants.read().expect("tenants lock poisoned");
            if let Some(store) = tenants.get(tenant) {
                return f(&mut store.write().expect("tenant store lock poisoned"));
            }
        }
        let mut tenants = self.tenants.write().expect("tenants lock poisoned");
        let store = tenants.entry(tenant.to_string()).or_insert_with(|| RwLock::new(TenantStore::new()));
        f(&mut store.write().expect("tenant store lock poisoned"))
    }

    /// Inserts a newly discovered loop. Duplicates (id already present)
    /// are silently skipped. Returns `true` if this was a new insertion.
    pub fn insert(&self, tenant: &str, loop_: TradeLoop) -> bool {
        self.with_tenant(tenant, |store| {
            if store.entries.contains_key(&loop_.id) {
                return false;
            }
            let now = Instant::now();
            for wallet in loop_.wallet_sequence() {
                store.by_wallet.entry(wallet.to_string()).or_default().push(loop_.id.clone());
            }
            store.entries.insert(
                loop_.id.clone(),
                Entry {
                    loop_,
                    last_access: now,
                    inserted_at: now,
                },
            );
            evict_if_needed(store, self.max_cache_entries);
            true
        })
    }

    /// Removes `loop_id` and every per-wallet index entry pointing at it,
    /// returning the removed loop if present (for emitting
    /// `loop_invalidated`).
    pub fn invalidate(&self, tenant: &str, loop_id: &str) -> Option<TradeLoop> {
        self.with_tenant(tenant, |store| {
            let entry = store.entries.remove(loop_id)?;
            for wallet in entry.loop_.wallet_sequence() {
                if let Some(ids) = store.by_wallet.get_mut(wallet.as_str()) {
                    ids.retain(|id| id != loop_id);
                }
            }
            Some(entry.loop_)
        })
    }

    /// Loops for `wallet`, sorted by quality desc. Each lookup refreshes
    /// `last_access` for LRU purposes.
    pub fn loops_for_wallet(&self, tenant: &str, wallet: &str) -> Vec<TradeLoop> {
        self.with_tenant(tenant, |store| {
            let ids = store.by_wallet.get(wallet).cloned().unwrap_or_default();
            let now = Instant::now();
            let mut loops: Vec<TradeLoop> = ids
                .iter()
                .filter_map(|id| {
                    let entry = store.entries.get_mut(id)?;
                    entry.last_access = now;
                    Some(entry.loop_.clone())
                })
                .collect();
            loops.sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(std::cmp::Ordering::Equal));
            loops
        })
    }

    pub fn active_loop_count(&self, tenant: &str) -> usize {
        self.with_tenant(tenant, |store| store.entries.len())
    }

    /// All loops currently stored for `tenant`, in no particular order.
    /// Used by invalidation sweeps that must inspect every loop rather than
    /// only those touching one wallet (e.g. an item-removal event).
    pub fn all_loops(&self, tenant: &str) -> Vec<TradeLoop> {
        self.with_tenant(tenant, |store| store.entries.values().map(|e| e.loop_.clone()).collect())
    }

    /// Drops entries past their TTL, independent of the LRU size cap.
    /// An entry that has never been looked up since insertion (`last_access
    /// == inserted_at`) expires after `cache_ttl` counted from insertion.
    /// One that has been read at least once gets the longer
    /// `extended_cache_ttl`, counted from that last read, since an actively
    /// queried loop is more likely to still be wanted.
    pub fn evict_expired(&self, tenant: &str) {
        self.with_tenant(tenant, |store| {
            let now = Instant::now();
            let expired: Vec<String> = store
                .entries
                .iter()
                .filter(|(_, e)| {
                    if e.last_access == e.inserted_at {
                        now.duration_since(e.inserted_at) > self.cache_ttl
                    } else {
                        now.duration_since(e.last_access) > self.extended_cache_ttl
                    }
                })
                .map(|(id, _)| id.clone())
                .collect();
            for id in expired {
                if let Some(entry) = store.entries.remove(&id) {
                    for wallet in entry.loop_.wallet_sequence() {
                        if let Some(ids) = store.by_wallet.get_mut(wallet.as_str()) {
                            ids.retain(|existing| existing != &id);
                        }
                    }
                }
            }
        });
    }
}

/// LRU-by-last-access eviction beyond `max_cache_entries`.
fn evict_if_needed(store: &mut TenantStore, max_cache_entries: usize) {
    while store.entries.len() > max_cache_entries {
        let oldest_id = store
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(id, _)| id.clone());
        let Some(id) = oldest_id else { break };
        if let Some(entry) = store.entries.remove(&id) {
            for wallet in entry.loop_.wallet_sequence() {
                if let Some(ids) = store.by_wallet.get_mut(wallet.as_str()) {
                    ids.retain(|existing| existing != &id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample_loop(id: &str, quality: f64, wallets: &[&str]) -> TradeLoop {
        use crate::model::LoopStep;
        let steps = wallets
            .windows(2)
            .map(|pair| LoopStep {
                from: pair[0].into(),
                to: pair[1].into(),
                items: BTreeSet::from(["x".into()]),
            })
            .collect();
        TradeLoop {
            id: id.to_string(),
            steps,
            participants: wallets.len(),
            efficiency: 1.0,
            quality,
            estimated_value: 0.0,
            created_at: 0,
        }
    }

    #[test]
    fn duplicate_insert_is_silently_skipped() {
        let store = LoopStore::new(10, 60_000, 1_800_000);
        assert!(store.insert("t1", sample_loop("L1", 0.8, &["A", "B", "A"])));
        assert!(!store.insert("t1", sample_loop("L1", 0.9, &["A", "B", "A"])));
        assert_eq!(store.active_loop_count("t1"), 1);
    }

    #[test]
    fn loops_for_wallet_sorted_by_quality_desc() {
        let store = LoopStore::new(10, 60_000, 1_800_000);
        store.insert("t1", sample_loop("L1", 0.6, &["A", "B", "A"]));
        store.insert("t1", sample_loop("L2", 0.9, &["A", "C", "A"]));
        let loops = store.loops_for_wallet("t1", "A");
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].id, "L2");
    }

    #[test]
    fn lru_eviction_drops_least_recently_accessed_beyond_cap() {
        let store = LoopStore::new(1, 60_000, 1_800_000);
        store.insert("t1", sample_loop("L1", 0.5, &["A", "B", "A"]));
        store.insert("t1", sample_loop("L2", 0.5, &["C", "D", "C"]));
        assert_eq!(store.active_loop_count("t1"), 1);
    }

    #[test]
    fn invalidate_removes_loop_and_wallet_index() {
        let store = LoopStore::new(10, 60_000, 1_800_000);
        store.insert("t1", sample_loop("L1", 0.5, &["A", "B", "A"]));
        let removed = store.invalidate("t1", "L1");
        assert!(removed.is_some());
        assert!(store.loops_for_wallet("t1", "A").is_empty());
    }

    #[test]
    fn tenants_are_isolated() {
        let store = LoopStore::new(10, 60_000, 1_800_000);
        store.insert("t1", sample_loop("L1", 0.5, &["A", "B", "A"]));
        assert_eq!(store.active_loop_count("t2"), 0);
    }

    #[test]
    fn evict_expired_uses_the_base_ttl_for_never_reaccessed_entries() {
        let store = LoopStore::new(10, 0, 1_800_000);
        store.insert("t1", sample_loop("L1", 0.5, &["A", "B", "A"]));
        store.evict_expired("t1");
        assert_eq!(store.active_loop_count("t1"), 0);
    }

    #[test]
    fn evict_expired_grants_the_extended_ttl_to_reaccessed_entries() {
        let store = LoopStore::new(10, 0, 60_000);
        store.insert("t1", sample_loop("L1", 0.5, &["A", "B", "A"]));
        // refresh last_access so this entry is judged against extended_cache_ttl,
        // not the already-expired base cache_ttl
        store.loops_for_wallet("t1", "A");
        store.evict_expired("t1");
        assert_eq!(store.active_loop_count("t1"), 1);
    }
}
