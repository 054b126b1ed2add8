//! Discovery configuration, `Default` matching the documented defaults,
//! `Serialize`/`Deserialize` so it can be configured from the outside the
//! same way `LsmConfig` / `OrchestratorConfig` are.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Max participants in a loop.
    pub max_depth: usize,
    /// Loops below this efficiency are discarded before scoring.
    pub min_efficiency: f64,
    /// Cap on returned loops.
    pub max_results: usize,
    /// Global deadline per discovery call, in milliseconds.
    pub timeout_ms: u64,
    /// Soft deadline for the SCC phase, in milliseconds. Zero means no
    /// independent soft deadline for this phase; it still inherits the
    /// global deadline.
    pub scc_timeout_ms: u64,
    /// Max cycles total across the enumerator.
    pub cycles_cap: usize,
    /// Replacement cap used for dense SCCs.
    pub cycles_cap_dense: usize,
    /// Edge-density threshold above which an SCC is treated as dense.
    pub dense_density_threshold: f64,
    /// Average out-degree threshold above which an SCC is treated as dense.
    pub dense_avg_out_degree_threshold: f64,
    /// Partitioner cap on community size.
    pub max_community_size: usize,
    /// Bounded concurrency for the scheduler.
    pub parallel_workers: usize,
    /// Enable community partitioning (auto-disabled below the guard size
    /// regardless of this flag).
    pub enable_partitioner: bool,
    /// Wallet count at or below which partitioning is skipped entirely.
    pub partitioner_skip_below: usize,
    /// Enable the bloom-style cross-partition pre-check.
    pub enable_probabilistic_dedup: bool,
    pub bloom_capacity: usize,
    pub bloom_fp_rate: f64,
    /// Loop store cap; eviction is LRU-by-last-access beyond this.
    pub max_cache_entries: usize,
    pub cache_ttl_ms: u64,
    pub extended_cache_ttl_ms: u64,
    /// Seed nodes processed per batch in the SCC phase before the next
    /// deadline check. Purely a throughput knob; never affects which SCCs
    /// are found.
    pub scc_batch_size: usize,
    /// How many processed partitions elapse between progress log lines.
    pub log_progress_every: usize,
    /// Deterministic seed for the partitioner's tie-break perturbation.
    pub rng_seed: u64,
    /// When true (default), a step may carry every valid candidate item
    /// between the same two wallets (a "bundle") rather than only the
    /// single minimum-id representative. Both choices are deterministic
    /// and produce a reproducible loop id.
    pub enable_bundles: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_efficiency: 0.6,
            max_results: 100,
            timeout_ms: 30_000,
            scc_timeout_ms: 30_000,
            cycles_cap: 10_000,
            cycles_cap_dense: 500,
            dense_density_threshold: 0.2,
            dense_avg_out_degree_threshold: 5.0,
            max_community_size: 50,
            parallel_workers: default_parallel_workers(),
            enable_partitioner: true,
            partitioner_skip_below: 10,
            enable_probabilistic_dedup: true,
            bloom_capacity: 100_000,
            bloom_fp_rate: 0.01,
            max_cache_entries: 1_000,
            cache_ttl_ms: 300_000,
            extended_cache_ttl_ms: 1_800_000,
            scc_batch_size: 1_000,
            log_progress_every: 50,
            rng_seed: 0x5EED,
            enable_bundles: true,
        }
    }
}

fn default_parallel_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let c = DiscoveryConfig::default();
        assert_eq!(c.max_depth, 10);
        assert_eq!(c.max_results, 100);
        assert_eq!(c.timeout_ms, 30_000);
        assert_eq!(c.cycles_cap, 10_000);
        assert_eq!(c.max_community_size, 50);
        assert_eq!(c.bloom_capacity, 100_000);
        assert!((c.min_efficiency - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn round_trips_through_json() {
        let c = DiscoveryConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let back: DiscoveryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
