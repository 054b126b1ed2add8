//! Elementary-cycle enumerator: bounded DFS over one SCC, canonical-start
//! to suppress rotations, canonical-key check to suppress reversals, all
//! under a deadline and a cycle cap.

use crate::canonical::canonical_vertex_key;
use crate::graph::{VertexId, WantsGraph};
use crate::time::Deadline;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Copy)]
pub struct EnumeratorConfig {
    pub max_depth: usize,
    pub cycles_cap: usize,
    pub cycles_cap_dense: usize,
    pub dense_density_threshold: f64,
    pub dense_avg_out_degree_threshold: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EnumerationResult {
    /// Each cycle in open form: `[w_0, ..., w_{k-1}]`, closing edge implicit.
    pub cycles: Vec<Vec<VertexId>>,
    pub permutations_eliminated: usize,
    pub timed_out: bool,
}

/// Whether an SCC counts as "dense" for the purposes of the reduced cycle
/// cap: edge density above a threshold, or average out-degree above a
/// threshold, computed over the SCC's induced edge count alone.
fn is_dense(graph: &WantsGraph, scc: &BTreeSet<VertexId>, cfg: &EnumeratorConfig) -> bool {
    let n = scc.len();
    if n < 2 {
        return false;
    }
    let edges: usize = scc
        .iter()
        .map(|&v| graph.out_neighbors(v).filter(|w| scc.contains(w)).count())
        .sum();
    let max_possible = n * (n - 1);
    let density = edges as f64 / max_possible as f64;
    let avg_out_degree = edges as f64 / n as f64;
    density > cfg.dense_density_threshold || avg_out_degree > cfg.dense_avg_out_degree_threshold
}

/// Enumerates elementary cycles within one SCC (`scc` need not equal all
/// of `graph`'s vertices when `graph` is the whole wants-graph rather than
/// an already-induced subgraph).
pub fn enumerate_cycles(graph: &WantsGraph, scc: &[VertexId], deadline: &Deadline, cfg: &EnumeratorConfig) -> EnumerationResult {
    if scc.len() < 2 {
        return EnumerationResult::default();
    }
    let scc_set: BTreeSet<VertexId> = scc.iter().copied().collect();
    let cap = if is_dense(graph, &scc_set, cfg) {
        cfg.cycles_cap_dense
    } else {
        cfg.cycles_cap
    };

    // The unique starting point is the lexicographically smallest wallet.
    // `VertexId` order matches `WalletId` order by construction (see
    // `graph::build_graph`), so `min()` here is exactly that wallet.
    let start = *scc.iter().min().expect("scc is non-empty");

    let mut dfs = Dfs {
        graph,
        scc: &scc_set,
        start,
        max_depth: cfg.max_depth,
        cap,
        deadline,
        path: Vec::with_capacity(cfg.max_depth),
        visited: vec![false; graph.vertex_count()],
        seen_keys: HashSet::new(),
        result: EnumerationResult::default(),
    };
    dfs.run();
    dfs.result
}

struct Dfs<'a> {
    graph: &'a WantsGraph,
    scc: &'a BTreeSet<VertexId>,
    start: VertexId,
    max_depth: usize,
    cap: usize,
    deadline: &'a Deadline,
    path: Vec<VertexId>,
    visited: Vec<bool>,
    seen_keys: HashSet<Vec<VertexId>>,
    result: EnumerationResult,
}

impl<'a> Dfs<'a> {
    fn run(&mut self) {
        self.path.push(self.start);
        self.visited[self.start.0 as usize] = true;
        self.step();
        self.visited[self.start.0 as usize] = false;
        self.path.pop();
    }

    fn step(&mut self) {
        // Termination guards, checked before doing any more work.
        if self.result.timed_out || self.result.cycles.len() >= self.cap {
            return;
        }
        if self.deadline.is_expired() {
            self.result.timed_out = true;
            return;
        }

        let current = *self.path.last().expect("path always has the current vertex");
        let neighbors: Vec<VertexId> = self
            .graph
            .out_neighbors(current)
            .filter(|n| self.scc.contains(n))
            .collect();

        for next in neighbors {
            if self.result.timed_out || self.result.cycles.len() >= self.cap {
                return;
            }
            if self.deadline.is_expired() {
                self.result.timed_out = true;
                return;
            }

            if next == self.start && self.path.len() >= 2 {
                let key = canonical_vertex_key(&self.path);
                if self.seen_keys.insert(key) {
                    self.result.cycles.push(self.path.clone());
                } else {
                    self.result.permutations_eliminated += 1;
                }
            } else if !self.visited[next.0 as usize] && self.path.len() < self.max_depth {
                self.path.push(next);
                self.visited[next.0 as usize] = true;
                self.step();
                self.visited[next.0 as usize] = false;
                self.path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::model::{Item, Snapshot, Wallet};

    fn default_cfg() -> EnumeratorConfig {
        EnumeratorConfig {
            max_depth: 10,
            cycles_cap: 10_000,
            cycles_cap_dense: 500,
            dense_density_threshold: 0.2,
            dense_avg_out_degree_threshold: 5.0,
        }
    }

    fn three_cycle() -> WantsGraph {
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
        build_graph(&snap)
    }

    #[test]
    fn finds_exactly_one_three_cycle() {
        let graph = three_cycle();
        let scc: Vec<VertexId> = graph.vertices().collect();
        let result = enumerate_cycles(&graph, &scc, &Deadline::from_millis(1_000), &default_cfg());
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].len(), 3);
    }

    #[test]
    fn max_depth_two_excludes_longer_cycle() {
        let graph = three_cycle();
        let scc: Vec<VertexId> = graph.vertices().collect();
        let mut cfg = default_cfg();
        cfg.max_depth = 2;
        let result = enumerate_cycles(&graph, &scc, &Deadline::from_millis(1_000), &cfg);
        assert!(result.cycles.is_empty(), "a 3-cycle must not be returned when max_depth=2");
    }

    #[test]
    fn deadline_produces_partial_well_formed_results() {
        let graph = three_cycle();
        let scc: Vec<VertexId> = graph.vertices().collect();
        let expired = Deadline::from_millis(0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let result = enumerate_cycles(&graph, &scc, &expired, &default_cfg());
        assert!(result.timed_out);
        assert!(result.cycles.is_empty());
    }
}
