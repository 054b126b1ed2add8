//! Community partitioner: Louvain-style modularity optimization on the
//! undirected projection of the wants-graph, bounding the `n` fed into
//! SCC/cycle work per partition.

use crate::graph::{VertexId, WantsGraph};
use crate::rng::Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub members: BTreeSet<VertexId>,
}

/// Edge weight = 1 per wants direction, summed for bidirectional pairs,
/// collapsed into an adjacency list over the union of both directions.
fn undirected_weights(graph: &WantsGraph) -> Vec<BTreeMap<VertexId, u32>> {
    let n = graph.vertex_count();
    let mut weights: Vec<BTreeMap<VertexId, u32>> = vec![BTreeMap::new(); n];
    for u in graph.vertices() {
        for v in graph.out_neighbors(u) {
            *weights[u.0 as usize].entry(v).or_insert(0) += 1;
        }
    }
    // fold directed weights into a symmetric undirected view
    let mut undirected = vec![BTreeMap::new(); n];
    for u in graph.vertices() {
        let u_idx = u.0 as usize;
        for (&v, &w) in &weights[u_idx] {
            *undirected[u_idx].entry(v).or_insert(0) += w;
            *undirected[v.0 as usize].entry(u).or_insert(0) += w;
        }
    }
    undirected
}

struct LouvainState {
    adjacency: Vec<BTreeMap<VertexId, u32>>,
    community_of: Vec<u32>,
    degree: Vec<u32>,
    community_degree: HashMap<u32, i64>,
    total_weight: f64,
}

impl LouvainState {
    fn new(adjacency: Vec<BTreeMap<VertexId, u32>>) -> Self {
        let n = adjacency.len();
        let degree: Vec<u32> = adjacency.iter().map(|m| m.values().sum()).collect();
        let mut community_degree = HashMap::new();
        for (i, &d) in degree.iter().enumerate() {
            community_degree.insert(i as u32, d as i64);
        }
        let total_weight: f64 = degree.iter().map(|&d| d as f64).sum::<f64>() / 2.0;
        Self {
            adjacency,
            community_of: (0..n as u32).collect(),
            degree,
            community_degree,
            total_weight: total_weight.max(1.0),
        }
    }

    /// Modularity gain from moving `v` (currently isolated from its old
    /// community's degree tally) into community `c`.
    fn gain(&self, v: VertexId, c: u32) -> f64 {
        let v_idx = v.0 as usize;
        let k_v = self.degree[v_idx] as f64;
        let sum_in: f64 = self.adjacency[v_idx]
            .iter()
            .filter(|(&n, _)| self.community_of[n.0 as usize] == c)
            .map(|(_, &w)| w as f64)
            .sum();
        let sigma_tot = *self.community_degree.get(&c).unwrap_or(&0) as f64;
        sum_in - (sigma_tot * k_v) / (2.0 * self.total_weight)
    }

    /// One local-moving pass: for each node, move it to the neighboring
    /// community yielding the greatest modularity gain. Returns whether
    /// any node moved.
    fn local_moving_pass(&mut self, order: &[VertexId]) -> bool {
        let mut moved_any = false;
        for &v in order {
            let v_idx = v.0 as usize;
            let old_c = self.community_of[v_idx];
            *self.community_degree.entry(old_c).or_insert(0) -= self.degree[v_idx] as i64;

            let mut candidates: BTreeSet<u32> = self.adjacency[v_idx]
                .keys()
                .map(|n| self.community_of[n.0 as usize])
                .collect();
            candidates.insert(old_c);

            let mut best_c = old_c;
            let mut best_gain = self.gain(v, old_c);
            for &c in &candidates {
                if c == old_c {
                    continue;
                }
                let g = self.gain(v, c);
                if g > best_gain {
                    best_gain = g;
                    best_c = c;
                }
            }

            self.community_of[v_idx] = best_c;
            *self.community_degree.entry(best_c).or_insert(0) += self.degree[v_idx] as i64;
            if best_c != old_c {
                moved_any = true;
            }
        }
        moved_any
    }
}

/// Splits `graph` into communities. Callers are expected to have already
/// applied the `|wallets| <= 10` skip guard (`should_partition`) before
/// calling this; it always runs the algorithm it's given.
pub fn partition(graph: &WantsGraph, max_community_size: usize, rng_seed: u64) -> Vec<Partition> {
    let n = graph.vertex_count();
    if n == 0 {
        return Vec::new();
    }
    let adjacency = undirected_weights(graph);
    let mut state = LouvainState::new(adjacency);

    let mut order: Vec<VertexId> = graph.vertices().collect();
    let mut rng = Rng::new(rng_seed);
    shuffle(&mut order, &mut rng);

    const MAX_HOPS: usize = 20;
    for _ in 0..MAX_HOPS {
        if !state.local_moving_pass(&order) {
            break;
        }
    }

    let mut by_community: BTreeMap<u32, BTreeSet<VertexId>> = BTreeMap::new();
    for v in graph.vertices() {
        by_community
            .entry(state.community_of[v.0 as usize])
            .or_default()
            .insert(v);
    }

    let mut result = Vec::new();
    for members in by_community.into_values() {
        if members.len() > max_community_size {
            result.extend(split_oversized(graph, &members, max_community_size, rng_seed));
        } else {
            result.push(Partition { members });
        }
    }
    result
}

/// Whether the `|wallets| <= 10` skip guard applies.
pub fn should_partition(wallet_count: usize) -> bool {
    wallet_count > 10
}

/// Recursively re-partitions a community that exceeds `max_community_size`
/// by running Louvain again on its induced subgraph. If a single
/// recursive pass cannot shrink it further (e.g. one dense blob), the
/// community is chunked deterministically by vertex id as a last resort
/// so the cap is still honored.
fn split_oversized(graph: &WantsGraph, members: &BTreeSet<VertexId>, max_community_size: usize, rng_seed: u64) -> Vec<Partition> {
    let sub = graph.induced_subgraph(members);
    let sub_partitions = partition(&sub, max_community_size, rng_seed.wrapping_add(1));

    if sub_partitions.len() <= 1 {
        return chunk_by_id(members, max_community_size);
    }

    // map sub-graph vertex ids back to the original graph's vertex ids via
    // wallet id (the only stable identity across a re-numbering).
    let mut by_wallet: BTreeMap<_, VertexId> = BTreeMap::new();
    for &v in members {
        by_wallet.insert(graph.wallet_of(v).clone(), v);
    }

    sub_partitions
        .into_iter()
        .map(|p| {
            let remapped: BTreeSet<VertexId> = p
                .members
                .iter()
                .map(|sv| by_wallet[sub.wallet_of(*sv)])
                .collect();
            Partition { members: remapped }
        })
        .collect()
}

fn chunk_by_id(members: &BTreeSet<VertexId>, max_size: usize) -> Vec<Partition> {
    let sorted: Vec<VertexId> = members.iter().copied().collect();
    sorted
        .chunks(max_size.max(1))
        .map(|chunk| Partition {
            members: chunk.iter().copied().collect(),
        })
        .collect()
}

fn shuffle(items: &mut [VertexId], rng: &mut Rng) {
    for i in (1..items.len()).rev() {
        let j = rng.below(i + 1);
        items.swap(i, j);
    }
}
