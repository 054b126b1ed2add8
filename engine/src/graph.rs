//! Wants-graph model and builder.
//!
//! Vertices are wallets, densely indexed by [`VertexId`] (a small `u32`)
//! rather than kept behind a nested string-keyed map. A side table
//! (`vertex_to_wallet` / `wallet_to_vertex`) is the only place the opaque
//! string [`WalletId`] ever appears once the graph is built.

use crate::error::GraphError;
use crate::model::{ItemId, Snapshot, WalletId};
use std::collections::{BTreeMap, BTreeSet};

/// Dense vertex index into [`WantsGraph`]. Cheap to copy, cheap to sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(pub u32);

/// The materialized wants-graph: `out_edges[u][v]` is the non-empty set of
/// items `u` owns that `v` wants, honoring rejections.
#[derive(Debug, Clone)]
pub struct WantsGraph {
    vertex_to_wallet: Vec<WalletId>,
    wallet_to_vertex: BTreeMap<WalletId, VertexId>,
    out_edges: Vec<BTreeMap<VertexId, BTreeSet<ItemId>>>,
    in_neighbors: Vec<BTreeSet<VertexId>>,
}

impl WantsGraph {
    pub fn vertex_count(&self) -> usize {
        self.vertex_to_wallet.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.iter().map(BTreeMap::len).sum()
    }

    pub fn wallet_of(&self, v: VertexId) -> &WalletId {
        &self.vertex_to_wallet[v.0 as usize]
    }

    pub fn vertex_of(&self, wallet: &WalletId) -> Option<VertexId> {
        self.wallet_to_vertex.get(wallet).copied()
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertex_to_wallet.len() as u32).map(VertexId)
    }

    /// Out-neighbors of `v` in ascending `VertexId` order. Deterministic
    /// iteration here is load-bearing for downstream ordering guarantees.
    pub fn out_neighbors(&self, v: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.out_edges[v.0 as usize].keys().copied()
    }

    pub fn out_degree(&self, v: VertexId) -> usize {
        self.out_edges[v.0 as usize].len()
    }

    pub fn in_degree(&self, v: VertexId) -> usize {
        self.in_neighbors[v.0 as usize].len()
    }

    pub fn has_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.out_edges[from.0 as usize].contains_key(&to)
    }

    pub fn edge_items(&self, from: VertexId, to: VertexId) -> Option<&BTreeSet<ItemId>> {
        self.out_edges[from.0 as usize].get(&to)
    }

    /// Builds the induced subgraph over `keep` (used per-partition by the
    /// partitioner and per-affected-subgraph by the delta front-end).
    /// Vertex ids are renumbered densely and deterministically (sorted by
    /// wallet id).
    pub fn induced_subgraph(&self, keep: &BTreeSet<VertexId>) -> WantsGraph {
        let mut wallets: Vec<&WalletId> = keep.iter().map(|v| self.wallet_of(*v)).collect();
        wallets.sort();
        let mut builder = GraphBuilderState::with_capacity(wallets.len());
        for w in &wallets {
            builder.intern(w);
        }
        for &from in keep {
            for (to, items) in &self.out_edges[from.0 as usize] {
                if !keep.contains(to) {
                    continue;
                }
                let from_v = builder.wallet_to_vertex[self.wallet_of(from)];
                let to_v = builder.wallet_to_vertex[self.wallet_of(*to)];
                builder.add_edge(from_v, to_v, items.iter().cloned());
            }
        }
        builder.finish()
    }
}

/// Mutable scratch state used while assigning dense vertex ids and
/// accumulating edges; finalized into an immutable [`WantsGraph`].
struct GraphBuilderState {
    vertex_to_wallet: Vec<WalletId>,
    wallet_to_vertex: BTreeMap<WalletId, VertexId>,
    out_edges: Vec<BTreeMap<VertexId, BTreeSet<ItemId>>>,
}

impl GraphBuilderState {
    fn with_capacity(n: usize) -> Self {
        Self {
            vertex_to_wallet: Vec::with_capacity(n),
            wallet_to_vertex: BTreeMap::new(),
            out_edges: Vec::with_capacity(n),
        }
    }

    fn intern(&mut self, wallet: &WalletId) -> VertexId {
        if let Some(&v) = self.wallet_to_vertex.get(wallet) {
            return v;
        }
        let id = VertexId(self.vertex_to_wallet.len() as u32);
        self.vertex_to_wallet.push(wallet.clone());
        self.wallet_to_vertex.insert(wallet.clone(), id);
        self.out_edges.push(BTreeMap::new());
        id
    }

    fn add_edge(&mut self, from: VertexId, to: VertexId, items: impl Iterator<Item = ItemId>) {
        debug_assert_ne!(from, to, "wants-graph edges must never be self-loops");
        if from == to {
            return;
        }
        self.out_edges[from.0 as usize]
            .entry(to)
            .or_default()
            .extend(items);
    }

    fn finish(self) -> WantsGraph {
        let mut in_neighbors = vec![BTreeSet::new(); self.vertex_to_wallet.len()];
        for (from_idx, neighbors) in self.out_edges.iter().enumerate() {
            for &to in neighbors.keys() {
                in_neighbors[to.0 as usize].insert(VertexId(from_idx as u32));
            }
        }
        WantsGraph {
            vertex_to_wallet: self.vertex_to_wallet,
            wallet_to_vertex: self.wallet_to_vertex,
            out_edges: self.out_edges,
            in_neighbors,
        }
    }
}

/// Validates a snapshot before building a graph from it. The graph builder
/// itself never errors on unknown wallet references; this is a separate,
/// optional pre-check an external layer may call.
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), GraphError> {
    for wallet_id in snapshot.wallets.keys() {
        if wallet_id.as_str().is_empty() {
            return Err(GraphError::EmptyWalletId);
        }
    }
    let mut seen_owner: BTreeMap<&ItemId, &WalletId> = BTreeMap::new();
    for item in snapshot.items.values() {
        if item.id.as_str().is_empty() {
            return Err(GraphError::EmptyItemId);
        }
        if let Some(prior) = seen_owner.insert(&item.id, &item.owner) {
            if prior != &item.owner {
                return Err(GraphError::DuplicateOwnership {
                    item: item.id.to_string(),
                    first: prior.to_string(),
                    second: item.owner.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Builds a [`WantsGraph`] from a snapshot.
///
/// Algorithm: for every item `i` with owner `o` and wanter set `Wts`
/// (`Snapshot::wants_by_item`), for each `w ∈ Wts \ {o}`, append `i` to
/// `out_edges[o][w]` unless `w` rejects `i` or rejects `o`. Unknown wallet
/// references in `wants_by_item` simply produce no edge.
pub fn build_graph(snapshot: &Snapshot) -> WantsGraph {
    let wants_by_item = snapshot.wants_by_item();
    let mut builder = GraphBuilderState::with_capacity(snapshot.wallets.len());
    for wallet_id in snapshot.wallets.keys() {
        builder.intern(wallet_id);
    }

    for (item_id, wanters) in &wants_by_item {
        let Some(owner_id) = snapshot.owner_of(item_id) else {
            continue;
        };
        for wanter_id in wanters {
            if wanter_id == owner_id {
                continue; // never a self-loop, even if input data is sloppy
            }
            let Some(wanter) = snapshot.wallets.get(wanter_id) else {
                continue; // unknown wallet reference: no edge, no error
            };
            if wanter.rejects_wallet(owner_id) {
                continue;
            }
            let (Some(&from), Some(&to)) = (
                builder.wallet_to_vertex.get(owner_id),
                builder.wallet_to_vertex.get(wanter_id),
            ) else {
                continue;
            };
            builder.add_edge(from, to, std::iter::once(item_id.clone()));
        }
    }

    let graph = builder.finish();
    assert_edge_direction_convention(&graph, snapshot);
    graph
}

/// Asserts once, at construction, that every edge follows the fixed
/// `owner → wanter` convention. A silently flipped convention between two
/// code paths that both build graphs is a real class of bug worth a
/// standing check.
fn assert_edge_direction_convention(graph: &WantsGraph, snapshot: &Snapshot) {
    for from in graph.vertices() {
        for to in graph.out_neighbors(from) {
            let Some(items) = graph.edge_items(from, to) else {
                continue;
            };
            let owner_id = graph.wallet_of(from);
            let wanter_id = graph.wallet_of(to);
            for item_id in items {
                debug_assert_eq!(
                    snapshot.owner_of(item_id),
                    Some(owner_id),
                    "edge {owner_id}->{wanter_id} carries item {item_id} not owned by its `from`"
                );
            }
        }
    }
}
