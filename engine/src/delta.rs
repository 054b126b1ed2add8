//! Delta front-end: recomputes only the affected subgraph for a
//! single-entity change, rather than the whole graph.

use crate::error::DeltaError;
use crate::graph::{build_graph, VertexId, WantsGraph};
use crate::model::{ItemId, Snapshot, WalletId};
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    ItemAdded { item: ItemId, owner: WalletId },
    ItemRemoved { item: ItemId },
    WantAdded { wallet: WalletId, item: ItemId },
    WantRemoved { wallet: WalletId, item: ItemId },
}

impl ChangeEvent {
    /// The wallet(s) the affected-subgraph BFS starts from.
    fn origin_wallets(&self, snapshot: &Snapshot) -> Result<BTreeSet<WalletId>, DeltaError> {
        match self {
            ChangeEvent::ItemAdded { owner, .. } => {
                if !snapshot.wallets.contains_key(owner) {
                    return Err(DeltaError::WalletNotFound(owner.to_string()));
                }
                Ok(BTreeSet::from([owner.clone()]))
            }
            ChangeEvent::ItemRemoved { item } => snapshot
                .owner_of(item)
                .cloned()
                .map(|w| BTreeSet::from([w]))
                .ok_or_else(|| DeltaError::ItemNotFound(item.to_string())),
            ChangeEvent::WantAdded { wallet, .. } | ChangeEvent::WantRemoved { wallet, .. } => {
                if !snapshot.wallets.contains_key(wallet) {
                    return Err(DeltaError::WalletNotFound(wallet.to_string()));
                }
                Ok(BTreeSet::from([wallet.clone()]))
            }
        }
    }
}

/// Builds the undirected BFS frontier within `max_depth` hops of the
/// mutated entity's wallet(s): the set of wallets reachable within
/// `max_depth` hops, ignoring edge direction, plus all edges among them.
/// Returns the induced subgraph over that frontier.
pub fn affected_subgraph(graph: &WantsGraph, event: &ChangeEvent, snapshot: &Snapshot, max_depth: usize) -> Result<WantsGraph, DeltaError> {
    let origins = event.origin_wallets(snapshot)?;
    let mut frontier: BTreeSet<VertexId> = BTreeSet::new();
    let mut queue: VecDeque<(VertexId, usize)> = VecDeque::new();

    for origin in &origins {
        if let Some(v) = graph.vertex_of(origin) {
            if frontier.insert(v) {
                queue.push_back((v, 0));
            }
        }
    }

    while let Some((v, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let neighbors: Vec<VertexId> = graph
            .out_neighbors(v)
            .chain(graph.vertices().filter(|&w| graph.has_edge(w, v)))
            .collect();
        for n in neighbors {
            if frontier.insert(n) {
                queue.push_back((n, depth + 1));
            }
        }
    }

    Ok(graph.induced_subgraph(&frontier))
}

/// Rebuilds the full graph and restricts it to the subgraph affected by
/// `event`. Rebuilding is the simplest correct way to honor "the graph is
/// immutable for the duration of one discovery call; incremental updates
/// build a fresh snapshot". The cost is bounded by the affected
/// subgraph's BFS frontier, not the full graph, for everything downstream
/// of this call.
pub fn compute_affected_subgraph(snapshot: &Snapshot, event: &ChangeEvent, max_depth: usize) -> Result<WantsGraph, DeltaError> {
    let full_graph = build_graph(snapshot);
    affected_subgraph(&full_graph, event, snapshot, max_depth)
}

/// Whether a stored loop references the entity named by a removal event,
/// and therefore must be invalidated.
pub fn loop_references_removed_entity(wallet_sequence: &[&WalletId], all_items: &BTreeSet<&ItemId>, event: &ChangeEvent) -> bool {
    match event {
        ChangeEvent::ItemRemoved { item } => all_items.contains(item),
        ChangeEvent::WantRemoved { wallet, item } => wallet_sequence.iter().any(|w| *w == wallet) && all_items.contains(item),
        ChangeEvent::ItemAdded { .. } | ChangeEvent::WantAdded { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, Wallet};

    fn chain_snapshot() -> Snapshot {
        // A -> B -> C -> D, a chain rather than a cycle, so BFS depth is
        // easy to reason about independent of cycle detection.
        let mut snap = Snapshot::new();
        let mut a = Wallet::new("A");
        a.wanted_items.insert("b_item".into());
        let mut b = Wallet::new("B");
        b.wanted_items.insert("c_item".into());
        let mut c = Wallet::new("C");
        c.wanted_items.insert("d_item".into());
        let d = Wallet::new("D");
        snap.insert_wallet(a);
        snap.insert_wallet(b);
        snap.insert_wallet(c);
        snap.insert_wallet(d);
        snap.insert_item(Item::new("b_item", "B"));
        snap.insert_item(Item::new("c_item", "C"));
        snap.insert_item(Item::new("d_item", "D"));
        snap
    }

    #[test]
    fn affected_subgraph_respects_max_depth() {
        let snap = chain_snapshot();
        let graph = build_graph(&snap);
        let event = ChangeEvent::WantAdded {
            wallet: "A".into(),
            item: "b_item".into(),
        };
        let sub = compute_affected_subgraph(&snap, &event, 1).unwrap();
        // depth 1 from A reaches B only (A->B edge), not C or D.
        assert_eq!(sub.vertex_count(), 2);
    }

    #[test]
    fn unknown_wallet_is_a_delta_error() {
        let snap = chain_snapshot();
        let event = ChangeEvent::WantAdded {
            wallet: "GHOST".into(),
            item: "b_item".into(),
        };
        let err = compute_affected_subgraph(&snap, &event, 1).unwrap_err();
        assert_eq!(err, DeltaError::WalletNotFound("GHOST".into()));
    }

    #[test]
    fn loop_referencing_removed_item_is_flagged() {
        let wallets: Vec<WalletId> = vec!["A".into(), "B".into()];
        let wallet_refs: Vec<&WalletId> = wallets.iter().collect();
        let item: ItemId = "x".into();
        let items = BTreeSet::from([&item]);
        let event = ChangeEvent::ItemRemoved { item: "x".into() };
        assert!(loop_references_removed_entity(&wallet_refs, &items, &event));
    }
}
