//! Loop construction: turns a closed cycle of vertices from the
//! enumerator into a [`TradeLoop`], checking for ownership drift against a
//! live snapshot and selecting the items each step actually carries.

use crate::canonical::loop_id;
use crate::graph::{VertexId, WantsGraph};
use crate::model::{ItemId, LoopStep, Snapshot, TradeLoop, WalletId};
use std::collections::BTreeSet;

/// Builds a [`TradeLoop`] from an open-form cycle `[w_0, ..., w_{k-1}]`
/// (the implicit closing edge is `w_{k-1} -> w_0`).
///
/// Returns `None` on ownership drift: if the snapshot no longer agrees
/// that `w_i` owns any item `w_{i+1}` wants along that edge, the step,
/// and therefore the whole loop, can no longer be materialized. The
/// caller should treat this as a silently dropped candidate rather than a
/// hard error; the underlying graph was valid when built, the snapshot
/// may have moved on since.
///
/// When `enable_bundles` is true every valid item crossing a step is kept;
/// when false only the lexicographically smallest item id is kept. Either
/// way the result is deterministic, so `loop_id` stays reproducible.
pub fn construct_loop(
    graph: &WantsGraph,
    cycle: &[VertexId],
    snapshot: &Snapshot,
    enable_bundles: bool,
    efficiency: f64,
    quality: f64,
    estimated_value: f64,
    created_at: u64,
) -> Option<TradeLoop> {
    if cycle.len() < 2 {
        return None;
    }

    let mut steps = Vec::with_capacity(cycle.len());
    let mut participants: BTreeSet<WalletId> = BTreeSet::new();
    let mut all_items: BTreeSet<ItemId> = BTreeSet::new();

    for i in 0..cycle.len() {
        let from_v = cycle[i];
        let to_v = cycle[(i + 1) % cycle.len()];
        let from_id = graph.wallet_of(from_v).clone();
        let to_id = graph.wallet_of(to_v).clone();

        let candidate_items = graph.edge_items(from_v, to_v)?;
        let valid_items: BTreeSet<ItemId> = candidate_items
            .iter()
            .filter(|item_id| snapshot.owner_of(item_id) == Some(&from_id))
            .cloned()
            .collect();
        if valid_items.is_empty() {
            return None; // ownership drift since the graph was built
        }

        let chosen: BTreeSet<ItemId> = if enable_bundles {
            valid_items
        } else {
            let min_item = valid_items.into_iter().next().expect("non-empty checked above");
            std::iter::once(min_item).collect()
        };

        all_items.extend(chosen.iter().cloned());
        participants.insert(from_id.clone());
        steps.push(LoopStep {
            from: from_id,
            to: to_id,
            items: chosen,
        });
    }

    let id = loop_id(&participants, &all_items);

    Some(TradeLoop {
        id,
        steps,
        participants: participants.len(),
        efficiency,
        quality,
        estimated_value,
        created_at,
    })
}
