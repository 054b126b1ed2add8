//! Canonical cycle keys and loop ids.
//!
//! Two distinct hashes exist here and they are not interchangeable:
//!
//! - [`canonical_vertex_key`] is the rotation+reversal-invariant fingerprint
//!   of a *wallet sequence*, used by the enumerator (`cycles`) to suppress
//!   duplicate emission of the same directed cycle discovered from
//!   different traversal orders within one SCC.
//! - [`loop_id`] is the externally stable id of a *materialized loop*
//!   (participants + the items actually chosen for each step). Two loops
//!   over the same wallets with different item selections get different
//!   ids; collapsing by participants alone would silently merge distinct
//!   trades.
//!
//! `VertexId` ordering is guaranteed (by construction, see `graph::build_graph`)
//! to match `WalletId` lexicographic ordering, so "lexicographically
//! smallest wallet" comparisons reduce to plain integer comparisons on
//! `VertexId` here.

use crate::graph::VertexId;
use crate::model::{ItemId, WalletId};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Rotation-invariant fingerprint: the lexicographically smallest rotation
/// of `seq`.
pub fn smallest_rotation(seq: &[VertexId]) -> Vec<VertexId> {
    let k = seq.len();
    if k == 0 {
        return Vec::new();
    }
    let mut best_start = 0usize;
    for start in 1..k {
        let mut better = false;
        for i in 0..k {
            let a = seq[(best_start + i) % k];
            let b = seq[(start + i) % k];
            match b.cmp(&a) {
                std::cmp::Ordering::Less => {
                    better = true;
                    break;
                }
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Equal => continue,
            }
        }
        if better {
            best_start = start;
        }
    }
    (0..k).map(|i| seq[(best_start + i) % k]).collect()
}

/// Rotation- and reversal-invariant fingerprint of a directed cycle:
/// `min(smallest_rotation(seq), smallest_rotation(reverse(seq)))`.
pub fn canonical_vertex_key(seq: &[VertexId]) -> Vec<VertexId> {
    let forward = smallest_rotation(seq);
    let mut reversed = seq.to_vec();
    reversed.reverse();
    let backward = smallest_rotation(&reversed);
    if backward < forward {
        backward
    } else {
        forward
    }
}

/// Fixed-size fingerprint combining a canonical wallet order with the
/// concrete item selection, used by the two-tier deduplicator so the
/// exact-tier set and bloom pre-check share one cheap, `Copy` key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey(pub [u8; 32]);

impl CanonicalKey {
    pub fn to_hex(self) -> String {
        hex_encode(&self.0)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn hash_participants_and_items<'a>(
    participants: impl Iterator<Item = &'a WalletId>,
    items: impl Iterator<Item = &'a ItemId>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for wallet in participants {
        hasher.update(wallet.as_str().as_bytes());
        hasher.update(b"|");
    }
    hasher.update(b"::items::");
    for item in items {
        hasher.update(item.as_str().as_bytes());
        hasher.update(b"|");
    }
    hasher.finalize().into()
}

/// Global dedup key: canonical wallet order (rotation+reversal invariant,
/// so it agrees with `canonical_vertex_key`) plus the chosen items. Two
/// materializations of the same wallet cycle with different item
/// selections must not collide here.
pub fn canonical_key(canonical_wallets: &[WalletId], items: &BTreeSet<ItemId>) -> CanonicalKey {
    CanonicalKey(hash_participants_and_items(canonical_wallets.iter(), items.iter()))
}

/// Stable loop id: `H(sorted(participants) || sorted(items))`.
/// Sorting the participant *set* (not a cycle rotation) already makes this
/// invariant under rotation and reversal, since a set has no order to begin
/// with — only the item selection can still distinguish two loops over the
/// same wallets.
pub fn loop_id(participants: &BTreeSet<WalletId>, items: &BTreeSet<ItemId>) -> String {
    hex_encode(&hash_participants_and_items(participants.iter(), items.iter()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_collapses_to_same_key() {
        let abc = vec![VertexId(0), VertexId(1), VertexId(2)];
        let bca = vec![VertexId(1), VertexId(2), VertexId(0)];
        let cab = vec![VertexId(2), VertexId(0), VertexId(1)];
        let k1 = canonical_vertex_key(&abc);
        let k2 = canonical_vertex_key(&bca);
        let k3 = canonical_vertex_key(&cab);
        assert_eq!(k1, k2);
        assert_eq!(k1, k3);
    }

    #[test]
    fn reversal_collapses_to_same_key() {
        let abc = vec![VertexId(0), VertexId(1), VertexId(2)];
        let acb = vec![VertexId(0), VertexId(2), VertexId(1)];
        assert_eq!(canonical_vertex_key(&abc), canonical_vertex_key(&acb));
    }

    #[test]
    fn loop_id_differs_on_item_selection_alone() {
        let participants: BTreeSet<WalletId> = ["A", "B"].into_iter().map(WalletId::from).collect();
        let items_a: BTreeSet<ItemId> = ["x"].into_iter().map(ItemId::from).collect();
        let items_b: BTreeSet<ItemId> = ["y"].into_iter().map(ItemId::from).collect();
        assert_ne!(loop_id(&participants, &items_a), loop_id(&participants, &items_b));
    }

    #[test]
    fn loop_id_is_order_independent_over_participant_set() {
        let p1: BTreeSet<WalletId> = ["A", "B", "C"].into_iter().map(WalletId::from).collect();
        let p2: BTreeSet<WalletId> = ["C", "B", "A"].into_iter().map(WalletId::from).collect();
        let items: BTreeSet<ItemId> = ["x"].into_iter().map(ItemId::from).collect();
        assert_eq!(loop_id(&p1, &items), loop_id(&p2, &items));
    }
}
