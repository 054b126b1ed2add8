//! `TradeLoop`: a closed cycle of wallets, each step transferring items
//! owned by its `from` and wanted by its `to`.

use super::ids::{ItemId, WalletId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStep {
    pub from: WalletId,
    pub to: WalletId,
    /// Items flowing from `from` to `to` in this step. Never empty.
    pub items: BTreeSet<ItemId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLoop {
    /// Stable id derived from (sorted participants, sorted chosen items).
    /// See `canonical::loop_id`. Two loops over the same wallets but
    /// different items get different ids.
    pub id: String,
    pub steps: Vec<LoopStep>,
    pub participants: usize,
    pub efficiency: f64,
    pub quality: f64,
    pub estimated_value: f64,
    /// Milliseconds since the UNIX epoch, stamped by the caller-supplied
    /// clock at emission time (kept out of `Default`/test fixtures so
    /// discovery itself never needs the non-deterministic wall clock).
    pub created_at: u64,
}

impl TradeLoop {
    /// Wallet ids in cycle order, `w_0, ..., w_{k-1}` (open form).
    pub fn wallet_sequence(&self) -> Vec<&WalletId> {
        self.steps.iter().map(|s| &s.from).collect()
    }

    /// All items moved anywhere in this loop, in step order with
    /// duplicates removed (used for canonical-id recomputation).
    pub fn all_items(&self) -> BTreeSet<&ItemId> {
        self.steps.iter().flat_map(|s| &s.items).collect()
    }
}
