//! Wallet entity: a participant holding items and wanting others.

use super::ids::{CollectionId, ItemId, WalletId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Coarse per-wallet activity tier, used only to bias community
/// prioritization toward fair inclusion of new participants.
///
/// Activity data is not part of the core data model, so it is optional.
/// When `None`, the scheduler degrades to size/density-based
/// prioritization only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityTier {
    New,
    Standard,
    Power,
}

/// What a wallet refuses to trade, honored by the graph builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rejections {
    /// Items this wallet will never accept, regardless of who offers them.
    pub items: BTreeSet<ItemId>,
    /// Counterparties this wallet will never trade with.
    pub wallets: BTreeSet<WalletId>,
}

/// A wallet: what it owns, what it wants, and what it refuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub owned: BTreeSet<ItemId>,
    pub wanted_items: BTreeSet<ItemId>,
    pub wanted_collections: BTreeSet<CollectionId>,
    #[serde(default)]
    pub rejections: Rejections,
    #[serde(default)]
    pub activity: Option<ActivityTier>,
}

impl Wallet {
    pub fn new(id: impl Into<WalletId>) -> Self {
        Self {
            id: id.into(),
            owned: BTreeSet::new(),
            wanted_items: BTreeSet::new(),
            wanted_collections: BTreeSet::new(),
            rejections: Rejections::default(),
            activity: None,
        }
    }

    /// Whether `item` is acceptable to this wallet, either wanted directly
    /// or wanted via its collection, and not on the reject list.
    pub fn accepts(&self, item: &ItemId, collection: Option<&CollectionId>) -> bool {
        if self.rejections.items.contains(item) {
            return false;
        }
        if self.wanted_items.contains(item) {
            return true;
        }
        match collection {
            Some(c) => self.wanted_collections.contains(c),
            None => false,
        }
    }

    pub fn rejects_wallet(&self, other: &WalletId) -> bool {
        self.rejections.wallets.contains(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_honors_item_rejection_over_want() {
        let mut w = Wallet::new("A");
        w.wanted_items.insert(ItemId::from("x"));
        w.rejections.items.insert(ItemId::from("x"));
        assert!(!w.accepts(&ItemId::from("x"), None));
    }

    #[test]
    fn accepts_via_collection() {
        let mut w = Wallet::new("A");
        w.wanted_collections.insert(CollectionId::from("apes"));
        assert!(w.accepts(&ItemId::from("x"), Some(&CollectionId::from("apes"))));
        assert!(!w.accepts(&ItemId::from("y"), Some(&CollectionId::from("other"))));
    }
}
