//! A consistent view of wallets + items the core discovers loops over.
//!
//! Snapshots are immutable for the duration of one discovery call.
//! Incremental updates (`delta` module) build a fresh, restricted view
//! rather than mutating one in place.

use super::ids::{ItemId, WalletId};
use super::item::Item;
use super::wallet::Wallet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub wallets: BTreeMap<WalletId, Wallet>,
    pub items: BTreeMap<ItemId, Item>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_wallet(&mut self, wallet: Wallet) {
        self.wallets.insert(wallet.id.clone(), wallet);
    }

    /// Inserts `item` and keeps its owner's `owned` set in sync: ownership
    /// is a function, and `I ∈ W.owned ⇔ ownership[I] = W`.
    pub fn insert_item(&mut self, item: Item) {
        if let Some(owner) = self.wallets.get_mut(&item.owner) {
            owner.owned.insert(item.id.clone());
        }
        self.items.insert(item.id.clone(), item);
    }

    pub fn owner_of(&self, item: &ItemId) -> Option<&WalletId> {
        self.items.get(item).map(|i| &i.owner)
    }

    /// Derives `wants_by_item`, the graph builder's input: for every item,
    /// the set of wallets that would accept it directly or via its
    /// collection. The owner is never included; a wallet cannot want its
    /// own item, and even if it did the builder would exclude the
    /// self-loop.
    pub fn wants_by_item(&self) -> BTreeMap<ItemId, BTreeSet<WalletId>> {
        let mut result: BTreeMap<ItemId, BTreeSet<WalletId>> = BTreeMap::new();
        for item in self.items.values() {
            let mut wanters = BTreeSet::new();
            for wallet in self.wallets.values() {
                if wallet.id == item.owner {
                    continue;
                }
                if wallet.accepts(&item.id, item.collection.as_ref()) {
                    wanters.insert(wallet.id.clone());
                }
            }
            if !wanters.is_empty() {
                result.insert(item.id.clone(), wanters);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Wallet;

    #[test]
    fn wants_by_item_excludes_owner_and_rejections() {
        let mut snap = Snapshot::new();
        let mut a = Wallet::new("A");
        a.owned.insert(ItemId::from("x"));
        let mut b = Wallet::new("B");
        b.wanted_items.insert(ItemId::from("x"));
        let mut c = Wallet::new("C");
        c.wanted_items.insert(ItemId::from("x"));
        c.rejections.items.insert(ItemId::from("x"));
        snap.insert_wallet(a);
        snap.insert_wallet(b);
        snap.insert_wallet(c);
        snap.insert_item(Item::new("x", "A"));

        let wants = snap.wants_by_item();
        let wanters = wants.get(&ItemId::from("x")).unwrap();
        assert!(wanters.contains(&WalletId::from("B")));
        assert!(!wanters.contains(&WalletId::from("C")));
        assert!(!wanters.contains(&WalletId::from("A")));
    }
}
