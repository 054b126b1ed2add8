//! Item entity: a non-fungible unit with exactly one owner at a time.

use super::ids::{CollectionId, ItemId, WalletId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub owner: WalletId,
    #[serde(default)]
    pub collection: Option<CollectionId>,
    #[serde(default)]
    pub floor_price: Option<f64>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, owner: impl Into<WalletId>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            collection: None,
            floor_price: None,
        }
    }
}
