//! Domain types: wallets, items, wants, trade loops.

pub mod ids;
pub mod item;
pub mod loop_;
pub mod snapshot;
pub mod wallet;

pub use ids::{CollectionId, ItemId, WalletId};
pub use item::Item;
pub use loop_::{LoopStep, TradeLoop};
pub use snapshot::Snapshot;
pub use wallet::{ActivityTier, Rejections, Wallet};
