//! Opaque identifiers for wallets, items, and collections.
//!
//! External callers pass plain strings; the graph and cycle-search layers
//! index everything by small dense integers (see `graph::VertexId`). These
//! newtypes exist so the boundary between "identifier the caller gave us"
//! and "internal dense index" can never be confused at a type level.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(WalletId);
opaque_id!(ItemId);
opaque_id!(CollectionId);
