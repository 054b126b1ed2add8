//! Error taxonomy.
//!
//! Three tiers, composed via `#[from]` the way `AgentError` /
//! `TransactionError` compose into `SettlementError`:
//!
//! - [`GraphError`] — input-validation failures raised while building a
//!   graph from a snapshot. Unknown wallet references are *not* an
//!   error: they simply produce no edges.
//! - [`DeltaError`] — fatal-for-the-call errors raised by the delta
//!   front-end when a tenant or referenced entity cannot be found.
//! - [`DiscoveryError`] — the top-level error type returned by the public
//!   API, composing the other two.
//!
//! Time-budget exhaustion, ownership drift, and bloom-filter false
//! positives are deliberately *not* represented here: they are recoverable
//! conditions surfaced in-band through `DiscoveryResult.stats` or silently
//! absorbed, never through `Result::Err`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("wallet id must not be empty")]
    EmptyWalletId,

    #[error("item id must not be empty")]
    EmptyItemId,

    #[error("item {item} is claimed as owned by both {first} and {second}")]
    DuplicateOwnership {
        item: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("unknown tenant {0}")]
    UnknownTenant(String),

    #[error("item {0} not found in snapshot")]
    ItemNotFound(String),

    #[error("wallet {0} not found in snapshot")]
    WalletNotFound(String),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("delta error: {0}")]
    Delta(#[from] DeltaError),
}

/// `ErrorKind` classification that lets external layers branch (e.g. map
/// to an HTTP status) without matching on every concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
}

impl DiscoveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiscoveryError::Graph(_) => ErrorKind::InvalidInput,
            DiscoveryError::Delta(_) => ErrorKind::NotFound,
        }
    }
}
