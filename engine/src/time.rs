//! Deadline tracking for the budget-bounded phases of discovery.
//!
//! Unlike a tick-based `TimeManager` (discrete simulation steps with no
//! wall-clock meaning), the loop engine runs against real per-request
//! time budgets, so this is a thin wrapper over `std::time::Instant`.
//! Every deadline check funnels through [`Deadline::is_expired`] so
//! deadline checks between batches of seed nodes and on recursive DFS
//! entry are the only places wall-clock time is ever read.

use std::time::{Duration, Instant};

/// A monotonic deadline some number of milliseconds in the future.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started_at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn from_millis(millis: u64) -> Self {
        Self {
            started_at: Instant::now(),
            budget: Duration::from_millis(millis),
        }
    }

    /// A deadline that never expires, used for sub-phases that should not
    /// themselves be time-bounded beyond the caller's global deadline (the
    /// scheduler uses this for the SCC phase when `scc_timeout_ms` is 0).
    pub fn never() -> Self {
        Self {
            started_at: Instant::now(),
            budget: Duration::from_secs(u64::MAX / 2_000),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.started_at.elapsed() >= self.budget
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// A new deadline for a sub-phase, clamped to whatever remains of
    /// `self` so a generous per-component soft deadline can never outlive
    /// the hard global per-request deadline.
    pub fn sub_deadline(&self, millis: u64) -> Self {
        let remaining = self.budget.saturating_sub(self.started_at.elapsed());
        let requested = Duration::from_millis(millis);
        Self {
            started_at: Instant::now(),
            budget: requested.min(remaining),
        }
    }
}
