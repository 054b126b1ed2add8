//! Event stream: `loop_discovered` / `loop_invalidated`, emitted by the
//! core and consumed by an external notifier through an [`EventSink`].

use crate::model::TradeLoop;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    ItemAdded,
    ItemRemoved,
    WantAdded,
    WantRemoved,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiscoveryEvent {
    LoopDiscovered { tenant: String, loop_: TradeLoop, trigger: Trigger },
    LoopInvalidated { tenant: String, loop_id: String, reason: String },
}

/// Where [`DiscoveryEvent`]s go. Kept as a trait (rather than a hardcoded
/// channel) so the core stays decoupled from whatever transport an
/// external notifier uses, the same seam `CheckpointSink` plays for
/// `orchestrator::checkpoint`.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DiscoveryEvent);
}

/// An in-memory sink, useful for tests and for the CLI's single-shot runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<DiscoveryEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<DiscoveryEvent> {
        std::mem::take(&mut self.events.lock().expect("recording sink mutex poisoned"))
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: DiscoveryEvent) {
        self.events.lock().expect("recording sink mutex poisoned").push(event);
    }
}

/// Forwards every event to `tracing` as a structured event, for deployments
/// that only want events in the log stream rather than a separate channel.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::LoopDiscovered { tenant, loop_, trigger } => {
                info!(tenant, loop_id = %loop_.id, trigger = ?trigger, "loop_discovered");
            }
            DiscoveryEvent::LoopInvalidated { tenant, loop_id, reason } => {
                info!(tenant, loop_id, reason, "loop_invalidated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_accumulates_and_drains() {
        let sink = RecordingSink::new();
        sink.emit(DiscoveryEvent::LoopInvalidated {
            tenant: "t1".into(),
            loop_id: "abc".into(),
            reason: "item_removed".into(),
        });
        assert_eq!(sink.take().len(), 1);
        assert!(sink.take().is_empty());
    }
}
