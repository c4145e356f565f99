//! Log capture into the status-event channel.
//!
//! Ordinary `tracing` calls anywhere in the process can be rerouted through the
//! active tracker's `log_std_record`. Ownership is explicit: a
//! [`LogSinkRegistry`] holds the single active sink slot, and installing a new
//! tracker replaces the previous one, so the same record is never emitted
//! twice. The [`TrackerLayer`] is registered once with the subscriber at
//! process start and reads whichever sink is current.

use crate::tracker::Tracker;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Owner of the single active log sink.
#[derive(Clone, Default)]
pub struct LogSinkRegistry {
    active: Arc<RwLock<Option<Arc<Tracker>>>>,
}

impl LogSinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `tracker` as the active sink, replacing any previous one.
    pub fn install(&self, tracker: Arc<Tracker>) {
        let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(tracker);
    }

    /// Remove the active sink, if any.
    pub fn clear(&self) {
        let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    #[must_use]
    pub fn active(&self) -> Option<Arc<Tracker>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Subscriber layer forwarding captured records to the active sink.
    #[must_use]
    pub fn layer(&self) -> TrackerLayer {
        TrackerLayer { registry: self.clone() }
    }
}

impl std::fmt::Debug for LogSinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSinkRegistry")
            .field("active", &self.active().is_some())
            .finish()
    }
}

/// `tracing_subscriber` layer routing events through the registry's sink.
pub struct TrackerLayer {
    registry: LogSinkRegistry,
}

impl<S: Subscriber> Layer<S> for TrackerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(sink) = self.registry.active() else {
            return;
        };
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        sink.log_std_record(*event.metadata().level(), &visitor.message);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}
