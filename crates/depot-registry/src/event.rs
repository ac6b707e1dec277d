use std::fmt;

use serde::{Deserialize, Serialize};

use depot_model::StoreKey;

/// A change published by the registry after a successful write.
///
/// Events are delivered synchronously, in commit order, to every sink
/// registered on the registry. A cascade delete publishes one `Updated`
/// per rewritten group before the final `Deleted`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    Created(StoreKey),
    Updated(StoreKey),
    Deleted(StoreKey),
}

impl StoreEvent {
    /// The key the event is about.
    pub fn key(&self) -> &StoreKey {
        match self {
            Self::Created(k) | Self::Updated(k) | Self::Deleted(k) => k,
        }
    }
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(k) => write!(f, "created {k}"),
            Self::Updated(k) => write!(f, "updated {k}"),
            Self::Deleted(k) => write!(f, "deleted {k}"),
        }
    }
}

/// Receiver for registry change events.
///
/// Sinks must not call back into the registry's write path; they run on
/// the writer's thread, immediately after the change commits.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &StoreEvent);
}

/// Adapter so plain closures can subscribe.
impl<F> EventSink for F
where
    F: Fn(&StoreEvent) + Send + Sync,
{
    fn on_event(&self, event: &StoreEvent) {
        self(event)
    }
}
