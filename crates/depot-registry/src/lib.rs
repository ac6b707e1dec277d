//! Store registry for Depot.
//!
//! The registry is the single source of truth for store definitions. All
//! mutation flows through it: writes are validated (membership cycles,
//! dangling constituents, package-type mixing are rejected before any state
//! change), the affected-by index is recomputed inside the same write, and
//! every successful change is published to registered event sinks.
//!
//! Readers work against an immutable snapshot swapped in atomically, so a
//! resolution walk never observes a half-applied group definition.

pub mod error;
pub mod event;
pub mod memory;
pub mod traits;

pub use error::{RegistryError, RegistryResult};
pub use event::{EventSink, StoreEvent};
pub use memory::MemoryStoreRegistry;
pub use traits::StoreRegistry;
