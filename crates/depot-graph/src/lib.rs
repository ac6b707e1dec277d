//! Group membership graph algorithms for Depot.
//!
//! A group store is an ordered list of constituents which may themselves be
//! groups. This crate turns that definition graph into the two derived views
//! the rest of the system needs:
//!
//! - [`members_of`] — the ordered, flattened, de-duplicated list of concrete
//!   stores a resolution walk should consult, with a defensive cycle guard.
//! - [`AffectedByIndex`] — the reverse view: which groups could a given
//!   store's content surface through, maintained incrementally as store
//!   definitions change.
//!
//! Everything here is pure over an immutable snapshot of store definitions;
//! the registry owns the snapshot and calls in under its own write lock.

pub mod expand;
pub mod index;

pub use expand::{members_of, would_cycle};
pub use index::AffectedByIndex;
