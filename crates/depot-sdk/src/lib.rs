//! High-level SDK for Depot.
//!
//! Wires the store registry, not-found cache, content resolver, and
//! promotion engine into one handle over a caller-supplied transfer
//! boundary. This is the main entry point for applications embedding
//! Depot.
//!
//! The assembly also connects the registry's change events to the
//! not-found cache: updating or deleting a store drops the negative
//! entries for that store and for every group that resolves through it,
//! so a definition change is visible to the very next request.

pub mod depot;
pub mod error;

pub use depot::{Depot, DepotBuilder};
pub use error::{SdkError, SdkResult};

// Re-export key types
pub use depot_content::{
    ContentConfig, ListEntry, Listing, ListingOutcome, Resolution, ResolveOutcome, Transfer,
};
pub use depot_model::{ArtifactStore, GroupStore, HostedStore, RemoteStore, StoreKey, StoreType};
pub use depot_promote::{PromotionRequest, PromotionResult, RuleSet, ValidationRule};
