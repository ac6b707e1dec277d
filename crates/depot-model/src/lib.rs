//! Foundation types for Depot.
//!
//! This crate provides the identity and definition types used throughout
//! the Depot artifact-repository core. Every other Depot crate depends on
//! `depot-model`.
//!
//! # Key Types
//!
//! - [`StoreKey`] — `(package_type, store_type, name)` identity tuple
//! - [`StoreType`] — hosted, remote, or group
//! - [`ArtifactStore`] — tagged union over the three store definitions
//! - [`StoreMeta`] — attributes shared by every store variant

pub mod error;
pub mod key;
pub mod path;
pub mod store;

pub use error::ModelError;
pub use key::{StoreKey, StoreType};
pub use store::{ArtifactStore, GroupStore, HostedStore, RemoteStore, StoreMeta};
