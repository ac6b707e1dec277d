//! Content resolution engine for Depot.
//!
//! Answers "give me the bytes (or listing) for path P against store S",
//! where S may be a concrete store or a group. The engine expands S into
//! its ordered candidate list, consults the not-found cache to skip known
//! misses, asks the external [`Transfer`] collaborator about the rest, and
//! applies first-hit-wins for plain content or full aggregation for
//! mergable metadata and directory listings.
//!
//! Confirmed misses populate the NFC; transport failures are inconclusive,
//! never cached, and never abort the walk. A request deadline produces a
//! `Timeout` outcome distinct from `NotFound`.

pub mod config;
pub mod error;
pub mod memory;
pub mod merge;
pub mod resolve;
pub mod transfer;

pub use config::ContentConfig;
pub use error::{ContentError, ContentResult};
pub use memory::MemoryTransfer;
pub use merge::{LineMerger, MetadataMerger};
pub use resolve::{
    CandidateFailure, ContentResolver, FoundContent, Listing, ListingOutcome, ResolveOutcome,
    Resolution,
};
pub use transfer::{ListEntry, Transfer, TransferError};
