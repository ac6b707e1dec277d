use depot_model::StoreKey;
use thiserror::Error;

use crate::transfer::TransferError;

/// Structural errors from the content engine.
///
/// Per-candidate transport failures and confirmed misses are not errors;
/// they are carried in the walk outcome. These variants cover requests the
/// engine cannot meaningfully start or finish.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("no such store: {0}")]
    NoSuchStore(StoreKey),

    #[error("store {0} accepts no writes")]
    NotWritable(StoreKey),

    #[error("metadata merge failed for {path}: {reason}")]
    MergeFailed { path: String, reason: String },

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

/// Convenience alias for content-engine results.
pub type ContentResult<T> = Result<T, ContentError>;
