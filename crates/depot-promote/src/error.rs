use depot_model::StoreKey;
use thiserror::Error;

/// Request-level promotion failures.
///
/// Per-path copy problems are not errors; they land in the result's
/// `errors` set and the call returns normally.
#[derive(Debug, Error)]
pub enum PromoteError {
    #[error("no such store: {0}")]
    NoSuchStore(StoreKey),

    #[error("invalid promotion target {key}: {reason}")]
    InvalidTarget { key: StoreKey, reason: String },

    #[error("unknown validation rule-set: {0:?}")]
    UnknownRuleSet(String),

    #[error("registry error: {0}")]
    Registry(#[from] depot_registry::RegistryError),

    #[error("content error: {0}")]
    Content(#[from] depot_content::ContentError),
}

/// Convenience alias for promotion results.
pub type PromoteResult<T> = Result<T, PromoteError>;
