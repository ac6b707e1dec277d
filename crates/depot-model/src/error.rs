use thiserror::Error;

/// Errors produced by model type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid store key {0:?}: expected packageType:storeType:name")]
    InvalidStoreKey(String),

    #[error("unknown store type: {0:?}")]
    UnknownStoreType(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
