use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("registry error: {0}")]
    Registry(#[from] depot_registry::RegistryError),

    #[error("content error: {0}")]
    Content(#[from] depot_content::ContentError),

    #[error("promotion error: {0}")]
    Promote(#[from] depot_promote::PromoteError),
}

pub type SdkResult<T> = Result<T, SdkError>;
