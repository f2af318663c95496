use std::time::Duration;

/// Failure reported by a chain-data provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON-RPC server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid provider configuration: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The query matched none of the block / transaction / address shapes.
    /// Raised locally, before any provider call.
    #[error("invalid query: {0:?}")]
    InvalidQuery(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
