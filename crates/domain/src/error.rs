use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid automation definition {id}: {source}")]
    InvalidDefinition {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid webhook payload: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),
}
