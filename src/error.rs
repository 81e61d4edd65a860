use thiserror::Error;

/// Failure taxonomy for the import pipelines.
///
/// A posting rejected by the ledger's validation is not an error, it is a
/// regular outcome of the send stage (see `SendOutcome::Invalid`). These
/// variants cover the failures that abort an operation.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not obtain access token: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
