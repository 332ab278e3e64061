use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Connectivity check failed: {0}")]
    Connectivity(String),

    #[error("Mutation protocol violated: {0}")]
    MutationProtocol(String),

    #[error(transparent)]
    Core(#[from] lagprobe_core::CoreError),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
