use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Invalid model URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned HTTP {0}")]
    Server(u16),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("A transfer is already in progress")]
    TransferInFlight,
}
