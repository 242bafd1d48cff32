use thiserror::Error;

/// Error type for opaque token generation.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("Token length must be at least one byte")]
    EmptyLength,

    #[error("Secure random source unavailable: {0}")]
    EntropyUnavailable(String),
}
