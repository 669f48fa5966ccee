use thiserror::Error;

/// Strategy-layer error types
#[derive(Error, Debug)]
pub enum StratumError {
    #[error("Invalid pool URL format: {0}")]
    InvalidUrl(String),

    #[error("Invalid port in URL: {0}")]
    InvalidPort(String),
}

pub type Result<T> = std::result::Result<T, StratumError>;
