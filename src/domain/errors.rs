use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient credits: balance {balance}, requested {requested}")]
    InsufficientCredits { balance: u64, requested: u64 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
