use crate::domain::error::DomainError;
use crate::domain::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to fetch books: {0}")]
    Fetch(String),
}
