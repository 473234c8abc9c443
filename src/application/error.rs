use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Application-level error returned by the read-path services.
///
/// Cache failures never appear here: the cache layer recovers them locally
/// and reports a miss. Only store and domain failures reach the caller.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    /// True when the error is a missing-entity condition rather than a
    /// store or infrastructure fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Domain(DomainError::NotFound { .. }) | Self::Repo(RepoError::NotFound)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(AppError::from(DomainError::not_found("listing")).is_not_found());
        assert!(AppError::from(RepoError::NotFound).is_not_found());
        assert!(!AppError::from(InfraError::telemetry("boom")).is_not_found());
    }
}
