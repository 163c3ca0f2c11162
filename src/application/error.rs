use std::time::Duration;

use thiserror::Error;

use crate::application::ports::ExternalError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;
use crate::infra::rate_limit::{Operation, RateLimitExceeded};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{service} failed: {source}")]
    ExternalService {
        service: &'static str,
        #[source]
        source: ExternalError,
    },
    #[error("rate limit exceeded for `{operation}`")]
    RateLimited {
        operation: Operation,
        retry_after: Duration,
    },
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn external(service: &'static str, source: ExternalError) -> Self {
        Self::ExternalService { service, source }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. } | AppError::Repo(RepoError::NotFound(_)))
    }

    /// Short message suitable for end users; internals stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound { .. } | AppError::Repo(RepoError::NotFound(_)) => {
                "Resource not found".to_string()
            }
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                format!("Request could not be processed: {self}")
            }
            AppError::ExternalService {
                source: ExternalError::Rejected(message),
                ..
            } => format!("Error: {message}"),
            AppError::ExternalService { .. } => "External service unavailable".to_string(),
            AppError::RateLimited { retry_after, .. } => format!(
                "Too many requests; retry in {} seconds",
                retry_after.as_secs().max(1)
            ),
            AppError::Repo(_) => "Service temporarily unavailable".to_string(),
            AppError::Domain(DomainError::MissingField { .. })
            | AppError::Infra(_)
            | AppError::Unexpected(_) => "Unexpected error occurred".to_string(),
        }
    }
}

impl From<RateLimitExceeded> for AppError {
    fn from(error: RateLimitExceeded) -> Self {
        Self::RateLimited {
            operation: error.operation,
            retry_after: error.retry_after,
        }
    }
}
