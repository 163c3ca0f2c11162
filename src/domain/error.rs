use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid payload: {message}")]
    Validation { message: String },
    #[error("document `{document}` is missing required field `{field}`")]
    MissingField { document: String, field: &'static str },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn missing_field(document: impl ToString, field: &'static str) -> Self {
        Self::MissingField {
            document: document.to_string(),
            field,
        }
    }
}
