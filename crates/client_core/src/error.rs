use std::fmt;

use shared::error::FailureKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no API key configured (set GEMINI_API_KEY)")]
    MissingCredential,
    #[error("invalid service url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("response contained no text")]
    EmptyResponse,
    #[error("response contained no image data")]
    NoImage,
}

impl ServiceError {
    pub fn malformed(err: impl fmt::Display) -> Self {
        ServiceError::MalformedResponse(err.to_string())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ServiceError::MissingCredential | ServiceError::InvalidUrl(_) => {
                FailureKind::Configuration
            }
            ServiceError::Transport(_)
            | ServiceError::Unavailable(_)
            | ServiceError::Status { .. } => FailureKind::Transport,
            ServiceError::MalformedResponse(_)
            | ServiceError::EmptyResponse
            | ServiceError::NoImage => FailureKind::MalformedResponse,
        }
    }
}
