use shared::{domain::MessageId, error::ApiError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid response from server: {0}")]
    InvalidResponse(String),
    #[error("message can't be empty")]
    EmptyInput,
    #[error("vote on message {0} was superseded by a newer vote")]
    Superseded(MessageId),
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    pub fn from_api_error(status: u16, err: ApiError) -> Self {
        if err.code.is_auth() {
            ClientError::Unauthorized(err.message)
        } else {
            ClientError::Rejected {
                status,
                message: err.message,
            }
        }
    }

    /// The session is no longer usable; the caller must log in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthorized(_) | ClientError::NotAuthenticated
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::NetworkFailure(_)
                | ClientError::InvalidResponse(_)
                | ClientError::Superseded(_)
        ) || matches!(self, ClientError::Rejected { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ClientError::InvalidResponse(value.to_string())
        } else if let Some(status) = value.status() {
            ClientError::from_api_error(
                status.as_u16(),
                ApiError::from_response(status.as_u16(), ""),
            )
        } else {
            ClientError::NetworkFailure(value.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(value: url::ParseError) -> Self {
        ClientError::InvalidConfig(value.to_string())
    }
}
