use crate::database::error::StoreError;
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Gateway setting missing or empty: {name}")]
    Configuration { name: String },

    #[error("Gateway authentication failed: {message}")]
    UpstreamAuth { message: String },

    #[error("Gateway unreachable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Push request rejected: {message}")]
    InitiationRejected { message: String },

    #[error("Malformed callback payload: {message}")]
    MalformedCallback { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PaymentError {
    pub fn configuration(name: impl Into<String>) -> Self {
        Self::Configuration { name: name.into() }
    }

    pub fn upstream_auth(message: impl Into<String>) -> Self {
        Self::UpstreamAuth {
            message: message.into(),
        }
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    pub fn initiation_rejected(message: impl Into<String>) -> Self {
        Self::InitiationRejected {
            message: message.into(),
        }
    }

    pub fn malformed_callback(message: impl Into<String>) -> Self {
        Self::MalformedCallback {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::upstream_unavailable("request timed out")
        } else {
            PaymentError::upstream_unavailable(format!("Request error: {}", err))
        }
    }
}
