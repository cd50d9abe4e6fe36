// src/error.rs
use thiserror::Error;

/// Failures the aggregation core can produce.
///
/// Only `ClientInput` ever fails a whole aggregate request; everything else is
/// contained at the fan-out boundary and reported per source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    ClientInput(String),

    #[error("{message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },

    #[error("{0}")]
    Parse(String),
}

impl AggregatorError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            status: None,
        }
    }

    pub fn upstream_status(status: u16) -> Self {
        Self::Upstream {
            message: format!("Request failed with status {status}"),
            status: Some(status),
        }
    }

    /// Upstream HTTP status, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

pub type AggregatorResult<T> = Result<T, AggregatorError>;
