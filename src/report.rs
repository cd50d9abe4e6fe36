// src/report.rs
use serde::Serialize;

/// One failed branch of an aggregate response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceError {
    pub source: String,
    pub message: String,
}

impl SourceError {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Ok,
    Partial,
}

impl AggregateStatus {
    /// `partial` iff at least one branch failed.
    pub fn from_errors(errors: &[SourceError]) -> Self {
        if errors.is_empty() {
            Self::Ok
        } else {
            Self::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
        }
    }
}
