// src/settle.rs
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::error::AggregatorError;

/// Outcome of one fan-out branch: serializes to `{"data": ...}` or
/// `{"error": "..."}`, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettledOutcome {
    Data(Value),
    Error(String),
}

impl SettledOutcome {
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Data(v) => Some(v),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Data(_) => None,
            Self::Error(e) => Some(e),
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            Self::Data(v) => Some(v),
            Self::Error(_) => None,
        }
    }
}

/// Await one provider operation and fold any failure, panics included, into
/// `SettledOutcome::Error`.
pub async fn settle<F, T>(op: F) -> SettledOutcome
where
    F: Future<Output = Result<T, AggregatorError>>,
    T: Into<Value>,
{
    match AssertUnwindSafe(op).catch_unwind().await {
        Ok(Ok(v)) => SettledOutcome::Data(v.into()),
        Ok(Err(e)) => SettledOutcome::Error(e.to_string()),
        Err(panic) => SettledOutcome::Error(panic_message(panic.as_ref())),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "provider task panicked".to_string()
    }
}
