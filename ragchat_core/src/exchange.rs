//! Contract of the remote question-answering exchange.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SessionId;

/// Body of an `/ask` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub session_id: SessionId,
}

impl AskRequest {
    #[must_use]
    pub fn new(question: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            question: question.into(),
            session_id,
        }
    }
}

/// Successful answer from the remote side.
///
/// Only `answer` is consumed by the conversation core. `sources` is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<serde_json::Value>>,
}

impl AskResponse {
    #[must_use]
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: None,
        }
    }
}

/// Any way an exchange can fail. Callers treat every variant alike.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Session unavailable: {0}")]
    Session(String),
}

#[async_trait]
pub trait Exchange: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ExchangeError>;
}

#[async_trait]
impl<T: Exchange + ?Sized> Exchange for Arc<T> {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        (**self).ask(request).await
    }
}
