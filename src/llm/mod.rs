pub mod prompt;
pub mod yandex;

use crate::llm::prompt::ChatTurn;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

/// Failure of the upstream completion call.
#[derive(Debug)]
pub enum GatewayError {
    /// Required credentials are missing or blank.
    Config(String),
    /// Transport-level failure before a response arrived.
    Connection(String),
    /// The request exceeded its deadline.
    Timeout,
    /// Non-success HTTP status; the raw body is kept for diagnostics.
    Status { status: u16, body: String },
    /// The body arrived but its shape or content was unusable.
    Response(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Config(msg) => write!(f, "LLM configuration error: {}", msg),
            GatewayError::Connection(msg) => write!(f, "LLM connection error: {}", msg),
            GatewayError::Timeout => write!(f, "LLM request timed out"),
            GatewayError::Status { status, body } => {
                write!(f, "LLM responded with status {}: {}", status, body)
            }
            GatewayError::Response(msg) => write!(f, "LLM response error: {}", msg),
        }
    }
}

impl Error for GatewayError {}

/// Seam between the pipeline and the completion backend. The production
/// implementation is [`yandex::YandexGptClient`]; tests substitute a canned
/// client.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends the conversation and returns cleaned candidate SQL.
    async fn complete(&self, conversation: &[ChatTurn]) -> Result<String, GatewayError>;
}
