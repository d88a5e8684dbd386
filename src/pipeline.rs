use crate::db::executor::{ExecuteError, QueryExecutor, Scalar};
use crate::llm::prompt::build_conversation;
use crate::llm::{CompletionClient, GatewayError};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Failure of any stage of the question pipeline. The dispatcher collapses
/// this to one user-facing apology; the detail only reaches the log.
#[derive(Debug)]
pub enum PipelineError {
    Gateway(GatewayError),
    Execute(ExecuteError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Gateway(e) => write!(f, "{}", e),
            PipelineError::Execute(e) => write!(f, "{}", e),
        }
    }
}

impl Error for PipelineError {}

impl From<GatewayError> for PipelineError {
    fn from(e: GatewayError) -> Self {
        PipelineError::Gateway(e)
    }
}

impl From<ExecuteError> for PipelineError {
    fn from(e: ExecuteError) -> Self {
        PipelineError::Execute(e)
    }
}

/// Stateless question-to-number pipeline: prompt, completion, validation,
/// scalar execution. Each call is independent; concurrent calls share
/// nothing but the connection pool.
pub struct Pipeline {
    llm: Arc<dyn CompletionClient>,
    executor: QueryExecutor,
}

impl Pipeline {
    pub fn new(llm: Arc<dyn CompletionClient>, executor: QueryExecutor) -> Self {
        Self { llm, executor }
    }

    pub async fn answer(&self, question: &str) -> Result<Scalar, PipelineError> {
        let conversation = build_conversation(question);
        let sql = self.llm.complete(&conversation).await?;
        debug!("Executing generated SQL: {}", sql);
        let value = self.executor.execute_scalar(&sql).await?;
        Ok(value)
    }
}
