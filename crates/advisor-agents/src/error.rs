use advisor_models::{FailureKind, RequestError};
use advisor_tools::RegistryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Reasoning backend error: {0}")]
    Backend(String),

    #[error("Agent response parse error: {0}")]
    Parse(String),

    #[error("Agent timed out after {0} seconds")]
    Timeout(u64),

    #[error("Agent disabled: {0}")]
    Disabled(String),

    #[error("Invalid analysis request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Analysis cancelled before dispatch")]
    Cancelled,

    #[error("Tool registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// How a worker that hit this error is reported.
    ///
    /// `None` for request-level errors that never reach a worker. Workers turn
    /// `Timeout` into `WorkerOutcome::TimedOut` rather than a `Failed` outcome.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AgentError::Cli(_) | AgentError::Backend(_) | AgentError::Json(_) => {
                Some(FailureKind::BackendUnavailable)
            }
            AgentError::Parse(_) | AgentError::Registry(_) => Some(FailureKind::MalformedReport),
            AgentError::Timeout(_) => Some(FailureKind::TimedOut),
            AgentError::Disabled(_) => Some(FailureKind::Disabled),
            AgentError::InvalidRequest(_) | AgentError::Cancelled => None,
        }
    }
}
