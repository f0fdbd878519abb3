use advisor_models::Domain;
use thiserror::Error;

/// Registration-time and programming errors. Never expected while serving requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool {name:?} is already registered for domain {domain}")]
    DuplicateTool { domain: Domain, name: String },

    #[error("No tool {name:?} registered for domain {domain}")]
    UnknownTool { domain: Domain, name: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Data provider unavailable: {0}")]
    Unavailable(String),

    #[error("No data for ticker {0}")]
    UnknownTicker(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::Json(e.to_string())
    }
}
