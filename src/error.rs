use thiserror::Error;

use crate::orchestration::PartialExecution;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Provider {provider} failed: {message}")]
    ProviderInvocation { provider: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Orchestration failed: task {task_id} via {agent}: {message}")]
    Orchestration {
        task_id: String,
        agent: String,
        message: String,
        partial: Box<PartialExecution>,
    },

    #[error("Invalid task transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl Error {
    /// Shorthand for a provider-side failure.
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        Error::ProviderInvocation {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Partial results attached to an aborted orchestration, if any.
    pub fn partial(&self) -> Option<&PartialExecution> {
        match self {
            Error::Orchestration { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
