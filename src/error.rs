//! Error types for the financial copilot agents

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Boundary Errors
    // =============================

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Dataset error: {0}")]
    DatasetError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Settings decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Settings encoding error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl AgentError {
    /// Errors caused by malformed caller input rather than upstream failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidSettings(_)
                | AgentError::InvalidState(_)
                | AgentError::Base64Error(_)
                | AgentError::Utf8Error(_)
        )
    }
}
