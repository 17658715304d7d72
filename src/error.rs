use thiserror::Error;

use crate::intent::IntentId;
use crate::status::IntentState;

/// Errors returned by the Dexter SDK
#[derive(Debug, Error)]
pub enum Error {
    /// Credential material was malformed or the chain endpoint rejected the session
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// An operation needing a signing session ran without one
    #[error("NotConnected")]
    NotConnected,

    /// The chain, the contract, or the transport rejected an execution
    #[error("Execution error: {reason}")]
    Execution { reason: String },

    #[error("Intent {0} is already registered")]
    DuplicateIntent(IntentId),

    #[error("Invalid transition for intent {intent_id}: {from} -> {to}")]
    InvalidTransition {
        intent_id: IntentId,
        from: IntentState,
        to: IntentState,
    },

    #[error("Intent {0} is not registered")]
    UnknownIntent(IntentId),

    /// Payload failed validation at construction time
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap any downstream rejection as an execution failure
    pub fn execution(reason: impl Into<String>) -> Self {
        Error::Execution {
            reason: reason.into(),
        }
    }

    /// Reason string recorded on a failed intent status
    pub fn failure_reason(&self) -> String {
        match self {
            Error::NotConnected => "NotConnected".to_string(),
            Error::Execution { reason } => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
