use nestgen_core::Violation;
use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Options or constraints are unusable; raised before any recursion.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A handle was resolved outside the scope that registered it.
    #[error("unregistered handle: {0}")]
    UnregisteredHandle(String),
    /// The engine assembled a node that fails validation.
    #[error("internal consistency violation: {0}")]
    Internal(Violation),
    #[error("core error: {0}")]
    Core(#[from] nestgen_core::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;
