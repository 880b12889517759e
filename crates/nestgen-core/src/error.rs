use thiserror::Error;

use crate::validation::Violation;

/// Core error type shared across nestgen crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A type descriptor violates a local invariant.
    #[error("invalid type: {0}")]
    InvalidType(String),
    /// A form descriptor violates a local invariant.
    #[error("invalid form: {0}")]
    InvalidForm(String),
    /// A dtype name could not be parsed.
    #[error("unsupported dtype: {0}")]
    InvalidDType(String),
    /// Buffers could not be materialized against a form.
    #[error("invalid buffers: {0}")]
    InvalidBuffers(String),
    /// A materialized value failed validation.
    #[error("invalid value: {0}")]
    InvalidValue(#[from] Violation),
}

/// Convenience alias for results returned by nestgen crates.
pub type Result<T> = std::result::Result<T, Error>;
