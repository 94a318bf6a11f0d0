//! Handler error types.
//!
//! All errors are fail-fast: a failed `initialize` leaves the handler
//! uninitialized, a failed request propagates to its caller unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised during model loading or request handling.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("missing model artifact: {0}")]
    MissingArtifact(PathBuf),

    #[error("missing class definition file: {0}")]
    MissingClassDefinition(PathBuf),

    #[error("expected exactly one model class in module '{module}', found {found}")]
    AmbiguousModelDefinition { module: String, found: usize },

    #[error("parameter state mismatch: {0}")]
    ParameterMismatch(String),

    #[error("unsupported execution api '{0}' (expected \"native\" or \"foreign\")")]
    UnsupportedExecutionApi(String),

    #[error("eager models are not supported by the foreign execution api")]
    UnsupportedCombination,

    #[error("keyword arguments are not supported by the foreign execution api")]
    UnsupportedArguments,

    #[error("handler is not initialized")]
    NotInitialized,

    #[error("handler is already initialized")]
    AlreadyInitialized,

    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    /// Returns true if this error is a deployment configuration problem
    /// rather than a bad artifact or request.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedExecutionApi(_)
                | Self::UnsupportedCombination
                | Self::InvalidManifest(_)
        )
    }
}
