//! Loading-strategy selection: the decision table over `(api, model_file)`.

use crate::device::ExecutionApi;
use crate::error::HandlerError;

/// Exactly one loading path per validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Registry-resolved class plus strict parameter restore, in-process.
    NativeEager { model_file: String },
    /// Compiled-graph artifact, in-process.
    NativeGraph,
    /// Compiled-graph artifact through the foreign binding.
    ForeignGraph,
}

impl LoadStrategy {
    /// Select the loading path. Total over the validated input space:
    /// every `(api, model_file)` pair maps to one strategy or one error.
    pub fn select(api: ExecutionApi, model_file: Option<&str>) -> Result<Self, HandlerError> {
        match (api, model_file) {
            (ExecutionApi::Native, Some(file)) => Ok(Self::NativeEager {
                model_file: file.to_string(),
            }),
            (ExecutionApi::Native, None) => Ok(Self::NativeGraph),
            (ExecutionApi::Foreign, Some(_)) => Err(HandlerError::UnsupportedCombination),
            (ExecutionApi::Foreign, None) => Ok(Self::ForeignGraph),
        }
    }
}

/// Module name is the class-definition file name minus its extension.
pub(crate) fn module_stem(file: &str) -> &str {
    file.split('.').next().unwrap_or(file)
}
