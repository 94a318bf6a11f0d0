//! Execution backends: the closed set of inference dispatch targets.
//!
//! Exactly two variants exist, selected once at initialize time and
//! immutable for the handler's lifetime. The native backend invokes the
//! loaded model in-process; the foreign backend proxies through a binding
//! module with a positional-only call interface.

mod foreign;
mod native;

pub use foreign::{ForeignBackend, ForeignHandle, ForeignInterface, ForeignModule};
pub use native::NativeBackend;

use crate::error::HandlerError;
use crate::model::InvokeArgs;
use crate::tensor::Tensor;

/// Backend output in its native shape; conversion is postprocess's job.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Native(Tensor),
    Foreign(Vec<f32>),
}

impl RawOutput {
    /// Flatten into a plain ordered numeric sequence, order-preserving.
    pub fn flatten(&self) -> Vec<f32> {
        match self {
            RawOutput::Native(tensor) => tensor.flatten().to_vec(),
            RawOutput::Foreign(values) => values.clone(),
        }
    }
}

/// The two structurally different execution paths.
pub enum ExecutionBackend {
    Native(NativeBackend),
    Foreign(ForeignBackend),
}

impl ExecutionBackend {
    /// Route an invocation to the selected backend.
    pub fn invoke(&self, input: &Tensor, args: &InvokeArgs) -> Result<RawOutput, HandlerError> {
        match self {
            ExecutionBackend::Native(backend) => {
                backend.invoke(input, args).map(RawOutput::Native)
            }
            ExecutionBackend::Foreign(backend) => {
                backend.invoke(input, args).map(RawOutput::Foreign)
            }
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, ExecutionBackend::Native(_))
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self, ExecutionBackend::Foreign(_))
    }
}
