//! In-process execution of a loaded model.

use crate::error::HandlerError;
use crate::model::{InvokeArgs, Module};
use crate::tensor::Tensor;

/// Owns the loaded model and invokes it directly.
pub struct NativeBackend {
    model: Box<dyn Module>,
}

impl NativeBackend {
    pub fn new(model: Box<dyn Module>) -> Self {
        Self { model }
    }

    /// Invoke the model with the input and all extras, unrestricted.
    pub fn invoke(&self, input: &Tensor, args: &InvokeArgs) -> Result<Tensor, HandlerError> {
        self.model.forward(input, args)
    }

    pub fn model(&self) -> &dyn Module {
        self.model.as_ref()
    }
}
