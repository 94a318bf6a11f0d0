//! The `Module` trait: the executable-model seam.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::device::Device;
use crate::error::HandlerError;
use crate::tensor::Tensor;

use super::state_dict::StateDict;

/// Extra arguments forwarded alongside the input tensor.
///
/// The native backend forwards both positional and keyword extras
/// unrestricted; the foreign binding accepts positional extras only.
#[derive(Debug, Clone, Default)]
pub struct InvokeArgs {
    pub positional: Vec<Tensor>,
    pub keywords: HashMap<String, Value>,
}

impl InvokeArgs {
    /// No extras: the common case for the default pipeline.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_positional(positional: Vec<Tensor>) -> Self {
        Self { positional, keywords: HashMap::new() }
    }

    pub fn with_keyword(mut self, key: impl Into<String>, value: Value) -> Self {
        self.keywords.insert(key.into(), value);
        self
    }

    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }
}

/// An executable model: forward pass plus parameter-state management.
///
/// Implementations must be safe for concurrent read-only use; `forward`
/// takes `&self` and the train flag is interior-mutable.
pub trait Module: Send + Sync {
    /// Run the model on an input tensor.
    fn forward(&self, input: &Tensor, args: &InvokeArgs) -> Result<Tensor, HandlerError>;

    /// Names and shapes of the parameters this module expects to restore.
    fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>>;

    /// Restore parameter state with strict key-and-shape matching.
    fn load_state_dict(&mut self, state: &StateDict) -> Result<(), HandlerError>;

    /// Switch between training and eval mode.
    fn set_train(&self, train: bool);

    /// Move the module's parameters and outputs to a device.
    fn to_device(&mut self, device: Device);
}
