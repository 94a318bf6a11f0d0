//! Parameter-state artifacts and strict restore checking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::HandlerError;

use super::artifact::MappedArtifact;

/// One named parameter tensor as stored in an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl ParamTensor {
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// The learned weights of a model: named, shaped numeric tensors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    pub tensors: BTreeMap<String, ParamTensor>,
}

impl StateDict {
    /// Decode a parameter-state artifact from disk.
    pub fn from_file(path: &Path) -> Result<Self, HandlerError> {
        let mapped = MappedArtifact::open(path)?;
        let state: Self = serde_json::from_slice(mapped.as_bytes())
            .map_err(|e| HandlerError::InvalidArtifact(format!("parameter state: {e}")))?;
        state.validate()?;
        Ok(state)
    }

    /// Check internal consistency: every tensor's data matches its shape.
    pub fn validate(&self) -> Result<(), HandlerError> {
        for (name, tensor) in &self.tensors {
            if tensor.data.len() != tensor.numel() {
                return Err(HandlerError::InvalidArtifact(format!(
                    "parameter '{name}': shape {:?} does not describe {} elements",
                    tensor.shape,
                    tensor.data.len()
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamTensor> {
        self.tensors.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: ParamTensor) {
        self.tensors.insert(name.into(), tensor);
    }

    /// Strict key-and-shape check against a module's expected parameters.
    ///
    /// Any missing key, unexpected key, or shape disagreement fails the
    /// whole restore.
    pub fn check_strict(
        &self,
        expected: &BTreeMap<String, Vec<usize>>,
    ) -> Result<(), HandlerError> {
        let missing: Vec<&str> = expected
            .keys()
            .filter(|k| !self.tensors.contains_key(*k))
            .map(String::as_str)
            .collect();
        let unexpected: Vec<&str> = self
            .tensors
            .keys()
            .filter(|k| !expected.contains_key(*k))
            .map(String::as_str)
            .collect();
        let mismatched: Vec<String> = expected
            .iter()
            .filter_map(|(k, shape)| {
                let stored = self.tensors.get(k)?;
                (&stored.shape != shape).then(|| {
                    format!("'{k}' expected {:?}, got {:?}", shape, stored.shape)
                })
            })
            .collect();

        if missing.is_empty() && unexpected.is_empty() && mismatched.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing keys {missing:?}"));
        }
        if !unexpected.is_empty() {
            parts.push(format!("unexpected keys {unexpected:?}"));
        }
        if !mismatched.is_empty() {
            parts.push(format!("shape mismatches [{}]", mismatched.join(", ")));
        }
        Err(HandlerError::ParameterMismatch(parts.join("; ")))
    }
}
