//! Compiled-graph artifacts: self-describing, executable op sequences.
//!
//! A graph artifact needs no class definition to load; the op list carries
//! its own parameters. This is the only format the foreign binding accepts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::device::Device;
use crate::error::HandlerError;
use crate::inference_mode;
use crate::tensor::Tensor;

use super::artifact::MappedArtifact;
use super::module::{InvokeArgs, Module};
use super::state_dict::{ParamTensor, StateDict};

/// One operation in a compiled graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum GraphOp {
    /// Dense layer: `weight` is row-major `[out][in]`.
    Linear { weight: Vec<Vec<f32>>, bias: Vec<f32> },
    Relu,
    Softmax,
    /// Training-only regularization; identity in eval or no-grad scopes.
    Dropout { p: f32 },
}

fn default_version() -> u32 {
    1
}

/// Serialized form of a compiled graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default = "default_version")]
    pub version: u32,
    pub ops: Vec<GraphOp>,
}

/// An executable compiled-graph model.
pub struct GraphModel {
    spec: GraphSpec,
    device: Device,
    train: AtomicBool,
}

impl GraphModel {
    /// Build a model from a validated spec.
    pub fn from_spec(spec: GraphSpec) -> Result<Self, HandlerError> {
        for (index, op) in spec.ops.iter().enumerate() {
            match op {
                GraphOp::Linear { weight, bias } => {
                    let in_dim = weight.first().map(Vec::len).unwrap_or(0);
                    if in_dim == 0 {
                        return Err(HandlerError::InvalidArtifact(format!(
                            "op {index}: linear weight is empty"
                        )));
                    }
                    if weight.iter().any(|row| row.len() != in_dim) {
                        return Err(HandlerError::InvalidArtifact(format!(
                            "op {index}: ragged linear weight"
                        )));
                    }
                    if bias.len() != weight.len() {
                        return Err(HandlerError::InvalidArtifact(format!(
                            "op {index}: bias length {} does not match {} output rows",
                            bias.len(),
                            weight.len()
                        )));
                    }
                }
                GraphOp::Dropout { p } => {
                    if !(0.0..1.0).contains(p) {
                        return Err(HandlerError::InvalidArtifact(format!(
                            "op {index}: dropout p {p} outside [0, 1)"
                        )));
                    }
                }
                GraphOp::Relu | GraphOp::Softmax => {}
            }
        }
        Ok(Self {
            spec,
            device: Device::Cpu,
            train: AtomicBool::new(true),
        })
    }

    /// Decode a compiled-graph artifact from disk, mapped to `device`.
    pub fn load(path: &Path, device: Device) -> Result<Self, HandlerError> {
        let mapped = MappedArtifact::open(path)?;
        let spec: GraphSpec = serde_json::from_slice(mapped.as_bytes())
            .map_err(|e| HandlerError::InvalidArtifact(format!("compiled graph: {e}")))?;
        let mut model = Self::from_spec(spec)?;
        model.device = device;
        Ok(model)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn is_train(&self) -> bool {
        self.train.load(Ordering::Relaxed)
    }

    fn forward_row(&self, row: &[f32]) -> Result<Vec<f32>, HandlerError> {
        let mut values = row.to_vec();
        for (index, op) in self.spec.ops.iter().enumerate() {
            values = match op {
                GraphOp::Linear { weight, bias } => {
                    let in_dim = weight[0].len();
                    if values.len() != in_dim {
                        return Err(HandlerError::InvalidInput(format!(
                            "op {index}: expected {in_dim} features, got {}",
                            values.len()
                        )));
                    }
                    weight
                        .iter()
                        .zip(bias)
                        .map(|(w, b)| w.iter().zip(&values).map(|(x, y)| x * y).sum::<f32>() + b)
                        .collect()
                }
                GraphOp::Relu => values.iter().map(|v| v.max(0.0)).collect(),
                GraphOp::Softmax => softmax(&values),
                GraphOp::Dropout { p } => {
                    if self.is_train() && inference_mode::grad_enabled() {
                        // No RNG in this runtime; training mode applies the
                        // expected scale instead of a sampled mask.
                        values.iter().map(|v| v * (1.0 - p)).collect()
                    } else {
                        values
                    }
                }
            };
        }
        Ok(values)
    }
}

fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

impl Module for GraphModel {
    fn forward(&self, input: &Tensor, _args: &InvokeArgs) -> Result<Tensor, HandlerError> {
        let mut out_rows = Vec::with_capacity(input.num_rows());
        for row in input.rows() {
            out_rows.push(self.forward_row(row)?);
        }
        let out_len = out_rows.first().map(Vec::len).unwrap_or(0);
        let data: Vec<f32> = out_rows.into_iter().flatten().collect();
        let shape = if input.shape().len() > 1 {
            vec![input.num_rows(), out_len]
        } else {
            vec![out_len]
        };
        Ok(Tensor::new(data, shape)?.to_device(self.device))
    }

    fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>> {
        let mut shapes = BTreeMap::new();
        for (index, op) in self.spec.ops.iter().enumerate() {
            if let GraphOp::Linear { weight, bias } = op {
                shapes.insert(format!("{index}.weight"), vec![weight.len(), weight[0].len()]);
                shapes.insert(format!("{index}.bias"), vec![bias.len()]);
            }
        }
        shapes
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<(), HandlerError> {
        state.check_strict(&self.parameter_shapes())?;
        for (index, op) in self.spec.ops.iter_mut().enumerate() {
            if let GraphOp::Linear { weight, bias } = op {
                let stored_weight = lookup(state, &format!("{index}.weight"))?;
                let stored_bias = lookup(state, &format!("{index}.bias"))?;
                let in_dim = weight[0].len();
                *weight = stored_weight.data.chunks(in_dim).map(<[f32]>::to_vec).collect();
                *bias = stored_bias.data.clone();
            }
        }
        Ok(())
    }

    fn set_train(&self, train: bool) {
        self.train.store(train, Ordering::Relaxed);
    }

    fn to_device(&mut self, device: Device) {
        self.device = device;
    }
}

fn lookup<'a>(state: &'a StateDict, name: &str) -> Result<&'a ParamTensor, HandlerError> {
    state
        .get(name)
        .ok_or_else(|| HandlerError::ParameterMismatch(format!("missing keys [\"{name}\"]")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference_mode::InferenceGuard;

    fn identity_ish_spec() -> GraphSpec {
        GraphSpec {
            version: 1,
            ops: vec![GraphOp::Linear {
                weight: vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
                bias: vec![0.5, -0.5],
            }],
        }
    }

    #[test]
    fn forward_applies_linear_layer() {
        let model = GraphModel::from_spec(identity_ish_spec()).unwrap();
        let input = Tensor::from_rows(vec![vec![1.0, 2.0, 3.0]]).unwrap();
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        assert_eq!(out.shape(), &[1, 2]);
        assert_eq!(out.flatten(), &[1.5, 1.5]);
    }

    #[test]
    fn forward_preserves_one_dimensional_shape() {
        let model = GraphModel::from_spec(identity_ish_spec()).unwrap();
        let input = Tensor::new(vec![1.0, 2.0, 3.0], vec![3]).unwrap();
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        assert_eq!(out.shape(), &[2]);
    }

    #[test]
    fn forward_rejects_wrong_width() {
        let model = GraphModel::from_spec(identity_ish_spec()).unwrap();
        let input = Tensor::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        let result = model.forward(&input, &InvokeArgs::none());
        assert!(matches!(result, Err(HandlerError::InvalidInput(_))));
    }

    #[test]
    fn relu_and_softmax_compose() {
        let spec = GraphSpec {
            version: 1,
            ops: vec![
                GraphOp::Linear {
                    weight: vec![vec![1.0], vec![-1.0]],
                    bias: vec![0.0, 0.0],
                },
                GraphOp::Relu,
                GraphOp::Softmax,
            ],
        };
        let model = GraphModel::from_spec(spec).unwrap();
        let input = Tensor::new(vec![2.0], vec![1]).unwrap();
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        let sum: f32 = out.flatten().iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(out.flatten()[0] > out.flatten()[1]);
    }

    #[test]
    fn dropout_is_identity_under_inference_guard() {
        let spec = GraphSpec {
            version: 1,
            ops: vec![GraphOp::Dropout { p: 0.5 }],
        };
        let model = GraphModel::from_spec(spec).unwrap();
        let input = Tensor::new(vec![2.0], vec![1]).unwrap();

        // Train mode with gradients enabled scales.
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        assert_eq!(out.flatten(), &[1.0]);

        // Same model under a no-grad scope passes through.
        let _guard = InferenceGuard::new();
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        assert_eq!(out.flatten(), &[2.0]);
    }

    #[test]
    fn dropout_is_identity_in_eval_mode() {
        let spec = GraphSpec {
            version: 1,
            ops: vec![GraphOp::Dropout { p: 0.5 }],
        };
        let model = GraphModel::from_spec(spec).unwrap();
        model.set_train(false);
        let input = Tensor::new(vec![2.0], vec![1]).unwrap();
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        assert_eq!(out.flatten(), &[2.0]);
    }

    #[test]
    fn spec_validation_rejects_ragged_weight() {
        let spec = GraphSpec {
            version: 1,
            ops: vec![GraphOp::Linear {
                weight: vec![vec![1.0, 2.0], vec![3.0]],
                bias: vec![0.0, 0.0],
            }],
        };
        assert!(matches!(
            GraphModel::from_spec(spec),
            Err(HandlerError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn state_dict_round_trips_into_graph() {
        let mut model = GraphModel::from_spec(identity_ish_spec()).unwrap();
        let mut state = StateDict::default();
        state.insert(
            "0.weight",
            ParamTensor { shape: vec![2, 3], data: vec![1.0; 6] },
        );
        state.insert("0.bias", ParamTensor { shape: vec![2], data: vec![0.0; 2] });
        model.load_state_dict(&state).unwrap();

        let input = Tensor::new(vec![1.0, 1.0, 1.0], vec![3]).unwrap();
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        assert_eq!(out.flatten(), &[3.0, 3.0]);
    }

    #[test]
    fn state_dict_with_wrong_shape_is_rejected() {
        let mut model = GraphModel::from_spec(identity_ish_spec()).unwrap();
        let mut state = StateDict::default();
        state.insert(
            "0.weight",
            ParamTensor { shape: vec![3, 2], data: vec![1.0; 6] },
        );
        state.insert("0.bias", ParamTensor { shape: vec![2], data: vec![0.0; 2] });
        assert!(matches!(
            model.load_state_dict(&state),
            Err(HandlerError::ParameterMismatch(_))
        ));
    }

    #[test]
    fn artifact_json_decodes_tagged_ops() {
        let json = r#"{"ops":[{"op":"linear","weight":[[1.0,0.0]],"bias":[0.0]},{"op":"relu"}]}"#;
        let spec: GraphSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.version, 1);
        assert_eq!(spec.ops.len(), 2);
    }
}
