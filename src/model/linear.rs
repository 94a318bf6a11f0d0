//! A single-layer eager classifier.
//!
//! The architecture lives in code; the weights arrive separately through a
//! strict state-dict restore. This is the in-crate example of a model class
//! resolvable through the [`ModuleRegistry`](super::ModuleRegistry).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::device::Device;
use crate::error::HandlerError;
use crate::tensor::Tensor;

use super::module::{InvokeArgs, Module};
use super::state_dict::StateDict;

pub struct LinearClassifier {
    in_features: usize,
    out_features: usize,
    /// Row-major `[out][in]`.
    weight: Vec<Vec<f32>>,
    bias: Vec<f32>,
    device: Device,
    train: AtomicBool,
}

impl LinearClassifier {
    /// Construct with zeroed parameters; call `load_state_dict` to restore.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self {
            in_features,
            out_features,
            weight: vec![vec![0.0; in_features]; out_features],
            bias: vec![0.0; out_features],
            device: Device::Cpu,
            train: AtomicBool::new(true),
        }
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for LinearClassifier {
    fn forward(&self, input: &Tensor, _args: &InvokeArgs) -> Result<Tensor, HandlerError> {
        let mut data = Vec::with_capacity(input.num_rows() * self.out_features);
        for row in input.rows() {
            if row.len() != self.in_features {
                return Err(HandlerError::InvalidInput(format!(
                    "expected {} features, got {}",
                    self.in_features,
                    row.len()
                )));
            }
            for (w, b) in self.weight.iter().zip(&self.bias) {
                data.push(w.iter().zip(row).map(|(x, y)| x * y).sum::<f32>() + b);
            }
        }
        let shape = if input.shape().len() > 1 {
            vec![input.num_rows(), self.out_features]
        } else {
            vec![self.out_features]
        };
        Ok(Tensor::new(data, shape)?.to_device(self.device))
    }

    fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>> {
        BTreeMap::from([
            ("fc.weight".to_string(), vec![self.out_features, self.in_features]),
            ("fc.bias".to_string(), vec![self.out_features]),
        ])
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<(), HandlerError> {
        state.check_strict(&self.parameter_shapes())?;
        // check_strict guarantees both keys exist with the right shapes.
        if let Some(weight) = state.get("fc.weight") {
            self.weight = weight
                .data
                .chunks(self.in_features)
                .map(<[f32]>::to_vec)
                .collect();
        }
        if let Some(bias) = state.get("fc.bias") {
            self.bias = bias.data.clone();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::state_dict::ParamTensor;

    fn restored() -> LinearClassifier {
        let mut model = LinearClassifier::new(3, 2);
        let mut state = StateDict::default();
        state.insert(
            "fc.weight",
            ParamTensor {
                shape: vec![2, 3],
                data: vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            },
        );
        state.insert("fc.bias", ParamTensor { shape: vec![2], data: vec![0.0, 1.0] });
        model.load_state_dict(&state).unwrap();
        model
    }

    #[test]
    fn forward_after_restore() {
        let model = restored();
        let input = Tensor::from_rows(vec![vec![1.0, 2.0, 3.0]]).unwrap();
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        assert_eq!(out.flatten(), &[1.0, 4.0]);
    }

    #[test]
    fn restore_rejects_extra_parameter() {
        let mut model = LinearClassifier::new(3, 2);
        let mut state = StateDict::default();
        state.insert("fc.weight", ParamTensor { shape: vec![2, 3], data: vec![0.0; 6] });
        state.insert("fc.bias", ParamTensor { shape: vec![2], data: vec![0.0; 2] });
        state.insert("other", ParamTensor { shape: vec![1], data: vec![0.0] });
        assert!(matches!(
            model.load_state_dict(&state),
            Err(HandlerError::ParameterMismatch(_))
        ));
    }

    #[test]
    fn forward_rejects_wrong_feature_count() {
        let model = restored();
        let input = Tensor::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            model.forward(&input, &InvokeArgs::none()),
            Err(HandlerError::InvalidInput(_))
        ));
    }

    #[test]
    fn output_lands_on_model_device() {
        let mut model = restored();
        model.to_device(Device::Accelerator { index: 0 });
        let input = Tensor::from_rows(vec![vec![1.0, 2.0, 3.0]]).unwrap();
        let out = model.forward(&input, &InvokeArgs::none()).unwrap();
        assert_eq!(out.device(), Device::Accelerator { index: 0 });
    }
}
