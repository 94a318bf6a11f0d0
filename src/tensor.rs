//! Dense tensors for the request pipeline.
//!
//! Just enough tensor to carry a batch of rows through preprocess,
//! inference, and postprocess: f32 storage, a shape, and a device tag.

use serde_json::Value;

use crate::device::Device;
use crate::error::HandlerError;

/// A dense f32 tensor with a device placement tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
    device: Device,
}

impl Tensor {
    /// Build a tensor from flat data and a shape.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, HandlerError> {
        let numel: usize = shape.iter().product();
        if shape.is_empty() || numel != data.len() {
            return Err(HandlerError::InvalidInput(format!(
                "shape {:?} does not describe {} elements",
                shape,
                data.len()
            )));
        }
        Ok(Self { data, shape, device: Device::Cpu })
    }

    /// Build a 2-D tensor from rows of equal length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, HandlerError> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(HandlerError::InvalidInput("empty input batch".into()));
        }
        if rows.iter().any(|r| r.len() != width) {
            return Err(HandlerError::InvalidInput("ragged input rows".into()));
        }
        let height = rows.len();
        let data: Vec<f32> = rows.into_iter().flatten().collect();
        Self::new(data, vec![height, width])
    }

    /// Build a tensor from a raw JSON payload.
    ///
    /// Accepts a flat numeric array (1-D) or an array of equal-length
    /// numeric arrays (2-D). Anything else is rejected fail-closed.
    pub fn from_json(value: &Value) -> Result<Self, HandlerError> {
        let items = value
            .as_array()
            .ok_or_else(|| HandlerError::InvalidInput("payload must be a numeric array".into()))?;
        if items.is_empty() {
            return Err(HandlerError::InvalidInput("empty input payload".into()));
        }

        if items[0].is_array() {
            let rows = items
                .iter()
                .map(|row| {
                    row.as_array()
                        .ok_or_else(|| {
                            HandlerError::InvalidInput("mixed nesting in input payload".into())
                        })?
                        .iter()
                        .map(json_number)
                        .collect::<Result<Vec<f32>, _>>()
                })
                .collect::<Result<Vec<Vec<f32>>, _>>()?;
            Self::from_rows(rows)
        } else {
            let data = items.iter().map(json_number).collect::<Result<Vec<f32>, _>>()?;
            let len = data.len();
            Self::new(data, vec![len])
        }
    }

    /// Retag the tensor onto a device.
    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Length of the innermost dimension.
    pub fn row_len(&self) -> usize {
        *self.shape.last().unwrap_or(&0)
    }

    pub fn num_rows(&self) -> usize {
        if self.shape.len() > 1 { self.shape[0] } else { 1 }
    }

    /// Iterate rows along the innermost dimension. A 1-D tensor is one row.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(self.row_len().max(1))
    }

    /// Flat view of the contents, order-preserving.
    pub fn flatten(&self) -> &[f32] {
        &self.data
    }
}

fn json_number(value: &Value) -> Result<f32, HandlerError> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| HandlerError::InvalidInput(format!("non-numeric input element: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_from_nested_json() {
        let t = Tensor::from_json(&json!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.rows().count(), 2);
        assert_eq!(t.flatten(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn builds_from_flat_json() {
        let t = Tensor::from_json(&json!([1, 2, 3])).unwrap();
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.num_rows(), 1);
        assert_eq!(t.rows().next().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn rejects_ragged_rows() {
        let result = Tensor::from_json(&json!([[1.0, 2.0], [3.0]]));
        assert!(matches!(result, Err(HandlerError::InvalidInput(_))));
    }

    #[test]
    fn rejects_non_numeric_payloads() {
        assert!(Tensor::from_json(&json!("hello")).is_err());
        assert!(Tensor::from_json(&json!([1.0, "x"])).is_err());
        assert!(Tensor::from_json(&json!([])).is_err());
    }

    #[test]
    fn device_tag_moves_with_tensor() {
        let t = Tensor::new(vec![1.0], vec![1]).unwrap();
        assert_eq!(t.device(), Device::Cpu);
        let t = t.to_device(Device::Accelerator { index: 1 });
        assert_eq!(t.device(), Device::Accelerator { index: 1 });
    }

    #[test]
    fn shape_must_match_data() {
        assert!(Tensor::new(vec![1.0, 2.0], vec![3]).is_err());
        assert!(Tensor::new(vec![1.0, 2.0], vec![]).is_err());
    }
}
