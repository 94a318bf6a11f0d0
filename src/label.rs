//! Label mapping for classifiers: predicted index to human-readable label.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::HandlerError;

/// File name looked up under the model directory.
pub const LABEL_MAPPING_FILE: &str = "index_to_name.json";

/// Read-only mapping from stringified class index to label. May be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMapping {
    labels: HashMap<String, String>,
}

impl LabelMapping {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `index_to_name.json` from the model directory.
    ///
    /// An absent file is not an error; the mapping just stays empty.
    /// A present but malformed file is.
    pub fn load(model_dir: &Path) -> Result<Self, HandlerError> {
        let path = model_dir.join(LABEL_MAPPING_FILE);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no label mapping file");
            return Ok(Self::empty());
        }

        let content = std::fs::read_to_string(&path)?;
        let raw: serde_json::Map<String, Value> = serde_json::from_str(&content)
            .map_err(|e| HandlerError::InvalidArtifact(format!("label mapping: {e}")))?;

        let mut labels = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let label = match value {
                Value::String(s) => s,
                // Some exporters emit ["synset_id", "label"]; the label is last.
                Value::Array(items) => items
                    .last()
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        HandlerError::InvalidArtifact(format!(
                            "label mapping: entry '{key}' has no string label"
                        ))
                    })?,
                other => {
                    return Err(HandlerError::InvalidArtifact(format!(
                        "label mapping: entry '{key}' is {other}, expected string or array"
                    )))
                }
            };
            labels.insert(key, label);
        }
        Ok(Self { labels })
    }

    /// Label for a predicted class index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.get_key(&index.to_string())
    }

    /// Label for a raw string key.
    pub fn get_key(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}
