//! Deployment context and manifest parsing.
//!
//! The serving frontend hands the handler a [`DeploymentContext`] describing
//! the model directory, the artifact set, and system properties. The context
//! is read-only at call time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::HandlerError;

/// Artifact set for one deployed model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub model: ModelEntry,
}

/// The `model` section of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Serialized artifact: either a compiled graph or a parameter-state blob.
    #[serde(rename = "serializedFile")]
    pub serialized_file: String,
    /// Optional class-definition module file. Presence selects eager loading.
    #[serde(rename = "modelFile", default, skip_serializing_if = "Option::is_none")]
    pub model_file: Option<String>,
}

impl Manifest {
    /// Load a manifest from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, HandlerError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, HandlerError> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| HandlerError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate manifest fields for correctness.
    pub fn validate(&self) -> Result<(), HandlerError> {
        if self.model.serialized_file.is_empty() {
            return Err(HandlerError::InvalidManifest(
                "serializedFile cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Class-definition file name, treating an empty string as absent.
    pub fn model_file(&self) -> Option<&str> {
        self.model.model_file.as_deref().filter(|f| !f.is_empty())
    }
}

/// System properties supplied by the serving frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemProperties {
    /// Accelerator index to place the model on, when one is available.
    #[serde(default)]
    pub gpu_id: Option<usize>,
    /// Execution-API selector: `"native"` or `"foreign"`. Validated during
    /// `initialize`, not at parse time.
    pub api_type: String,
}

impl SystemProperties {
    pub fn native() -> Self {
        Self { gpu_id: None, api_type: "native".into() }
    }

    pub fn foreign() -> Self {
        Self { gpu_id: None, api_type: "foreign".into() }
    }

    pub fn with_gpu(mut self, gpu_id: usize) -> Self {
        self.gpu_id = Some(gpu_id);
        self
    }
}

/// Everything the handler needs to load and serve one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentContext {
    pub model_dir: PathBuf,
    pub manifest: Manifest,
    pub system_properties: SystemProperties,
}

impl DeploymentContext {
    pub fn new(
        model_dir: impl Into<PathBuf>,
        manifest: Manifest,
        system_properties: SystemProperties,
    ) -> Self {
        Self {
            model_dir: model_dir.into(),
            manifest,
            system_properties,
        }
    }

    /// Full path of the serialized artifact.
    pub fn serialized_file_path(&self) -> PathBuf {
        self.model_dir.join(&self.manifest.model.serialized_file)
    }

    /// Full path of the class-definition file, if one is named.
    pub fn model_file_path(&self) -> Option<PathBuf> {
        self.manifest.model_file().map(|f| self.model_dir.join(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_parses_camel_case_keys() {
        let manifest = Manifest::from_json(
            r#"{"model": {"serializedFile": "model.pt", "modelFile": "model.py"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.model.serialized_file, "model.pt");
        assert_eq!(manifest.model_file(), Some("model.py"));
    }

    #[test]
    fn manifest_model_file_is_optional() {
        let manifest =
            Manifest::from_json(r#"{"model": {"serializedFile": "model.pt"}}"#).unwrap();
        assert_eq!(manifest.model_file(), None);
    }

    #[test]
    fn manifest_treats_empty_model_file_as_absent() {
        let manifest = Manifest::from_json(
            r#"{"model": {"serializedFile": "model.pt", "modelFile": ""}}"#,
        )
        .unwrap();
        assert_eq!(manifest.model_file(), None);
    }

    #[test]
    fn manifest_rejects_empty_serialized_file() {
        let result = Manifest::from_json(r#"{"model": {"serializedFile": ""}}"#);
        assert!(matches!(result, Err(HandlerError::InvalidManifest(_))));
    }

    #[test]
    fn context_resolves_artifact_paths() {
        let manifest = Manifest::from_json(
            r#"{"model": {"serializedFile": "model.pt", "modelFile": "model.py"}}"#,
        )
        .unwrap();
        let ctx = DeploymentContext::new("/srv/models/demo", manifest, SystemProperties::native());
        assert_eq!(
            ctx.serialized_file_path(),
            PathBuf::from("/srv/models/demo/model.pt")
        );
        assert_eq!(
            ctx.model_file_path(),
            Some(PathBuf::from("/srv/models/demo/model.py"))
        );
    }
}
