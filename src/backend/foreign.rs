//! Foreign-binding execution: proxied, positional-only invocation.
//!
//! The bundled binding module is process-wide state initialized once on
//! first use, mirroring the original compile-once interop cache. Its call
//! interface is narrower than the native path: an ordered parameter list,
//! no keyword arguments.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::device::{Device, MapLocation};
use crate::error::HandlerError;
use crate::model::{GraphModel, InvokeArgs, Module};
use crate::tensor::Tensor;

/// Opaque handle to a model owned by a foreign binding module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignHandle(u64);

impl ForeignHandle {
    /// Wrap a raw id. Bindings mint these; callers treat them as opaque.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Call interface of a foreign binding module.
///
/// Positional-only by contract: `run_model` receives an ordered parameter
/// list whose first element is the input tensor.
pub trait ForeignInterface: Send + Sync {
    /// Load a compiled-graph artifact and return an opaque model handle.
    fn load_model(
        &self,
        artifact: &Path,
        map_location: MapLocation,
        device: &str,
    ) -> Result<ForeignHandle, HandlerError>;

    /// Run a loaded model. `params` is `[input] + positional extras`.
    fn run_model(
        &self,
        handle: ForeignHandle,
        params: &[Tensor],
    ) -> Result<Vec<f32>, HandlerError>;
}

/// The bundled binding module.
pub struct ForeignModule {
    models: DashMap<u64, GraphModel>,
    next_id: AtomicU64,
}

static BUNDLED: OnceLock<Arc<ForeignModule>> = OnceLock::new();

impl ForeignModule {
    fn new() -> Self {
        Self {
            models: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Process-wide instance, initialized on first use and reused after.
    pub fn bundled() -> Arc<Self> {
        BUNDLED
            .get_or_init(|| {
                tracing::info!(
                    binding = %Self::binding_path().display(),
                    "initializing bundled foreign binding"
                );
                Arc::new(Self::new())
            })
            .clone()
    }

    /// Where the bundled binding lives: adjacent to the installed executable.
    fn binding_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("serve_core_bindings")))
            .unwrap_or_else(|| PathBuf::from("serve_core_bindings"))
    }

    pub fn loaded_models(&self) -> usize {
        self.models.len()
    }
}

impl ForeignInterface for ForeignModule {
    fn load_model(
        &self,
        artifact: &Path,
        map_location: MapLocation,
        device: &str,
    ) -> Result<ForeignHandle, HandlerError> {
        let target = match map_location {
            MapLocation::Cpu => Device::Cpu,
            MapLocation::Accelerator => {
                let index = device
                    .rsplit(':')
                    .next()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                Device::Accelerator { index }
            }
        };
        let model = GraphModel::load(artifact, target)?;
        model.set_train(false);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.models.insert(id, model);
        tracing::debug!(handle = id, device = %target, "foreign binding loaded model");
        Ok(ForeignHandle(id))
    }

    fn run_model(
        &self,
        handle: ForeignHandle,
        params: &[Tensor],
    ) -> Result<Vec<f32>, HandlerError> {
        let model = self.models.get(&handle.id()).ok_or_else(|| {
            HandlerError::ModelNotLoaded(format!("foreign handle {}", handle.id()))
        })?;
        let input = params.first().ok_or_else(|| {
            HandlerError::InvalidInput("foreign run entry requires an input tensor".into())
        })?;
        // A sequential graph consumes the input; trailing positional extras
        // are the binding's to interpret and are ignored here.
        let output = model.forward(input, &InvokeArgs::none())?;
        Ok(output.flatten().to_vec())
    }
}

/// Owns the binding module plus the opaque handle it returned at load time.
pub struct ForeignBackend {
    module: Arc<dyn ForeignInterface>,
    handle: ForeignHandle,
}

impl ForeignBackend {
    pub fn new(module: Arc<dyn ForeignInterface>, handle: ForeignHandle) -> Self {
        Self { module, handle }
    }

    /// Proxy an invocation through the binding's run entry point.
    ///
    /// Keyword extras are rejected before dispatch; the parameter list is
    /// built as `[input] + positional extras`, order-preserving.
    pub fn invoke(&self, input: &Tensor, args: &InvokeArgs) -> Result<Vec<f32>, HandlerError> {
        if args.has_keywords() {
            return Err(HandlerError::UnsupportedArguments);
        }
        let mut params = Vec::with_capacity(1 + args.positional.len());
        params.push(input.clone());
        params.extend(args.positional.iter().cloned());
        self.module.run_model(self.handle, &params)
    }

    pub fn handle(&self) -> ForeignHandle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn graph_artifact() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"ops":[{"op":"linear","weight":[[2.0,0.0],[0.0,2.0]],"bias":[0.0,0.0]}]}"#,
        )
        .unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn bundled_module_is_a_singleton() {
        let a = ForeignModule::bundled();
        let b = ForeignModule::bundled();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn load_and_run_through_the_binding() {
        let artifact = graph_artifact();
        let module = ForeignModule::new();
        let handle = module
            .load_model(artifact.path(), MapLocation::Cpu, "cpu")
            .unwrap();
        assert_eq!(module.loaded_models(), 1);

        let input = Tensor::new(vec![1.0, 3.0], vec![2]).unwrap();
        let out = module.run_model(handle, &[input]).unwrap();
        assert_eq!(out, vec![2.0, 6.0]);
    }

    #[test]
    fn stale_handle_is_model_not_loaded() {
        let module = ForeignModule::new();
        let input = Tensor::new(vec![1.0], vec![1]).unwrap();
        let result = module.run_model(ForeignHandle(42), &[input]);
        assert!(matches!(result, Err(HandlerError::ModelNotLoaded(_))));
    }

    #[test]
    fn run_requires_an_input_tensor() {
        let artifact = graph_artifact();
        let module = ForeignModule::new();
        let handle = module
            .load_model(artifact.path(), MapLocation::Cpu, "cpu")
            .unwrap();
        let result = module.run_model(handle, &[]);
        assert!(matches!(result, Err(HandlerError::InvalidInput(_))));
    }

    #[test]
    fn accelerator_map_location_parses_device_index() {
        let artifact = graph_artifact();
        let module = ForeignModule::new();
        let handle = module
            .load_model(artifact.path(), MapLocation::Accelerator, "cuda:1")
            .unwrap();
        let model = module.models.get(&handle.id()).unwrap();
        assert_eq!(model.device(), Device::Accelerator { index: 1 });
    }
}
