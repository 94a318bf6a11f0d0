//! Handler lifecycle, loading-strategy execution, and the request pipeline.
//!
//! A handler loads its model once (`initialize`) and then serves requests
//! through the fixed preprocess → inference → postprocess sequence
//! (`handle`). Preprocess and postprocess are injection points via
//! [`Stages`]; the loading and dispatch skeleton never varies.

mod strategy;

pub use strategy::LoadStrategy;

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::backend::{
    ExecutionBackend, ForeignBackend, ForeignInterface, ForeignModule, NativeBackend, RawOutput,
};
use crate::context::DeploymentContext;
use crate::device::{Device, ExecutionApi, MapLocation};
use crate::error::HandlerError;
use crate::inference_mode::InferenceGuard;
use crate::label::LabelMapping;
use crate::model::{GraphModel, InvokeArgs, Module, ModuleRegistry, StateDict};
use crate::tensor::Tensor;

/// Per-request view handed to preprocess/postprocess. Not retained across
/// calls.
pub struct RequestScope<'a> {
    pub device: Device,
    pub mapping: &'a LabelMapping,
    pub context: &'a DeploymentContext,
}

/// Injection points for custom request handling.
///
/// The defaults are real behaviors, not pass-throughs: preprocess places the
/// payload on the handler's device, postprocess flattens the backend's raw
/// output into a plain ordered numeric sequence.
pub trait Stages: Send + Sync {
    fn preprocess(
        &self,
        payload: &Value,
        scope: &RequestScope<'_>,
    ) -> Result<Tensor, HandlerError> {
        Ok(Tensor::from_json(payload)?.to_device(scope.device))
    }

    fn postprocess(
        &self,
        output: RawOutput,
        _scope: &RequestScope<'_>,
    ) -> Result<Vec<Value>, HandlerError> {
        Ok(output
            .flatten()
            .into_iter()
            .map(|v| Value::from(f64::from(v)))
            .collect())
    }
}

/// The default stages.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStages;

impl Stages for DefaultStages {}

struct ReadyState {
    backend: ExecutionBackend,
    device: Device,
    map_location: MapLocation,
    mapping: LabelMapping,
}

/// Handler lifecycle. Ready is terminal for the process lifetime.
enum Lifecycle {
    Uninitialized,
    Ready(ReadyState),
}

/// A model-serving handler: one-time load, per-request dispatch.
pub struct Handler<S: Stages = DefaultStages> {
    stages: S,
    registry: Arc<ModuleRegistry>,
    foreign: Option<Arc<dyn ForeignInterface>>,
    state: Lifecycle,
}

impl Handler<DefaultStages> {
    pub fn new() -> Self {
        Self::with_stages(DefaultStages, Arc::new(ModuleRegistry::new()))
    }
}

impl Default for Handler<DefaultStages> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Stages> Handler<S> {
    /// Build a handler with custom stages and a class registry for the
    /// eager loading path.
    pub fn with_stages(stages: S, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            stages,
            registry,
            foreign: None,
            state: Lifecycle::Uninitialized,
        }
    }

    /// Substitute the foreign binding module. The bundled binding is used
    /// when none is supplied.
    pub fn with_foreign_module(mut self, module: Arc<dyn ForeignInterface>) -> Self {
        self.foreign = Some(module);
        self
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, Lifecycle::Ready(_))
    }

    pub fn device(&self) -> Option<Device> {
        self.ready().ok().map(|r| r.device)
    }

    pub fn map_location(&self) -> Option<MapLocation> {
        self.ready().ok().map(|r| r.map_location)
    }

    pub fn mapping(&self) -> Option<&LabelMapping> {
        self.ready().ok().map(|r| &r.mapping)
    }

    /// One-shot initialization: select and execute exactly one loading
    /// strategy, then transition to Ready.
    ///
    /// All-or-nothing: any failure leaves the handler uninitialized and a
    /// later call can retry with a corrected context.
    pub fn initialize(&mut self, ctx: &DeploymentContext) -> Result<(), HandlerError> {
        if self.is_initialized() {
            return Err(HandlerError::AlreadyInitialized);
        }

        // Artifact existence is checked before any other work.
        let model_pt_path = ctx.serialized_file_path();
        if !model_pt_path.is_file() {
            return Err(HandlerError::MissingArtifact(model_pt_path));
        }

        let api = ExecutionApi::parse(&ctx.system_properties.api_type)?;
        let strategy = LoadStrategy::select(api, ctx.manifest.model_file())?;
        let (device, map_location) = Device::select(ctx.system_properties.gpu_id);

        let backend = match &strategy {
            LoadStrategy::NativeEager { model_file } => {
                tracing::debug!(model_file = %model_file, "loading eager model");
                let model = self.load_eager_model(ctx, model_file, &model_pt_path, device)?;
                ExecutionBackend::Native(NativeBackend::new(model))
            }
            LoadStrategy::NativeGraph => {
                tracing::debug!("loading compiled graph with the native api");
                let model = GraphModel::load(&model_pt_path, device)?;
                model.set_train(false);
                ExecutionBackend::Native(NativeBackend::new(Box::new(model)))
            }
            LoadStrategy::ForeignGraph => {
                tracing::info!("loading compiled graph through the foreign binding");
                let module: Arc<dyn ForeignInterface> = match self.foreign.clone() {
                    Some(module) => module,
                    None => ForeignModule::bundled(),
                };
                let handle =
                    module.load_model(&model_pt_path, map_location, &device.to_string())?;
                ExecutionBackend::Foreign(ForeignBackend::new(module, handle))
            }
        };

        tracing::debug!(path = %model_pt_path.display(), "model artifact loaded");

        let mapping = LabelMapping::load(&ctx.model_dir)?;

        self.state = Lifecycle::Ready(ReadyState { backend, device, map_location, mapping });
        Ok(())
    }

    fn load_eager_model(
        &self,
        ctx: &DeploymentContext,
        model_file: &str,
        model_pt_path: &Path,
        device: Device,
    ) -> Result<Box<dyn Module>, HandlerError> {
        let model_def_path = ctx.model_dir.join(model_file);
        if !model_def_path.is_file() {
            return Err(HandlerError::MissingClassDefinition(model_def_path));
        }

        let module_name = strategy::module_stem(model_file);
        let mut model = self.registry.instantiate(module_name)?;
        let state = StateDict::from_file(model_pt_path)?;
        model.load_state_dict(&state)?;
        model.to_device(device);
        model.set_train(false);
        Ok(model)
    }

    /// Route an invocation to the backend selected at initialize time,
    /// inside a no-gradient scope. Output comes back unconverted.
    pub fn inference(&self, input: Tensor, args: &InvokeArgs) -> Result<RawOutput, HandlerError> {
        let ready = self.ready()?;
        let input = input.to_device(ready.device);
        let _guard = InferenceGuard::new();
        ready.backend.invoke(&input, args)
    }

    /// The per-request entry point: strictly sequential
    /// `postprocess(inference(preprocess(payload)))`.
    pub fn handle(
        &self,
        payload: &Value,
        ctx: &DeploymentContext,
    ) -> Result<Vec<Value>, HandlerError> {
        let ready = self.ready()?;
        let scope = RequestScope {
            device: ready.device,
            mapping: &ready.mapping,
            context: ctx,
        };
        let input = self.stages.preprocess(payload, &scope)?;
        let output = self.inference(input, &InvokeArgs::none())?;
        self.stages.postprocess(output, &scope)
    }

    fn ready(&self) -> Result<&ReadyState, HandlerError> {
        match &self.state {
            Lifecycle::Ready(ready) => Ok(ready),
            Lifecycle::Uninitialized => Err(HandlerError::NotInitialized),
        }
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
