//! serve-core: a pluggable model-serving handler.
//!
//! Given a trained model artifact on disk, the handler loads the model into
//! memory once, then repeatedly accepts raw request payloads and returns
//! predictions through a fixed three-stage pipeline:
//! preprocess → inference → postprocess.
//!
//! # Loading strategies
//!
//! `initialize` selects exactly one of four mutually exclusive paths from
//! the deployment context:
//!
//! | api      | class-definition file | path |
//! |----------|-----------------------|------|
//! | native   | named                 | registry-resolved class + strict parameter restore |
//! | native   | absent                | compiled-graph artifact, in-process |
//! | foreign  | named                 | rejected (`UnsupportedCombination`) |
//! | foreign  | absent                | compiled-graph artifact through the foreign binding |
//!
//! # Execution backends
//!
//! Two backends exist, chosen once and immutable thereafter. The native
//! backend invokes the loaded model in-process with unrestricted extras;
//! the foreign backend proxies through a binding module whose call
//! interface is positional-only.
//!
//! # Concurrency
//!
//! `initialize` must complete before any `handle` call; the crate does not
//! enforce that ordering. After initialization the handler holds only
//! immutable state, so `handle` is safe for concurrent read-only use when
//! the underlying backend is. Queuing, batching, and backpressure belong to
//! the serving layer.

pub mod backend;
pub mod context;
pub mod device;
pub mod error;
pub mod handler;
pub mod inference_mode;
pub mod label;
pub mod model;
pub mod tensor;

pub use backend::{ExecutionBackend, ForeignHandle, ForeignInterface, ForeignModule, RawOutput};
pub use context::{DeploymentContext, Manifest, ModelEntry, SystemProperties};
pub use device::{Device, ExecutionApi, MapLocation};
pub use error::HandlerError;
pub use handler::{DefaultStages, Handler, LoadStrategy, RequestScope, Stages};
pub use inference_mode::InferenceGuard;
pub use label::LabelMapping;
pub use model::{
    GraphModel, GraphOp, GraphSpec, InvokeArgs, LinearClassifier, ModelClass, Module,
    ModuleRegistry, ParamTensor, StateDict,
};
pub use tensor::Tensor;
