//! Model artifacts, the module trait, and class-definition resolution.
//!
//! Two artifact shapes exist, mutually exclusive per deployment: a compiled
//! graph (self-describing, loads with no class definition) and a
//! parameter-state blob restored into a registry-resolved class.

mod artifact;
mod graph;
mod linear;
mod module;
mod registry;
mod state_dict;

pub use artifact::MappedArtifact;
pub use graph::{GraphModel, GraphOp, GraphSpec};
pub use linear::LinearClassifier;
pub use module::{InvokeArgs, Module};
pub use registry::{ModelClass, ModuleRegistry};
pub use state_dict::{ParamTensor, StateDict};
