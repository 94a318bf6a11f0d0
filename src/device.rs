//! Execution API selection and device placement.
//!
//! The accelerator probe is feature-gated: with the `cuda` feature the count
//! comes from the CUDA driver, otherwise it is zero. The
//! `SERVE_CORE_ACCELERATOR_COUNT` environment variable overrides the probe;
//! invalid values fall back to zero without crashing.

use std::fmt;

use crate::error::HandlerError;

/// Which execution path serves inference calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionApi {
    /// In-process invocation of the loaded model.
    Native,
    /// Proxied invocation through a compiled interop binding.
    Foreign,
}

impl ExecutionApi {
    /// Parse the `api_type` system property.
    pub fn parse(raw: &str) -> Result<Self, HandlerError> {
        match raw {
            "native" => Ok(Self::Native),
            "foreign" => Ok(Self::Foreign),
            other => Err(HandlerError::UnsupportedExecutionApi(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionApi::Native => write!(f, "native"),
            ExecutionApi::Foreign => write!(f, "foreign"),
        }
    }
}

/// Map location hint handed to artifact decoders and the foreign binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapLocation {
    Cpu,
    Accelerator,
}

impl MapLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapLocation::Cpu => "cpu",
            MapLocation::Accelerator => "cuda",
        }
    }
}

impl fmt::Display for MapLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where tensors and the model live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Accelerator { index: usize },
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl Device {
    /// Select the device and map location for a deployment.
    ///
    /// An available accelerator wins, indexed by `gpu_id` (0 when unset);
    /// otherwise everything stays on the host.
    pub fn select(gpu_id: Option<usize>) -> (Self, MapLocation) {
        if accelerator_count() > 0 {
            let index = gpu_id.unwrap_or(0);
            (Self::Accelerator { index }, MapLocation::Accelerator)
        } else {
            (Self::Cpu, MapLocation::Cpu)
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Accelerator { index } => write!(f, "cuda:{index}"),
        }
    }
}

/// Number of accelerators visible to this process.
pub fn accelerator_count() -> usize {
    match std::env::var("SERVE_CORE_ACCELERATOR_COUNT") {
        Ok(val) => val.parse::<usize>().unwrap_or(0),
        Err(_) => probe_accelerators(),
    }
}

#[cfg(feature = "cuda")]
fn probe_accelerators() -> usize {
    cudarc::driver::CudaDevice::count()
        .map(|n| n as usize)
        .unwrap_or(0)
}

#[cfg(not(feature = "cuda"))]
fn probe_accelerators() -> usize {
    0
}
