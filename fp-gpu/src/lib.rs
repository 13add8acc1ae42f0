//! GPU telemetry for Fanpilot
//!
//! Vendor sources are tried in a fixed order:
//! - NVIDIA GPUs (via NVML)
//! - AMD GPUs (via amdgpu driver and sysfs)
//!
//! The first source that answers wins. When none does the probe reports
//! `GpuStatus::NotDetected` and the GPU metrics stay absent.

pub mod amd;
pub mod nvidia;

pub mod constants;
mod types;

pub use constants as gpu_const;
pub use types::*;

use fp_error::FanpilotError;
use nvidia::NvidiaProbe;
use std::path::PathBuf;
use tracing::debug;

pub type Result<T> = std::result::Result<T, FanpilotError>;

/// Owns the vendor handles for the life of the process
pub struct GpuProbe {
    nvidia: NvidiaProbe,
    drm_root: PathBuf,
}

impl GpuProbe {
    /// Probe both vendors, loading NVML once when `use_nvml` is set.
    pub fn new(drm_root: impl Into<PathBuf>, use_nvml: bool) -> Self {
        let nvidia = if use_nvml {
            NvidiaProbe::init()
        } else {
            NvidiaProbe::disabled()
        };
        Self {
            nvidia,
            drm_root: drm_root.into(),
        }
    }

    /// Read the primary GPU from the first vendor that answers
    pub fn sample(&self) -> GpuStatus {
        if self.nvidia.is_available() {
            match self.nvidia.read() {
                Ok(reading) => return GpuStatus::Detected(reading),
                Err(e) => debug!(error = %e, "NVIDIA read failed, trying AMD"),
            }
        }

        match amd::read_gpu(&self.drm_root) {
            Ok(reading) => GpuStatus::Detected(reading),
            Err(e) => {
                debug!(error = %e, "No GPU detected");
                GpuStatus::NotDetected
            }
        }
    }
}
