//! NVIDIA GPU telemetry via NVML
//!
//! The NVML library handle is loaded once and kept for the life of the probe.
//! Loading fails cleanly on machines without the proprietary driver, in which
//! case every read reports `HardwareNotFound` and the caller moves on to the
//! next vendor.

use crate::{gpu_const, GpuReading, GpuVendor, Result};
use fp_error::FanpilotError;
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use tracing::{debug, info};

/// Index of the GPU whose readings feed the snapshot
const PRIMARY_DEVICE: u32 = 0;

pub struct NvidiaProbe {
    nvml: Option<Nvml>,
}

impl NvidiaProbe {
    /// Load NVML. A missing library is not an error, the probe just stays empty.
    pub fn init() -> Self {
        let nvml = match Nvml::init() {
            Ok(nvml) => {
                info!("NVML initialised");
                Some(nvml)
            }
            Err(e) => {
                debug!(error = %e, "NVML unavailable, NVIDIA GPU metrics disabled");
                None
            }
        };
        Self { nvml }
    }

    /// A probe that never touches NVML
    pub fn disabled() -> Self {
        Self { nvml: None }
    }

    pub fn is_available(&self) -> bool {
        self.nvml.is_some()
    }

    /// Read temperature, power and utilization of the primary device.
    ///
    /// Any of the three failing fails the whole read so the caller can fall
    /// back to another vendor instead of mixing sources.
    pub fn read(&self) -> Result<GpuReading> {
        let nvml = self
            .nvml
            .as_ref()
            .ok_or_else(|| FanpilotError::HardwareNotFound("NVML not loaded".to_string()))?;

        let device = nvml.device_by_index(PRIMARY_DEVICE).map_err(nvml_error)?;

        let temperature = device
            .temperature(TemperatureSensor::Gpu)
            .map_err(nvml_error)?;
        let power_mw = device.power_usage().map_err(nvml_error)?;
        let utilization = device.utilization_rates().map_err(nvml_error)?;

        let name = device.name().unwrap_or_else(|_| "NVIDIA GPU".to_string());
        let memory = device.memory_info().ok();

        Ok(GpuReading {
            vendor: GpuVendor::Nvidia,
            name,
            temperature_c: Some(temperature as f32),
            power_watts: Some(power_mw as f32 / gpu_const::MILLIWATTS_PER_WATT),
            utilization_percent: Some(utilization.gpu as f32),
            vram_used_mb: memory
                .as_ref()
                .map(|m| (m.used / gpu_const::BYTES_PER_MB) as u32),
            vram_total_mb: memory.map(|m| (m.total / gpu_const::BYTES_PER_MB) as u32),
        })
    }
}

fn nvml_error(e: NvmlError) -> FanpilotError {
    FanpilotError::GpuError(format!("NVML: {}", e))
}
