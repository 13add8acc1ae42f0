//! GPU data types

use serde::{Deserialize, Serialize};

/// GPU vendor type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuVendor::Nvidia => write!(f, "NVIDIA"),
            GpuVendor::Amd => write!(f, "AMD"),
        }
    }
}

/// One reading of the primary GPU
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GpuReading {
    /// Vendor that produced this reading
    pub vendor: GpuVendor,
    /// GPU name/model
    pub name: String,
    /// Core temperature in Celsius
    pub temperature_c: Option<f32>,
    /// Board power draw in watts
    pub power_watts: Option<f32>,
    /// GPU utilization percentage
    pub utilization_percent: Option<f32>,
    /// VRAM used in MB
    pub vram_used_mb: Option<u32>,
    /// VRAM total in MB
    pub vram_total_mb: Option<u32>,
}

/// Result of probing every GPU source in order
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GpuStatus {
    Detected(GpuReading),
    NotDetected,
}

impl GpuStatus {
    pub fn reading(&self) -> Option<&GpuReading> {
        match self {
            GpuStatus::Detected(reading) => Some(reading),
            GpuStatus::NotDetected => None,
        }
    }

    /// Display text for the GPU model line
    pub fn describe(&self) -> String {
        match self {
            GpuStatus::Detected(reading) => reading.name.clone(),
            GpuStatus::NotDetected => "No GPU detected".to_string(),
        }
    }
}
