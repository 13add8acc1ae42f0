//! GPU-related constants

/// PCI vendor ID for AMD GPUs
pub const AMD_VENDOR_ID: &str = "0x1002";

/// Microwatts per watt (AMD hwmon power files)
pub const MICROWATTS_PER_WATT: f32 = 1_000_000.0;

/// Milliwatts per watt (NVML power usage)
pub const MILLIWATTS_PER_WATT: f32 = 1_000.0;

/// Bytes per megabyte (for VRAM conversion)
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Temperature readings are in millidegrees, divide by this to get Celsius
pub const MILLIDEGREE_DIVISOR: f32 = 1000.0;

/// hwmon temperature labels that describe the GPU die, in preference order
pub const AMD_PREFERRED_TEMP_LABELS: [&str; 2] = ["edge", "junction"];

/// Fallback model name when the driver does not expose one
pub const AMD_DEFAULT_NAME: &str = "AMD GPU";
