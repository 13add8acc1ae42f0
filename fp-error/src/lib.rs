//! Unified error handling for Fanpilot
//!
//! Every crate in the workspace returns this error type. Hardware and
//! persistence failures are always recoverable: the control loop logs them and
//! carries on with the next device or the next tick.

use std::io;
use std::path::PathBuf;

/// Result type alias using FanpilotError
pub type Result<T> = std::result::Result<T, FanpilotError>;

/// Unified error type for all Fanpilot operations
#[derive(thiserror::Error, Debug)]
pub enum FanpilotError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Sensor Errors
    // ============================================================================
    #[error("Sensor {sensor} unavailable: {reason}")]
    SensorUnavailable {
        sensor: String,
        reason: String,
    },

    #[error("Hardware not found: {0}")]
    HardwareNotFound(String),

    #[error("GPU error: {0}")]
    GpuError(String),

    // ============================================================================
    // Actuator Errors
    // ============================================================================
    #[error("Failed to write PWM to {path}: {reason}")]
    ActuatorWriteFailed {
        path: PathBuf,
        reason: String,
    },

    #[error("No automatic mode accepted by {path} (tried {tried:?})")]
    ActuatorModeUnsupported {
        path: PathBuf,
        tried: Vec<u8>,
    },

    #[error("Unknown PWM device: {0}")]
    ActuatorNotFound(PathBuf),

    // ============================================================================
    // Persistence Errors
    // ============================================================================
    #[error("Corrupt data in {path}: {reason}")]
    PersistenceCorrupt {
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Configuration and Validation Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Curve validation failed: {0}")]
    InvalidCurve(String),

    #[error("Alert rule validation failed: {0}")]
    InvalidRule(String),

    // ============================================================================
    // Delivery Errors
    // ============================================================================
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

impl FanpilotError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a sensor error for the named source
    pub fn sensor(sensor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SensorUnavailable {
            sensor: sensor.into(),
            reason: reason.into(),
        }
    }

    /// Create an actuator write error
    pub fn actuator_write(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ActuatorWriteFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt-persistence error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PersistenceCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a delivery error from a string
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::DeliveryFailed(msg.into())
    }
}
