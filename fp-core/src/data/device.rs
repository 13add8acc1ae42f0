//! PWM actuator descriptions and control authority

use crate::constants::pwm::enable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Mode reported by `pwmN_enable`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorMode {
    Disabled,
    Manual,
    Automatic,
    Unknown(u8),
}

impl ActuatorMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            enable::DISABLED => ActuatorMode::Disabled,
            enable::MANUAL => ActuatorMode::Manual,
            c if enable::AUTOMATIC_CANDIDATES.contains(&c) => ActuatorMode::Automatic,
            other => ActuatorMode::Unknown(other),
        }
    }
}

impl fmt::Display for ActuatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorMode::Disabled => write!(f, "disabled"),
            ActuatorMode::Manual => write!(f, "manual"),
            ActuatorMode::Automatic => write!(f, "automatic"),
            ActuatorMode::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Mode requested through `set_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Manual,
    Auto,
}

/// Point-in-time view of one PWM device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorDevice {
    /// Path of the `pwmN` file, the device identity
    pub path: PathBuf,
    /// File name, e.g. "pwm2"
    pub name: String,
    pub label: Option<String>,
    /// hwmon chip `name`
    pub chip_name: Option<String>,
    /// `None` when the driver exposes no `pwmN_enable`
    pub mode: Option<ActuatorMode>,
    pub duty_percent: Option<f64>,
    pub rpm: Option<u32>,
}

impl ActuatorDevice {
    /// Label shown to the user, falling back to the file name
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Who owns a device's duty cycle.
///
/// The control loop only writes to devices under `Curve`; user commands set
/// `Auto` or `Manual` and write immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FanControl {
    Auto,
    Manual { percent: f64 },
    Curve { curve: String },
}

impl Default for FanControl {
    fn default() -> Self {
        FanControl::Auto
    }
}

impl fmt::Display for FanControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanControl::Auto => write!(f, "auto"),
            FanControl::Manual { percent } => write!(f, "manual {:.0}%", percent),
            FanControl::Curve { curve } => write!(f, "curve '{}'", curve),
        }
    }
}
