//! Fanpilot Core Library
//!
//! Telemetry driven fan control for Linux systems.
//!
//! # Features
//!
//! - **Telemetry**: CPU, GPU, and RAM metrics gathered into one snapshot per tick
//! - **Actuators**: hwmon PWM discovery, manual/automatic mode switching, restore on exit
//! - **Fan Curves**: Piecewise-linear metric to duty mapping, persisted as JSON
//! - **Alerts**: Threshold rules with hysteresis, delivered as desktop notifications
//!
//! # Module Structure
//!
//! - `hw/` - Hardware interaction (sensors, PWM actuators, sysfs access)
//! - `data/` - Data types and JSON persistence
//! - `engine/` - Curve evaluation and alert state
//! - `control` - Controller handle and the periodic control loop
//!
//! # Example
//!
//! ```no_run
//! use fp_core::{ActuatorRegistry, AlertEngine, Controller, CurveStore, RuleStore};
//! use std::path::Path;
//!
//! let registry = ActuatorRegistry::discover(Path::new("/sys/class/hwmon"));
//! let curves = CurveStore::load("/etc/fanpilot/curves.json");
//! let alerts = AlertEngine::new(RuleStore::load("/etc/fanpilot/notifications.json"), "Fanpilot");
//! let controller = Controller::new(registry, curves, alerts);
//! println!("{} devices", controller.devices().len());
//! ```

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod constants;
pub mod control;
pub mod notify;
pub mod settings;

// Re-export primary types from data/
pub use data::{
    ActuatorDevice, ActuatorMode, AlertRule, ControlMode, Curve, CurvePoint, FanControl,
    GpuReading, GpuStatus, GpuVendor, MemoryUsage, Metric, MetricKind, NewAlertRule, Severity,
    Snapshot, Unit, Urgency,
};

// Re-export persistence from data/
pub use data::{write_json_atomic, CurveStore, PersistedCurve, RuleStore};

// Re-export error types
pub use fp_error::{FanpilotError, Result};

// Re-export engine types
pub use engine::{evaluate_points, AlertEngine, DeliveryRequest};

// Re-export hardware types from hw/
pub use hw::{ActuatorRegistry, SensorAggregator, SensorOptions, SensorPaths};

// Re-export control, delivery, and settings
pub use control::{ControlLoop, Controller, Shutdown, TickReport};
pub use notify::{DesktopNotifier, LogNotifier, Notifier};
pub use settings::{load_settings, FanAssignment, FanpilotSettings, NotificationBackend};
