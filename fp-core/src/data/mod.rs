//! Data types and persistence
//!
//! Contains the snapshot model, device and rule types, and the JSON stores.

mod curve;
mod device;
mod metric;
mod persistence;
mod rule;

pub use curve::{Curve, CurvePoint};
pub use device::{ActuatorDevice, ActuatorMode, ControlMode, FanControl};
pub use metric::{MemoryUsage, Metric, MetricKind, Snapshot, Unit};
pub use persistence::{write_json_atomic, CurveStore, PersistedCurve, RuleStore};
pub use rule::{AlertRule, NewAlertRule, Severity, Urgency};

// Re-export GPU types from fp-gpu crate
pub use fp_gpu::{GpuReading, GpuStatus, GpuVendor};
