//! Hardware interaction
//!
//! - `sysfs`: attribute file reads and writes
//! - `actuator`: PWM device registry and mode management
//! - `sensors`: telemetry sources and the snapshot aggregator

pub mod actuator;
pub mod sensors;
pub mod sysfs;

pub use actuator::ActuatorRegistry;
pub use sensors::{SensorAggregator, SensorOptions, SensorPaths};
