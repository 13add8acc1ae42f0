//! Sensor aggregation
//!
//! `SensorAggregator` owns every vendor handle (NVML, `sysinfo`) for the life
//! of the process and turns one round of reads into a `Snapshot`. Any source
//! that fails leaves its metric absent; `sample` itself cannot fail.
//!
//! A sample blocks for the RAPL read interval (100 ms). Callers on an async
//! runtime should run it on a blocking thread.

pub mod cpu;
pub mod ram;

use crate::constants::{energy, paths};
use crate::data::{MemoryUsage, MetricKind, Snapshot};
use fp_error::FanpilotError;
use fp_gpu::GpuProbe;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use sysinfo::System;
use tracing::debug;

/// Filesystem roots the aggregator reads from
#[derive(Debug, Clone)]
pub struct SensorPaths {
    pub hwmon_root: PathBuf,
    pub powercap_energy: PathBuf,
    pub drm_root: PathBuf,
}

impl Default for SensorPaths {
    fn default() -> Self {
        Self {
            hwmon_root: PathBuf::from(paths::HWMON_BASE),
            powercap_energy: PathBuf::from(paths::RAPL_ENERGY),
            drm_root: PathBuf::from(paths::DRM_BASE),
        }
    }
}

/// Source toggles
#[derive(Debug, Clone)]
pub struct SensorOptions {
    /// Load NVML for NVIDIA GPUs
    pub use_nvml: bool,
    /// Parse `sensors` output for DIMM temperatures before reading hwmon
    pub use_sensors_command: bool,
    /// Gap between the two energy accumulator reads
    pub power_interval: Duration,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            use_nvml: true,
            use_sensors_command: true,
            power_interval: energy::SAMPLE_INTERVAL,
        }
    }
}

pub struct SensorAggregator {
    paths: SensorPaths,
    options: SensorOptions,
    system: System,
    gpu: GpuProbe,
}

impl SensorAggregator {
    pub fn new(paths: SensorPaths, options: SensorOptions) -> Self {
        let gpu = GpuProbe::new(paths.drm_root.clone(), options.use_nvml);

        // Prime the CPU counters so the first sample has a baseline
        let mut system = System::new();
        system.refresh_cpu_usage();

        Self {
            paths,
            options,
            system,
            gpu,
        }
    }

    pub fn paths(&self) -> &SensorPaths {
        &self.paths
    }

    /// Read every source once
    pub fn sample(&mut self) -> Snapshot {
        let cpu_temp = cpu::read_cpu_temperature(&self.paths.hwmon_root);
        let cpu_power = cpu::read_cpu_power(&self.paths.powercap_energy, self.options.power_interval);

        self.system.refresh_cpu_usage();
        let cpu_usage = Some(self.system.global_cpu_info().cpu_usage() as f64);

        self.system.refresh_memory();
        let memory = MemoryUsage {
            used_bytes: self.system.used_memory(),
            total_bytes: self.system.total_memory(),
        };
        let ram_usage = (memory.total_bytes > 0)
            .then(|| memory.used_bytes as f64 / memory.total_bytes as f64 * 100.0);

        let ram_temp = cpu::mean(&self.read_ram_temperatures());

        let gpu = self.gpu.sample();
        let reading = gpu.reading();
        let gpu_temp = reading.and_then(|r| r.temperature_c).map(f64::from);
        let gpu_power = reading.and_then(|r| r.power_watts).map(f64::from);
        let gpu_usage = reading.and_then(|r| r.utilization_percent).map(f64::from);

        debug!(?cpu_temp, ?cpu_power, ?cpu_usage, ?ram_usage, ?ram_temp, ?gpu_temp, "Sampled sensors");

        let snapshot = Snapshot::new(
            SystemTime::now(),
            [
                (MetricKind::CpuTemp, cpu_temp),
                (MetricKind::CpuPower, cpu_power),
                (MetricKind::CpuUsage, cpu_usage),
                (MetricKind::GpuTemp, gpu_temp),
                (MetricKind::GpuPower, gpu_power),
                (MetricKind::GpuUsage, gpu_usage),
                (MetricKind::RamUsage, ram_usage),
                (MetricKind::RamTemp, ram_temp),
            ],
        )
        .with_gpu(gpu)
        .with_memory((memory.total_bytes > 0).then_some(memory));

        for err in unavailable_sensors(&snapshot) {
            debug!("{}", err);
        }
        snapshot
    }

    fn read_ram_temperatures(&self) -> Vec<f64> {
        if self.options.use_sensors_command {
            let readings = ram::read_from_sensors_command();
            if !readings.is_empty() {
                return readings;
            }
        }
        ram::read_from_hwmon(&self.paths.hwmon_root)
    }
}

/// One `SensorUnavailable` per metric the snapshot holds no value for
pub fn unavailable_sensors(snapshot: &Snapshot) -> Vec<FanpilotError> {
    MetricKind::ALL
        .into_iter()
        .filter(|kind| snapshot.value(*kind).is_none())
        .map(|kind| FanpilotError::sensor(kind.to_string(), "no reading this sample"))
        .collect()
}
