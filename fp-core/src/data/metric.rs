//! Metrics and snapshots
//!
//! A `Snapshot` always carries every `MetricKind`. A reading that could not be
//! taken is stored as `None` and must never be read as zero.

use fp_gpu::GpuStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Every quantity the aggregator reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    CpuTemp,
    CpuPower,
    CpuUsage,
    GpuTemp,
    GpuPower,
    GpuUsage,
    RamUsage,
    RamTemp,
}

/// Measurement unit of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Celsius,
    Watts,
    Percent,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Celsius => "°C",
            Unit::Watts => "W",
            Unit::Percent => "%",
        }
    }
}

impl MetricKind {
    pub const ALL: [MetricKind; 8] = [
        MetricKind::CpuTemp,
        MetricKind::CpuPower,
        MetricKind::CpuUsage,
        MetricKind::GpuTemp,
        MetricKind::GpuPower,
        MetricKind::GpuUsage,
        MetricKind::RamUsage,
        MetricKind::RamTemp,
    ];

    /// Stable name used in persisted files
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::CpuTemp => "cpu_temp",
            MetricKind::CpuPower => "cpu_power",
            MetricKind::CpuUsage => "cpu_usage",
            MetricKind::GpuTemp => "gpu_temp",
            MetricKind::GpuPower => "gpu_power",
            MetricKind::GpuUsage => "gpu_usage",
            MetricKind::RamUsage => "ram_usage",
            MetricKind::RamTemp => "ram_temp",
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            MetricKind::CpuTemp | MetricKind::GpuTemp | MetricKind::RamTemp => Unit::Celsius,
            MetricKind::CpuPower | MetricKind::GpuPower => Unit::Watts,
            MetricKind::CpuUsage | MetricKind::GpuUsage | MetricKind::RamUsage => Unit::Percent,
        }
    }

    /// Human title, e.g. "Cpu Temp"
    pub fn title(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Axis label naming this metric, e.g. "Cpu Temp (°C)"
    pub fn axis_label(self) -> String {
        format!("{} ({})", self.title(), self.unit().symbol())
    }

    /// Recover the metric from an axis label written by `axis_label`.
    /// Matching is on the title so a missing or different unit suffix is tolerated.
    pub fn from_axis_label(label: &str) -> Option<MetricKind> {
        let label = label.to_lowercase();
        MetricKind::ALL
            .into_iter()
            .find(|kind| label.contains(&kind.title().to_lowercase()))
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = fp_error::FanpilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| fp_error::FanpilotError::config(format!("unknown metric '{}'", s)))
    }
}

/// One reading inside a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub kind: MetricKind,
    pub value: Option<f64>,
    pub unit: Unit,
}

impl Metric {
    pub fn new(kind: MetricKind, value: Option<f64>) -> Self {
        Self {
            kind,
            value: value.filter(|v| v.is_finite()),
            unit: kind.unit(),
        }
    }

    /// "72.5°C", or "N/A" when absent
    pub fn display(&self) -> String {
        match self.value {
            Some(v) => format!("{:.1}{}", v, self.unit.symbol()),
            None => "N/A".to_string(),
        }
    }
}

/// System memory in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Immutable view of all metrics at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    taken_at_ms: u64,
    metrics: BTreeMap<MetricKind, Metric>,
    gpu: GpuStatus,
    memory: Option<MemoryUsage>,
}

impl Snapshot {
    /// Build a snapshot from whatever readings are available; every kind not
    /// supplied is recorded as absent.
    pub fn new(
        taken_at: SystemTime,
        readings: impl IntoIterator<Item = (MetricKind, Option<f64>)>,
    ) -> Self {
        let mut metrics: BTreeMap<MetricKind, Metric> = MetricKind::ALL
            .into_iter()
            .map(|kind| (kind, Metric::new(kind, None)))
            .collect();
        for (kind, value) in readings {
            metrics.insert(kind, Metric::new(kind, value));
        }

        let taken_at_ms = taken_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            taken_at_ms,
            metrics,
            gpu: GpuStatus::NotDetected,
            memory: None,
        }
    }

    pub fn with_gpu(mut self, gpu: GpuStatus) -> Self {
        self.gpu = gpu;
        self
    }

    pub fn with_memory(mut self, memory: Option<MemoryUsage>) -> Self {
        self.memory = memory;
        self
    }

    /// Value of a metric, `None` when absent
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        self.metrics.get(&kind).and_then(|m| m.value)
    }

    pub fn metric(&self, kind: MetricKind) -> Metric {
        self.metrics
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Metric::new(kind, None))
    }

    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.values()
    }

    /// Milliseconds since the Unix epoch
    pub fn taken_at_ms(&self) -> u64 {
        self.taken_at_ms
    }

    pub fn gpu(&self) -> &GpuStatus {
        &self.gpu
    }

    pub fn memory(&self) -> Option<MemoryUsage> {
        self.memory
    }
}
