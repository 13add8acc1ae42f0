//! Alert rules and severities

use crate::data::MetricKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Alert severity, persisted as the rule's `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Urgency hint understood by desktop notification daemons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

impl Severity {
    pub fn urgency(self) -> Urgency {
        match self {
            Severity::Info | Severity::Warning => Urgency::Normal,
            Severity::Error | Severity::Critical => Urgency::Critical,
        }
    }

    /// How long the notification stays up; zero means until dismissed
    pub fn default_timeout(self) -> Duration {
        match self {
            Severity::Info => Duration::from_millis(5000),
            Severity::Warning => Duration::from_millis(8000),
            Severity::Error => Duration::from_millis(10000),
            Severity::Critical => Duration::ZERO,
        }
    }

    /// Freedesktop icon name
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Info => "dialog-information",
            Severity::Warning => "dialog-warning",
            Severity::Error | Severity::Critical => "dialog-error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// A threshold rule as stored on disk.
///
/// Field names follow the rule file: `type` carries the severity and
/// `component` the metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: u64,
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    #[serde(rename = "component")]
    pub metric: MetricKind,
    pub threshold: f64,
}

impl AlertRule {
    /// One-line summary, e.g. "cpu_temp > 80°C (warning)"
    pub fn describe(&self) -> String {
        format!(
            "{} > {}{} ({})",
            self.metric,
            self.threshold,
            self.metric.unit().symbol(),
            self.severity
        )
    }
}

/// A rule before the store assigns its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlertRule {
    pub metric: MetricKind,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Severity::Info.urgency(), Urgency::Normal);
        assert_eq!(Severity::Warning.urgency(), Urgency::Normal);
        assert_eq!(Severity::Error.urgency(), Urgency::Critical);
        assert_eq!(Severity::Critical.urgency(), Urgency::Critical);
        assert_eq!(Severity::Warning.default_timeout(), Duration::from_secs(8));
        assert_eq!(Severity::Critical.default_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_rule_uses_file_field_names() {
        let json = r#"{"id":3,"message":"CPU hot","type":"critical","component":"cpu_temp","threshold":90}"#;
        let rule: AlertRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.id, 3);
        assert_eq!(rule.severity, Severity::Critical);
        assert_eq!(rule.metric, MetricKind::CpuTemp);
        assert_eq!(rule.threshold, 90.0);
        assert_eq!(rule.describe(), "cpu_temp > 90°C (critical)");
    }
}
