//! Threshold alerts with hysteresis
//!
//! Each rule is either unarmed or armed. An unarmed rule fires once when its
//! metric rises above the threshold and becomes armed. It re-arms for the next
//! crossing only after the metric falls below `threshold * (1 - margin)`.
//! Values in between change nothing, and an absent metric is skipped.
//!
//! Armed state lives in memory only; every rule starts unarmed.

use crate::constants::alert as alert_const;
use crate::data::{AlertRule, NewAlertRule, RuleStore, Severity, Snapshot};
use fp_error::Result;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// A notification the control loop should hand to the notifier
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    pub rule_id: u64,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub timeout: Duration,
}

/// Owns the rule store and each rule's armed flag
#[derive(Debug)]
pub struct AlertEngine {
    store: RuleStore,
    armed: HashMap<u64, bool>,
    margin: f64,
    title: String,
}

impl AlertEngine {
    pub fn new(store: RuleStore, title: impl Into<String>) -> Self {
        Self {
            store,
            armed: HashMap::new(),
            margin: alert_const::HYSTERESIS_MARGIN,
            title: title.into(),
        }
    }

    pub fn rules(&self) -> &[AlertRule] {
        self.store.list()
    }

    pub fn is_armed(&self, id: u64) -> bool {
        self.armed.get(&id).copied().unwrap_or(false)
    }

    /// Persist a new rule; it starts unarmed
    pub fn add_rule(&mut self, rule: NewAlertRule) -> Result<AlertRule> {
        let rule = self.store.add(rule)?;
        info!(id = rule.id, rule = %rule.describe(), "Alert rule added");
        Ok(rule)
    }

    /// Delete a rule and forget its armed state
    pub fn remove_rule(&mut self, id: u64) -> Result<bool> {
        let removed = self.store.remove(id)?;
        self.armed.remove(&id);
        if removed {
            info!(id, "Alert rule removed");
        }
        Ok(removed)
    }

    /// Run every rule against `snapshot`, returning one request per rule that
    /// fired on this tick
    pub fn evaluate(&mut self, snapshot: &Snapshot) -> Vec<DeliveryRequest> {
        let mut requests = Vec::new();

        for rule in self.store.list() {
            let Some(value) = snapshot.value(rule.metric) else {
                continue;
            };
            let armed = self.armed.entry(rule.id).or_insert(false);

            if !*armed && value > rule.threshold {
                *armed = true;
                debug!(id = rule.id, value, threshold = rule.threshold, "Alert fired");
                requests.push(request_for(&self.title, rule));
            } else if *armed && value < rule.threshold * (1.0 - self.margin) {
                *armed = false;
                debug!(id = rule.id, value, threshold = rule.threshold, "Alert re-armed");
            }
        }

        requests
    }
}

fn request_for(title: &str, rule: &AlertRule) -> DeliveryRequest {
    DeliveryRequest {
        rule_id: rule.id,
        title: title.to_string(),
        body: rule.message.clone(),
        severity: rule.severity,
        timeout: rule.severity.default_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MetricKind;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn engine_with_rule(dir: &TempDir, threshold: f64) -> (AlertEngine, u64) {
        let store = RuleStore::load(dir.path().join("notifications.json"));
        let mut engine = AlertEngine::new(store, "Fanpilot");
        let rule = engine
            .add_rule(NewAlertRule {
                metric: MetricKind::CpuTemp,
                threshold,
                severity: Severity::Warning,
                message: "CPU running hot".to_string(),
            })
            .unwrap();
        (engine, rule.id)
    }

    fn cpu(value: Option<f64>) -> Snapshot {
        Snapshot::new(SystemTime::now(), [(MetricKind::CpuTemp, value)])
    }

    #[test]
    fn test_hysteresis_sequence_delivers_twice() {
        let dir = TempDir::new().unwrap();
        let (mut engine, _) = engine_with_rule(&dir, 80.0);

        let fired: Vec<usize> = [70.0, 85.0, 78.0, 71.0, 90.0]
            .iter()
            .map(|v| engine.evaluate(&cpu(Some(*v))).len())
            .collect();
        assert_eq!(fired, vec![0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_dead_band_keeps_rule_armed() {
        let dir = TempDir::new().unwrap();
        let (mut engine, id) = engine_with_rule(&dir, 80.0);

        assert_eq!(engine.evaluate(&cpu(Some(85.0))).len(), 1);
        for v in [79.0, 72.5, 81.0, 95.0] {
            assert!(engine.evaluate(&cpu(Some(v))).is_empty());
        }
        assert!(engine.is_armed(id));
    }

    #[test]
    fn test_absent_metric_is_skipped() {
        let dir = TempDir::new().unwrap();
        let (mut engine, id) = engine_with_rule(&dir, 80.0);

        assert_eq!(engine.evaluate(&cpu(Some(90.0))).len(), 1);
        assert!(engine.evaluate(&cpu(None)).is_empty());
        assert!(engine.is_armed(id));
        assert!(engine.evaluate(&cpu(Some(90.0))).is_empty());
    }

    #[test]
    fn test_request_carries_rule_details() {
        let dir = TempDir::new().unwrap();
        let (mut engine, id) = engine_with_rule(&dir, 80.0);

        let requests = engine.evaluate(&cpu(Some(81.0)));
        assert_eq!(
            requests,
            vec![DeliveryRequest {
                rule_id: id,
                title: "Fanpilot".to_string(),
                body: "CPU running hot".to_string(),
                severity: Severity::Warning,
                timeout: Duration::from_secs(8),
            }]
        );
    }

    #[test]
    fn test_remove_drops_state() {
        let dir = TempDir::new().unwrap();
        let (mut engine, id) = engine_with_rule(&dir, 80.0);
        engine.evaluate(&cpu(Some(90.0)));

        assert!(engine.remove_rule(id).unwrap());
        assert!(!engine.is_armed(id));
        assert!(engine.rules().is_empty());
        assert!(engine.evaluate(&cpu(Some(99.0))).is_empty());
    }

    #[test]
    fn test_reload_starts_unarmed() {
        let dir = TempDir::new().unwrap();
        let (mut engine, id) = engine_with_rule(&dir, 80.0);
        engine.evaluate(&cpu(Some(90.0)));

        let store = RuleStore::load(dir.path().join("notifications.json"));
        let mut reloaded = AlertEngine::new(store, "Fanpilot");
        assert!(!reloaded.is_armed(id));
        assert_eq!(reloaded.evaluate(&cpu(Some(90.0))).len(), 1);
    }
}
