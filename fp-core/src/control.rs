//! Control loop and the shared controller handle
//!
//! `Controller` is the one handle every caller goes through: the daemon loop,
//! startup assignments, and any presentation layer. The actuator registry and
//! the per-device authority map sit behind a single lock, so hardware writes
//! from the loop and from interactive calls never interleave.
//!
//! Lock order when both are needed: curves, then actuation. Sampling holds
//! no controller lock.

use crate::constants::timing;
use crate::data::{
    ActuatorDevice, ActuatorMode, AlertRule, ControlMode, Curve, CurvePoint, CurveStore,
    FanControl, NewAlertRule, Snapshot,
};
use crate::engine::AlertEngine;
use crate::hw::{ActuatorRegistry, SensorAggregator};
use crate::notify::Notifier;
use crate::settings::FanAssignment;
use fp_error::{FanpilotError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Actuator access plus who owns each device
struct ActuationState {
    registry: ActuatorRegistry,
    authority: HashMap<PathBuf, FanControl>,
}

impl ActuationState {
    fn authority_of(&self, pwm_path: &Path) -> FanControl {
        self.authority.get(pwm_path).cloned().unwrap_or_default()
    }
}

/// Cloneable handle over the actuators, stores, and the latest snapshot
#[derive(Clone)]
pub struct Controller {
    actuation: Arc<Mutex<ActuationState>>,
    curves: Arc<RwLock<CurveStore>>,
    alerts: Arc<Mutex<AlertEngine>>,
    latest: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl Controller {
    pub fn new(registry: ActuatorRegistry, curves: CurveStore, alerts: AlertEngine) -> Self {
        Self {
            actuation: Arc::new(Mutex::new(ActuationState {
                registry,
                authority: HashMap::new(),
            })),
            curves: Arc::new(RwLock::new(curves)),
            alerts: Arc::new(Mutex::new(alerts)),
            latest: Arc::new(RwLock::new(None)),
        }
    }

    // ========================================================================
    // Telemetry
    // ========================================================================

    /// Most recent snapshot, `None` before the first tick
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().clone()
    }

    fn publish(&self, snapshot: Arc<Snapshot>) {
        *self.latest.write() = Some(snapshot);
    }

    // ========================================================================
    // Devices
    // ========================================================================

    /// Labeled devices with their live mode, duty, and RPM
    pub fn devices(&self) -> Vec<ActuatorDevice> {
        self.actuation.lock().registry.get_info()
    }

    /// Every controllable device path
    pub fn device_paths(&self) -> Vec<PathBuf> {
        self.actuation
            .lock()
            .registry
            .device_paths()
            .map(Path::to_path_buf)
            .collect()
    }

    /// Current authority over a device; `None` for unknown devices
    pub fn fan_control(&self, pwm_path: &Path) -> Option<FanControl> {
        let state = self.actuation.lock();
        state
            .registry
            .contains(pwm_path)
            .then(|| state.authority_of(pwm_path))
    }

    /// Hand a device to firmware, a fixed duty, or a curve.
    ///
    /// Auto and manual take effect immediately. A curve assignment only
    /// records the authority; the next tick drives the device.
    pub fn set_fan_control(&self, pwm_path: &Path, control: FanControl) -> Result<()> {
        if let FanControl::Curve { curve } = &control {
            if self.curves.read().get(curve).is_none() {
                warn!(path = %pwm_path.display(), %curve, "Assigned curve does not exist yet, device holds its duty until it does");
            }
        }
        if let FanControl::Manual { percent } = control {
            if !percent.is_finite() {
                return Err(FanpilotError::InvalidConfig {
                    field: "percent".to_string(),
                    reason: format!("{} is not a finite number", percent),
                });
            }
        }

        let mut state = self.actuation.lock();
        if !state.registry.contains(pwm_path) {
            return Err(FanpilotError::ActuatorNotFound(pwm_path.to_path_buf()));
        }

        match &control {
            FanControl::Auto => {
                state.registry.set_mode(pwm_path, ControlMode::Auto)?;
            }
            FanControl::Manual { percent } => {
                state.registry.set_mode(pwm_path, ControlMode::Manual)?;
                state.registry.set_speed(pwm_path, *percent)?;
            }
            FanControl::Curve { .. } => {}
        }

        info!(path = %pwm_path.display(), %control, "Fan control changed");
        state.authority.insert(pwm_path.to_path_buf(), control);
        Ok(())
    }

    /// Apply startup assignments; failures are logged and skipped.
    /// Returns how many were applied.
    pub fn apply_assignments(&self, assignments: &[FanAssignment]) -> usize {
        assignments
            .iter()
            .filter(|a| match self.set_fan_control(&a.pwm, a.control.clone()) {
                Ok(()) => true,
                Err(e) => {
                    warn!(path = %a.pwm.display(), error = %e, "Skipping fan assignment");
                    false
                }
            })
            .count()
    }

    /// Put firmware modes back and release every device. Later ticks write
    /// nothing.
    pub fn restore_original_modes(&self) -> usize {
        let mut state = self.actuation.lock();
        state.authority.clear();
        state.registry.restore_original_modes()
    }

    // ========================================================================
    // Curves
    // ========================================================================

    pub fn curves(&self) -> Vec<Curve> {
        self.curves.read().list().into_iter().cloned().collect()
    }

    pub fn curve(&self, title: &str) -> Option<Curve> {
        self.curves.read().get(title).cloned()
    }

    pub fn add_curve(&self, curve: Curve) -> Result<()> {
        self.curves.write().add(curve)
    }

    pub fn update_curve(&self, title: &str, points: Vec<CurvePoint>) -> Result<bool> {
        self.curves.write().update(title, points)
    }

    /// Devices still assigned to a removed curve hold their last duty
    pub fn remove_curve(&self, title: &str) -> Result<bool> {
        self.curves.write().remove(title)
    }

    // ========================================================================
    // Alert rules
    // ========================================================================

    pub fn rules(&self) -> Vec<AlertRule> {
        self.alerts.lock().rules().to_vec()
    }

    pub fn add_rule(&self, rule: NewAlertRule) -> Result<AlertRule> {
        self.alerts.lock().add_rule(rule)
    }

    pub fn remove_rule(&self, id: u64) -> Result<bool> {
        self.alerts.lock().remove_rule(id)
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub curve_writes: usize,
    /// Curve-driven devices left untouched (absent metric or missing curve)
    pub skipped: usize,
    pub write_failures: usize,
    pub deliveries: usize,
    pub delivery_failures: usize,
}

/// Shutdown signal shared between the signal handler and the loop
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // notify_one keeps a permit if the loop is not waiting yet
        self.notify.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.notify.notified().await
    }
}

/// Fixed-cadence sample, actuate, alert cycle
pub struct ControlLoop {
    controller: Controller,
    aggregator: Arc<Mutex<SensorAggregator>>,
    notifier: Option<Arc<dyn Notifier>>,
    interval: Duration,
}

impl ControlLoop {
    pub fn new(controller: Controller, aggregator: SensorAggregator, interval: Duration) -> Self {
        Self {
            controller,
            aggregator: Arc::new(Mutex::new(aggregator)),
            notifier: None,
            interval: interval.max(Duration::from_millis(timing::MIN_TICK_INTERVAL_MS)),
        }
    }

    /// Deliver fired alerts through `notifier`. Without one, alert rules are
    /// not evaluated.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sample once and process the result. Blocks for the sample duration.
    pub fn tick(&self) -> TickReport {
        let snapshot = self.aggregator.lock().sample();
        self.process(snapshot)
    }

    /// Publish `snapshot`, drive curve-controlled devices, then evaluate and
    /// deliver alerts
    pub fn process(&self, snapshot: Snapshot) -> TickReport {
        let snapshot = Arc::new(snapshot);
        self.controller.publish(Arc::clone(&snapshot));

        let mut report = TickReport::default();
        self.drive_curves(&snapshot, &mut report);
        self.deliver_alerts(&snapshot, &mut report);

        debug!(
            writes = report.curve_writes,
            skipped = report.skipped,
            write_failures = report.write_failures,
            deliveries = report.deliveries,
            delivery_failures = report.delivery_failures,
            "Tick processed"
        );
        report
    }

    fn drive_curves(&self, snapshot: &Snapshot, report: &mut TickReport) {
        let curves = self.controller.curves.read();
        let state = self.controller.actuation.lock();

        let assigned: Vec<(PathBuf, String)> = state
            .authority
            .iter()
            .filter_map(|(path, control)| match control {
                FanControl::Curve { curve } => Some((path.clone(), curve.clone())),
                _ => None,
            })
            .collect();

        for (pwm_path, title) in assigned {
            let Some(curve) = curves.get(&title) else {
                debug!(path = %pwm_path.display(), curve = %title, "Curve missing, skipping device");
                report.skipped += 1;
                continue;
            };
            let Some(percent) = curve.evaluate_snapshot(snapshot) else {
                debug!(path = %pwm_path.display(), curve = %title, "Curve source absent, skipping device");
                report.skipped += 1;
                continue;
            };

            match drive_device(&state, &pwm_path, percent) {
                Ok(value) => {
                    debug!(path = %pwm_path.display(), curve = %title, percent, value, "Curve applied");
                    report.curve_writes += 1;
                }
                Err(e) => {
                    warn!(path = %pwm_path.display(), curve = %title, error = %e, "Curve write failed");
                    report.write_failures += 1;
                }
            }
        }
    }

    fn deliver_alerts(&self, snapshot: &Snapshot, report: &mut TickReport) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let requests = self.controller.alerts.lock().evaluate(snapshot);
        for request in requests {
            match notifier.deliver(&request.title, &request.body, request.severity, request.timeout) {
                Ok(id) => {
                    info!(rule = request.rule_id, delivery = id, severity = %request.severity, "Alert delivered");
                    report.deliveries += 1;
                }
                Err(e) => {
                    warn!(rule = request.rule_id, error = %e, "Alert delivery failed");
                    report.delivery_failures += 1;
                }
            }
        }
    }

    /// Tick until `shutdown` is requested, then restore firmware modes
    pub async fn run(self, shutdown: Arc<Shutdown>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Control loop starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let this = Arc::new(self);

        while !shutdown.is_requested() {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.notified() => break,
            }

            // Sampling sleeps for the energy read interval, keep it off the runtime
            let worker = Arc::clone(&this);
            if let Err(e) = tokio::task::spawn_blocking(move || worker.tick()).await {
                error!(error = %e, "Control tick aborted");
            }
        }

        info!("Control loop stopping");
        let restored = this.controller.restore_original_modes();
        info!(restored, "Control loop stopped");
    }
}

/// Put a device in manual mode if needed, then write the duty
fn drive_device(state: &ActuationState, pwm_path: &Path, percent: f64) -> Result<u8> {
    if state.registry.get_mode(pwm_path) != Some(ActuatorMode::Manual) {
        state.registry.set_mode(pwm_path, ControlMode::Manual)?;
    }
    state.registry.set_speed(pwm_path, percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MetricKind, RuleStore, Severity};
    use crate::hw::{SensorOptions, SensorPaths};
    use crate::notify::MockNotifier;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    struct Rig {
        dir: TempDir,
        hwmon: PathBuf,
        pwm: PathBuf,
    }

    impl Rig {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let hwmon = dir.path().join("hwmon").join("hwmon2");
            fs::create_dir_all(&hwmon).unwrap();
            fs::write(hwmon.join("name"), "nct6798\n").unwrap();
            fs::write(hwmon.join("pwm1"), "128\n").unwrap();
            fs::write(hwmon.join("pwm1_enable"), "5\n").unwrap();
            fs::write(hwmon.join("fan1_label"), "CPU Fan\n").unwrap();
            let pwm = hwmon.join("pwm1");
            Self { dir, hwmon, pwm }
        }

        fn controller(&self) -> Controller {
            let registry = ActuatorRegistry::discover(&self.dir.path().join("hwmon"));
            let curves = CurveStore::load(self.dir.path().join("curves.json"));
            let rules = RuleStore::load(self.dir.path().join("notifications.json"));
            Controller::new(registry, curves, AlertEngine::new(rules, "Fanpilot"))
        }

        fn control_loop(&self, controller: Controller) -> ControlLoop {
            let paths = SensorPaths {
                hwmon_root: self.dir.path().join("sensors"),
                powercap_energy: self.dir.path().join("energy_uj"),
                drm_root: self.dir.path().join("drm"),
            };
            let options = SensorOptions {
                use_nvml: false,
                use_sensors_command: false,
                power_interval: Duration::from_millis(5),
            };
            ControlLoop::new(controller, SensorAggregator::new(paths, options), Duration::from_millis(100))
        }

        fn pwm_value(&self) -> String {
            fs::read_to_string(&self.pwm).unwrap().trim().to_string()
        }

        fn enable_value(&self) -> String {
            fs::read_to_string(self.hwmon.join("pwm1_enable")).unwrap().trim().to_string()
        }
    }

    fn cpu_curve() -> Curve {
        Curve::new(
            "CPU",
            MetricKind::CpuTemp,
            vec![CurvePoint::new(30.0, 20.0), CurvePoint::new(80.0, 100.0)],
        )
    }

    fn cpu(value: Option<f64>) -> Snapshot {
        Snapshot::new(SystemTime::now(), [(MetricKind::CpuTemp, value)])
    }

    #[test]
    fn test_curve_drives_device() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller.add_curve(cpu_curve()).unwrap();
        controller
            .set_fan_control(&rig.pwm, FanControl::Curve { curve: "CPU".to_string() })
            .unwrap();
        // assignment alone writes nothing
        assert_eq!(rig.pwm_value(), "128");

        let control_loop = rig.control_loop(controller.clone());
        let report = control_loop.process(cpu(Some(55.0)));

        assert_eq!(report.curve_writes, 1);
        assert_eq!(rig.enable_value(), "1");
        assert_eq!(rig.pwm_value(), "153");
        assert_eq!(controller.snapshot().unwrap().value(MetricKind::CpuTemp), Some(55.0));
    }

    #[test]
    fn test_absent_metric_skips_write() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller.add_curve(cpu_curve()).unwrap();
        controller
            .set_fan_control(&rig.pwm, FanControl::Curve { curve: "CPU".to_string() })
            .unwrap();

        let report = rig.control_loop(controller).process(cpu(None));
        assert_eq!(report.curve_writes, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(rig.pwm_value(), "128");
        assert_eq!(rig.enable_value(), "5");
    }

    #[test]
    fn test_missing_curve_skips_write() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller
            .set_fan_control(&rig.pwm, FanControl::Curve { curve: "Nope".to_string() })
            .unwrap();

        let report = rig.control_loop(controller).process(cpu(Some(70.0)));
        assert_eq!(report.skipped, 1);
        assert_eq!(rig.pwm_value(), "128");
    }

    #[test]
    fn test_manual_authority_not_overwritten() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller.add_curve(cpu_curve()).unwrap();
        controller
            .set_fan_control(&rig.pwm, FanControl::Manual { percent: 40.0 })
            .unwrap();
        assert_eq!(rig.pwm_value(), "102");
        assert_eq!(rig.enable_value(), "1");

        let report = rig.control_loop(controller.clone()).process(cpu(Some(80.0)));
        assert_eq!(report, TickReport::default());
        assert_eq!(rig.pwm_value(), "102");
        assert_eq!(controller.fan_control(&rig.pwm), Some(FanControl::Manual { percent: 40.0 }));
    }

    #[test]
    fn test_auto_hands_back_to_firmware() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller
            .set_fan_control(&rig.pwm, FanControl::Manual { percent: 40.0 })
            .unwrap();
        controller.set_fan_control(&rig.pwm, FanControl::Auto).unwrap();
        assert_eq!(rig.enable_value(), "2");
        assert_eq!(controller.fan_control(&rig.pwm), Some(FanControl::Auto));
    }

    #[test]
    fn test_unknown_device_rejected() {
        let rig = Rig::new();
        let controller = rig.controller();
        let missing = rig.hwmon.join("pwm9");
        assert!(matches!(
            controller.set_fan_control(&missing, FanControl::Auto),
            Err(FanpilotError::ActuatorNotFound(_))
        ));
        assert_eq!(controller.fan_control(&missing), None);
        assert!(matches!(
            controller.set_fan_control(&rig.pwm, FanControl::Manual { percent: f64::NAN }),
            Err(FanpilotError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_alert_delivery_failure_is_not_fatal() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller
            .add_rule(NewAlertRule {
                metric: MetricKind::CpuTemp,
                threshold: 80.0,
                severity: Severity::Critical,
                message: "CPU critical".to_string(),
            })
            .unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_deliver()
            .times(1)
            .returning(|_, _, _, _| Err(FanpilotError::delivery("no session bus")));

        let control_loop = rig.control_loop(controller).with_notifier(Arc::new(notifier));
        let report = control_loop.process(cpu(Some(90.0)));
        assert_eq!(report.delivery_failures, 1);

        // still armed, no retry on the next tick
        let report = control_loop.process(cpu(Some(91.0)));
        assert_eq!(report.delivery_failures, 0);
        assert_eq!(report.deliveries, 0);
    }

    #[test]
    fn test_alert_delivered_with_rule_details() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller
            .add_rule(NewAlertRule {
                metric: MetricKind::CpuTemp,
                threshold: 80.0,
                severity: Severity::Warning,
                message: "CPU running hot".to_string(),
            })
            .unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_deliver()
            .withf(|title, body, severity, timeout| {
                title == "Fanpilot"
                    && body == "CPU running hot"
                    && *severity == Severity::Warning
                    && *timeout == Duration::from_secs(8)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(7));

        let control_loop = rig.control_loop(controller).with_notifier(Arc::new(notifier));
        assert_eq!(control_loop.process(cpu(Some(85.0))).deliveries, 1);
    }

    #[test]
    fn test_restore_releases_devices() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller.add_curve(cpu_curve()).unwrap();
        controller
            .set_fan_control(&rig.pwm, FanControl::Curve { curve: "CPU".to_string() })
            .unwrap();
        let control_loop = rig.control_loop(controller.clone());
        control_loop.process(cpu(Some(55.0)));
        assert_eq!(rig.enable_value(), "1");

        assert_eq!(controller.restore_original_modes(), 1);
        assert_eq!(rig.enable_value(), "5");

        let report = control_loop.process(cpu(Some(80.0)));
        assert_eq!(report.curve_writes, 0);
        assert_eq!(rig.pwm_value(), "153");
    }

    #[test]
    fn test_apply_assignments_skips_failures() {
        let rig = Rig::new();
        let controller = rig.controller();
        let applied = controller.apply_assignments(&[
            FanAssignment {
                pwm: rig.pwm.clone(),
                control: FanControl::Manual { percent: 100.0 },
            },
            FanAssignment {
                pwm: rig.hwmon.join("pwm7"),
                control: FanControl::Auto,
            },
        ]);
        assert_eq!(applied, 1);
        assert_eq!(rig.pwm_value(), "255");
    }

    #[tokio::test]
    async fn test_run_restores_modes_on_shutdown() {
        let rig = Rig::new();
        let controller = rig.controller();
        controller
            .set_fan_control(&rig.pwm, FanControl::Manual { percent: 40.0 })
            .unwrap();
        assert_eq!(rig.enable_value(), "1");

        let shutdown = Arc::new(Shutdown::new());
        let handle = tokio::spawn(rig.control_loop(controller.clone()).run(Arc::clone(&shutdown)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request();
        handle.await.unwrap();

        assert_eq!(rig.enable_value(), "5");
        assert!(controller.snapshot().is_some());
    }
}
