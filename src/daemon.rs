/*
 * This file is part of Fanpilot.
 *
 * Copyright (C) 2025 Fanpilot contributors
 *
 * Fanpilot is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Fanpilot is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Fanpilot. If not, see <https://www.gnu.org/licenses/>.
 */

//! Daemon wiring: settings to controller, control loop, and notifier

use crate::cli::Cli;
use fp_core::settings::{load_settings, FanpilotSettings, NotificationBackend};
use fp_core::{
    ActuatorDevice, ActuatorRegistry, AlertEngine, ControlLoop, Controller, CurveStore,
    DesktopNotifier, LogNotifier, Notifier, RuleStore, SensorAggregator, Shutdown, Snapshot,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Settings file contents with command line overrides applied.
/// A malformed file is logged and replaced by defaults.
pub fn effective_settings(cli: &Cli) -> FanpilotSettings {
    let path = cli.settings_path();
    let mut settings = match load_settings(&path) {
        Ok(settings) => settings,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Settings unusable, continuing with defaults");
            FanpilotSettings::default()
        }
    };
    if let Some(interval_ms) = cli.interval_ms {
        settings.general.tick_interval_ms = interval_ms;
    }
    settings
}

/// Discover devices, load both stores, and apply startup assignments
pub fn build_controller(settings: &FanpilotSettings) -> Controller {
    let registry = ActuatorRegistry::discover(&settings.paths.hwmon_root);
    let curves = CurveStore::load(settings.curves_path());
    let rules = RuleStore::load(settings.rules_path());
    let alerts = AlertEngine::new(rules, settings.general.notification_title.clone());
    let controller = Controller::new(registry, curves, alerts);

    if !settings.assignments.is_empty() {
        let applied = controller.apply_assignments(&settings.assignments);
        info!("Applied {} of {} fan assignments", applied, settings.assignments.len());
    }
    controller
}

/// Notifier selected by the settings; `None` disables alerts
pub fn build_notifier(settings: &FanpilotSettings) -> Option<Arc<dyn Notifier>> {
    if !settings.notifications.enabled {
        info!("Alert notifications disabled");
        return None;
    }
    let notifier: Arc<dyn Notifier> = match settings.notifications.backend {
        NotificationBackend::Desktop => {
            Arc::new(DesktopNotifier::new(settings.general.notification_title.clone()))
        }
        NotificationBackend::Log => Arc::new(LogNotifier::new()),
    };
    Some(notifier)
}

pub fn build_control_loop(settings: &FanpilotSettings, controller: Controller) -> ControlLoop {
    let aggregator = SensorAggregator::new(settings.sensor_paths(), settings.sensor_options());
    let control_loop = ControlLoop::new(controller, aggregator, settings.tick_interval());
    match build_notifier(settings) {
        Some(notifier) => control_loop.with_notifier(notifier),
        None => control_loop,
    }
}

/// Output of `--once`
#[derive(Debug, Serialize)]
pub struct OnceReport {
    pub snapshot: Snapshot,
    pub devices: Vec<ActuatorDevice>,
}

/// Sample once without touching any fan
pub fn sample_once(settings: &FanpilotSettings) -> OnceReport {
    let mut aggregator = SensorAggregator::new(settings.sensor_paths(), settings.sensor_options());
    let registry = ActuatorRegistry::discover(&settings.paths.hwmon_root);
    OnceReport {
        snapshot: aggregator.sample(),
        devices: registry.get_info(),
    }
}

/// Run the control loop until SIGINT/SIGTERM, then restore firmware modes
pub async fn run(settings: FanpilotSettings) {
    let controller = build_controller(&settings);
    let control_loop = build_control_loop(&settings, controller.clone());

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - initiating shutdown");
        signal_shutdown.request();
    }) {
        warn!("Failed to set signal handler: {}. Fan modes will not be restored on SIGTERM.", e);
    }

    info!(
        devices = controller.device_paths().len(),
        curves = controller.curves().len(),
        rules = controller.rules().len(),
        interval_ms = control_loop.interval().as_millis() as u64,
        "Fanpilot running"
    );

    control_loop.run(shutdown).await;
}
