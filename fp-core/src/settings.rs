//! Daemon settings
//!
//! Loaded from JSON. Every field has a default, so a partial file or no file
//! at all gives a working configuration.

use crate::constants::{alert, energy, paths, timing};
use crate::data::FanControl;
use crate::hw::{SensorOptions, SensorPaths};
use fp_error::{FanpilotError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Daemon settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanpilotSettings {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub sensors: SensorSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    /// Fan control applied at startup, one entry per PWM device
    #[serde(default)]
    pub assignments: Vec<FanAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Control loop cadence in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Title of every alert notification
    #[serde(default = "default_notification_title")]
    pub notification_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_hwmon_root")]
    pub hwmon_root: PathBuf,

    #[serde(default = "default_powercap_energy")]
    pub powercap_energy: PathBuf,

    #[serde(default = "default_drm_root")]
    pub drm_root: PathBuf,

    /// Directory holding the curve and rule files; the invoking user's
    /// config directory when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSettings {
    #[serde(default = "default_true")]
    pub use_nvml: bool,

    #[serde(default = "default_true")]
    pub use_sensors_command: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationBackend {
    /// `notify-send` on the user's desktop
    Desktop,
    /// Log only
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_backend")]
    pub backend: NotificationBackend,
}

/// Startup control for one PWM device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanAssignment {
    pub pwm: PathBuf,
    pub control: FanControl,
}

fn default_tick_interval() -> u64 {
    timing::TICK_INTERVAL.as_millis() as u64
}

fn default_notification_title() -> String {
    alert::DEFAULT_TITLE.to_string()
}

fn default_hwmon_root() -> PathBuf {
    PathBuf::from(paths::HWMON_BASE)
}

fn default_powercap_energy() -> PathBuf {
    PathBuf::from(paths::RAPL_ENERGY)
}

fn default_drm_root() -> PathBuf {
    PathBuf::from(paths::DRM_BASE)
}

fn default_true() -> bool {
    true
}

fn default_backend() -> NotificationBackend {
    NotificationBackend::Desktop
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            notification_title: default_notification_title(),
        }
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            hwmon_root: default_hwmon_root(),
            powercap_energy: default_powercap_energy(),
            drm_root: default_drm_root(),
            data_dir: None,
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            use_nvml: true,
            use_sensors_command: true,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_backend(),
        }
    }
}

impl FanpilotSettings {
    /// Control loop cadence, never below the configured minimum
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.general.tick_interval_ms.max(timing::MIN_TICK_INTERVAL_MS))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .or_else(paths::user_data_dir)
            .unwrap_or_else(|| PathBuf::from(".").join("fanpilot"))
    }

    pub fn curves_path(&self) -> PathBuf {
        self.data_dir().join(paths::CURVES_FILE)
    }

    pub fn rules_path(&self) -> PathBuf {
        self.data_dir().join(paths::RULES_FILE)
    }

    pub fn sensor_paths(&self) -> SensorPaths {
        SensorPaths {
            hwmon_root: self.paths.hwmon_root.clone(),
            powercap_energy: self.paths.powercap_energy.clone(),
            drm_root: self.paths.drm_root.clone(),
        }
    }

    pub fn sensor_options(&self) -> SensorOptions {
        SensorOptions {
            use_nvml: self.sensors.use_nvml,
            use_sensors_command: self.sensors.use_sensors_command,
            power_interval: energy::SAMPLE_INTERVAL,
        }
    }
}

/// Settings file location: `$FANPILOT_CONFIG`, else the system file
pub fn get_settings_path() -> PathBuf {
    std::env::var_os(paths::CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(paths::SYSTEM_CONFIG_FILE))
}

/// Load settings from `path`; defaults when the file does not exist
pub fn load_settings(path: &Path) -> Result<FanpilotSettings> {
    if !path.exists() {
        debug!("No settings file at {:?}, using defaults", path);
        return Ok(FanpilotSettings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| FanpilotError::config(format!("Failed to read settings file {:?}: {}", path, e)))?;

    let settings: FanpilotSettings = serde_json::from_str(&content)
        .map_err(|e| FanpilotError::config(format!("Failed to parse settings JSON: {}", e)))?;

    if settings.general.tick_interval_ms < timing::MIN_TICK_INTERVAL_MS {
        return Err(FanpilotError::InvalidConfig {
            field: "general.tick_interval_ms".to_string(),
            reason: format!(
                "must be at least {} ms, got {}",
                timing::MIN_TICK_INTERVAL_MS,
                settings.general.tick_interval_ms
            ),
        });
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings.tick_interval(), Duration::from_secs(1));
        assert_eq!(settings.general.notification_title, "Fanpilot");
        assert_eq!(settings.notifications.backend, NotificationBackend::Desktop);
        assert!(settings.assignments.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "paths": {"data_dir": "/var/lib/fanpilot"},
                "notifications": {"backend": "log"},
                "assignments": [
                    {"pwm": "/sys/class/hwmon/hwmon2/pwm1", "control": {"mode": "curve", "curve": "CPU"}}
                ]
            }"#,
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.paths.hwmon_root, PathBuf::from("/sys/class/hwmon"));
        assert_eq!(settings.curves_path(), PathBuf::from("/var/lib/fanpilot/curves.json"));
        assert_eq!(settings.rules_path(), PathBuf::from("/var/lib/fanpilot/notifications.json"));
        assert_eq!(settings.notifications.backend, NotificationBackend::Log);
        assert!(settings.notifications.enabled);
        assert_eq!(
            settings.assignments[0].control,
            FanControl::Curve { curve: "CPU".to_string() }
        );
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_settings(&path), Err(FanpilotError::Config(_))));
    }

    #[test]
    fn test_tick_interval_floor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"general": {"tick_interval_ms": 10}}"#).unwrap();
        assert!(matches!(load_settings(&path), Err(FanpilotError::InvalidConfig { .. })));
    }

    #[test]
    #[serial]
    fn test_settings_path_from_env() {
        std::env::set_var(paths::CONFIG_ENV, "/tmp/fanpilot-test.json");
        assert_eq!(get_settings_path(), PathBuf::from("/tmp/fanpilot-test.json"));
        std::env::remove_var(paths::CONFIG_ENV);
        assert_eq!(get_settings_path(), PathBuf::from("/etc/fanpilot/config.json"));
    }

    #[test]
    #[serial]
    fn test_data_dir_follows_xdg_config_home() {
        let saved_sudo = std::env::var_os("SUDO_USER");
        let saved_pkexec = std::env::var_os("PKEXEC_UID");
        let saved_xdg = std::env::var_os("XDG_CONFIG_HOME");
        std::env::remove_var("SUDO_USER");
        std::env::remove_var("PKEXEC_UID");
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/xdg-test");

        let settings = FanpilotSettings::default();
        assert_eq!(settings.data_dir(), PathBuf::from("/tmp/xdg-test/fanpilot"));

        for (key, value) in [("SUDO_USER", saved_sudo), ("PKEXEC_UID", saved_pkexec), ("XDG_CONFIG_HOME", saved_xdg)] {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}
