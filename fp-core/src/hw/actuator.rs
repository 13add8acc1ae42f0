//! PWM actuator registry
//!
//! Discovers every `hwmonN/pwmM` control once at startup and records the
//! original `pwmM_enable` contents before anything is written, so the
//! firmware's configuration can be put back at shutdown.
//!
//! Only `set_mode`, `set_speed` and `restore_original_modes` write hardware.
//! Nothing here changes a fan on its own.

use crate::constants::pwm;
use crate::data::{ActuatorDevice, ActuatorMode, ControlMode};
use crate::hw::sysfs;
use fp_error::{FanpilotError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One discovered `pwmN` file and its siblings
#[derive(Debug, Clone)]
struct PwmEndpoint {
    pwm_path: PathBuf,
    enable_path: PathBuf,
    fan_input_path: PathBuf,
    name: String,
    label: Option<String>,
    chip_name: Option<String>,
}

impl PwmEndpoint {
    fn has_enable(&self) -> bool {
        self.enable_path.exists()
    }
}

/// Registry of PWM devices keyed by `pwmN` path
#[derive(Debug)]
pub struct ActuatorRegistry {
    devices: BTreeMap<PathBuf, PwmEndpoint>,
    /// Raw `pwmN_enable` contents at startup; emptied by the restore
    original_modes: BTreeMap<PathBuf, String>,
}

impl ActuatorRegistry {
    /// Enumerate PWM devices under `hwmon_root` and capture their modes
    pub fn discover(hwmon_root: &Path) -> Self {
        let mut devices = BTreeMap::new();

        for hwmon in sysfs::hwmon_dirs(hwmon_root) {
            let chip_name = sysfs::read_label(&hwmon.join("name"));

            for pwm_path in sysfs::list_matching(&hwmon, |n| sysfs::pwm_index(n).is_some()) {
                let name = pwm_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let Some(index) = sysfs::pwm_index(&name) else {
                    continue;
                };

                let label = sysfs::read_label(&hwmon.join(format!("pwm{}_label", index)))
                    .or_else(|| sysfs::read_label(&hwmon.join(format!("fan{}_label", index))));

                debug!(path = %pwm_path.display(), ?label, ?chip_name, "Found PWM device");
                devices.insert(
                    pwm_path.clone(),
                    PwmEndpoint {
                        enable_path: hwmon.join(format!("pwm{}_enable", index)),
                        fan_input_path: hwmon.join(format!("fan{}_input", index)),
                        pwm_path,
                        name,
                        label,
                        chip_name: chip_name.clone(),
                    },
                );
            }
        }

        if devices.is_empty() {
            warn!(root = %hwmon_root.display(), "No PWM devices found, fan control unavailable");
        } else {
            info!("Discovered {} PWM devices", devices.len());
        }

        let mut registry = Self {
            devices,
            original_modes: BTreeMap::new(),
        };
        registry.capture_original_modes();
        registry
    }

    /// Remember each device's mode before any mutation
    fn capture_original_modes(&mut self) {
        for device in self.devices.values() {
            if !device.has_enable() {
                continue;
            }
            match sysfs::read_trimmed(&device.enable_path) {
                Some(raw) => {
                    debug!(path = %device.enable_path.display(), mode = %raw, "Captured original mode");
                    self.original_modes.insert(device.pwm_path.clone(), raw);
                }
                None => warn!(path = %device.enable_path.display(), "Could not read original mode"),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Every controllable device path, labeled or not
    pub fn device_paths(&self) -> impl Iterator<Item = &Path> {
        self.devices.keys().map(PathBuf::as_path)
    }

    pub fn contains(&self, pwm_path: &Path) -> bool {
        self.devices.contains_key(pwm_path)
    }

    fn endpoint(&self, pwm_path: &Path) -> Result<&PwmEndpoint> {
        self.devices
            .get(pwm_path)
            .ok_or_else(|| FanpilotError::ActuatorNotFound(pwm_path.to_path_buf()))
    }

    /// Switch a device between manual and firmware control.
    ///
    /// Automatic mode tries each candidate code in order and keeps the first
    /// the driver accepts. Returns the mode now in effect.
    pub fn set_mode(&self, pwm_path: &Path, mode: ControlMode) -> Result<ActuatorMode> {
        let device = self.endpoint(pwm_path)?;

        match mode {
            ControlMode::Manual => {
                if !device.has_enable() {
                    // No enable file means manual control is always active
                    debug!(path = %pwm_path.display(), "No enable file, skipping mode write");
                    return Ok(ActuatorMode::Manual);
                }
                sysfs::write_enable_code(&device.enable_path, pwm::enable::MANUAL)?;
                debug!(path = %pwm_path.display(), "Manual mode set");
                Ok(ActuatorMode::Manual)
            }
            ControlMode::Auto => {
                if !device.has_enable() {
                    return Err(FanpilotError::ActuatorModeUnsupported {
                        path: device.enable_path.clone(),
                        tried: Vec::new(),
                    });
                }
                for code in pwm::enable::AUTOMATIC_CANDIDATES {
                    match sysfs::write_enable_code(&device.enable_path, code) {
                        Ok(()) => {
                            debug!(path = %pwm_path.display(), code, "Automatic mode set");
                            return Ok(ActuatorMode::from_code(code));
                        }
                        Err(e) => debug!(path = %pwm_path.display(), code, error = %e, "Mode code rejected"),
                    }
                }
                Err(FanpilotError::ActuatorModeUnsupported {
                    path: device.enable_path.clone(),
                    tried: pwm::enable::AUTOMATIC_CANDIDATES.to_vec(),
                })
            }
        }
    }

    /// Write a duty cycle. The percentage is clamped to 0-100 and converted
    /// with `round(p / 100 * 255)`. Returns the raw value written.
    pub fn set_speed(&self, pwm_path: &Path, percent: f64) -> Result<u8> {
        let device = self.endpoint(pwm_path)?;
        let value = pwm::from_percent(percent);
        sysfs::write_pwm_value(&device.pwm_path, value)?;
        Ok(value)
    }

    /// Current duty in percent, one decimal
    pub fn get_speed(&self, pwm_path: &Path) -> Option<f64> {
        let device = self.devices.get(pwm_path)?;
        sysfs::read_number::<u8>(&device.pwm_path).map(pwm::to_percent)
    }

    /// Fan tachometer reading paired with the device
    pub fn get_rpm(&self, pwm_path: &Path) -> Option<u32> {
        let device = self.devices.get(pwm_path)?;
        sysfs::read_number::<u32>(&device.fan_input_path)
    }

    /// Current mode, `None` when the driver exposes no enable file
    pub fn get_mode(&self, pwm_path: &Path) -> Option<ActuatorMode> {
        let device = self.devices.get(pwm_path)?;
        sysfs::read_number::<u8>(&device.enable_path).map(ActuatorMode::from_code)
    }

    /// Describe one device
    pub fn describe(&self, pwm_path: &Path) -> Option<ActuatorDevice> {
        let device = self.devices.get(pwm_path)?;
        Some(ActuatorDevice {
            path: device.pwm_path.clone(),
            name: device.name.clone(),
            label: device.label.clone(),
            chip_name: device.chip_name.clone(),
            mode: self.get_mode(pwm_path),
            duty_percent: self.get_speed(pwm_path),
            rpm: self.get_rpm(pwm_path),
        })
    }

    /// Labeled devices for display. Unlabeled devices stay controllable but
    /// are not listed.
    pub fn get_info(&self) -> Vec<ActuatorDevice> {
        self.devices
            .values()
            .filter(|d| d.label.is_some())
            .filter_map(|d| self.describe(&d.pwm_path))
            .collect()
    }

    /// Put every captured mode back. Runs once; later calls do nothing.
    /// Failures are logged and skipped. Returns how many devices were restored.
    pub fn restore_original_modes(&mut self) -> usize {
        let originals = std::mem::take(&mut self.original_modes);
        let mut restored = 0;

        for (pwm_path, raw) in originals {
            let Some(device) = self.devices.get(&pwm_path) else {
                continue;
            };
            match sysfs::write_enable_raw(&device.enable_path, &raw) {
                Ok(()) => {
                    debug!(path = %device.enable_path.display(), mode = %raw, "Restored original mode");
                    restored += 1;
                }
                Err(e) => warn!(error = %e, "Failed to restore original mode"),
            }
        }

        if restored > 0 {
            info!("Restored original mode on {} PWM devices", restored);
        }
        restored
    }
}
