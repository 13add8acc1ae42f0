//! AMD GPU telemetry via sysfs (amdgpu driver)
//!
//! Readings come from `/sys/class/drm/card*/device/hwmon/hwmon*`. Temperatures
//! are in millidegrees, power in microwatts.

use crate::{gpu_const, GpuReading, GpuVendor, Result};
use fp_error::FanpilotError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One `tempN_input` file with its optional `tempN_label`
#[derive(Debug, Clone, PartialEq)]
pub struct TempSensor {
    pub label: Option<String>,
    pub celsius: f32,
}

/// Read the first AMD card under `drm_root` that reports a temperature.
pub fn read_gpu(drm_root: &Path) -> Result<GpuReading> {
    if !drm_root.exists() {
        return Err(FanpilotError::HardwareNotFound(format!(
            "DRM path {} not found",
            drm_root.display()
        )));
    }

    for device_path in card_devices(drm_root)? {
        if !is_amd_gpu(&device_path) {
            continue;
        }

        let hwmons = hwmon_dirs(&device_path);
        let sensors: Vec<TempSensor> = hwmons.iter().flat_map(|h| read_temp_sensors(h)).collect();
        let Some(temperature) = select_temperature(&sensors) else {
            debug!(device = %device_path.display(), "AMD GPU has no readable temperature");
            continue;
        };

        let (vram_total_mb, vram_used_mb) = read_vram(&device_path);

        return Ok(GpuReading {
            vendor: GpuVendor::Amd,
            name: read_gpu_name(&device_path),
            temperature_c: Some(temperature),
            power_watts: hwmons.iter().find_map(|h| read_power(h)),
            utilization_percent: read_utilization(&device_path),
            vram_used_mb,
            vram_total_mb,
        });
    }

    Err(FanpilotError::HardwareNotFound("no AMD GPU with temperature sensors".to_string()))
}

/// Pick the die temperature: an `edge`/`junction` labeled sensor wins, in file
/// order, otherwise the first unlabeled sensor.
pub fn select_temperature(sensors: &[TempSensor]) -> Option<f32> {
    let preferred = sensors.iter().find(|s| {
        s.label
            .as_deref()
            .map(|l| gpu_const::AMD_PREFERRED_TEMP_LABELS.contains(&l.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    });

    preferred
        .or_else(|| sensors.iter().find(|s| s.label.is_none()))
        .map(|s| s.celsius)
}

/// `cardN` entries (connector entries like `card0-DP-1` are skipped), sorted.
fn card_devices(drm_root: &Path) -> Result<Vec<PathBuf>> {
    let mut cards: Vec<PathBuf> = fs::read_dir(drm_root)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with("card") && !name.contains('-')
        })
        .map(|e| e.path().join("device"))
        .collect();
    cards.sort();
    Ok(cards)
}

fn is_amd_gpu(device_path: &Path) -> bool {
    fs::read_to_string(device_path.join("vendor"))
        .map(|v| v.trim() == gpu_const::AMD_VENDOR_ID)
        .unwrap_or(false)
}

fn hwmon_dirs(device_path: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(device_path.join("hwmon"))
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with("hwmon"))
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();
    dirs.sort();
    dirs
}

fn read_temp_sensors(hwmon_path: &Path) -> Vec<TempSensor> {
    let mut inputs: Vec<PathBuf> = fs::read_dir(hwmon_path)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| {
                            let n = n.to_string_lossy();
                            n.starts_with("temp") && n.ends_with("_input")
                        })
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();
    inputs.sort();

    inputs
        .into_iter()
        .filter_map(|input| {
            let celsius = fs::read_to_string(&input)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .map(|millidegrees| millidegrees as f32 / gpu_const::MILLIDEGREE_DIVISOR)?;
            let label_path = input.to_string_lossy().replace("_input", "_label");
            let label = fs::read_to_string(label_path)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            Some(TempSensor { label, celsius })
        })
        .collect()
}

fn read_gpu_name(device_path: &Path) -> String {
    for file in ["product_name", "model"] {
        if let Ok(name) = fs::read_to_string(device_path.join(file)) {
            let name = name.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    gpu_const::AMD_DEFAULT_NAME.to_string()
}

fn read_vram(device_path: &Path) -> (Option<u32>, Option<u32>) {
    let read_mb = |file: &str| {
        fs::read_to_string(device_path.join(file))
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|bytes| (bytes / gpu_const::BYTES_PER_MB) as u32)
    };
    (read_mb("mem_info_vram_total"), read_mb("mem_info_vram_used"))
}

fn read_power(hwmon_path: &Path) -> Option<f32> {
    let mut averages: Vec<PathBuf> = fs::read_dir(hwmon_path)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| {
                    let n = n.to_string_lossy();
                    n.starts_with("power") && n.ends_with("_average")
                })
                .unwrap_or(false)
        })
        .collect();
    averages.sort();

    averages.iter().find_map(|p| {
        fs::read_to_string(p)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|microwatts| microwatts as f32 / gpu_const::MICROWATTS_PER_WATT)
    })
}

fn read_utilization(device_path: &Path) -> Option<f32> {
    fs::read_to_string(device_path.join("gpu_busy_percent"))
        .ok()
        .and_then(|s| s.trim().parse::<f32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sensor(label: Option<&str>, celsius: f32) -> TempSensor {
        TempSensor { label: label.map(String::from), celsius }
    }

    fn fake_card(root: &Path, card: &str, vendor: &str) -> PathBuf {
        let device = root.join(card).join("device");
        let hwmon = device.join("hwmon").join("hwmon3");
        fs::create_dir_all(&hwmon).unwrap();
        fs::write(device.join("vendor"), format!("{}\n", vendor)).unwrap();
        hwmon
    }

    #[test]
    fn test_select_prefers_edge_over_unlabeled() {
        let sensors = vec![sensor(None, 40.0), sensor(Some("mem"), 70.0), sensor(Some("edge"), 55.0)];
        assert_eq!(select_temperature(&sensors), Some(55.0));
    }

    #[test]
    fn test_select_falls_back_to_first_unlabeled() {
        let sensors = vec![sensor(Some("mem"), 70.0), sensor(None, 41.0), sensor(None, 42.0)];
        assert_eq!(select_temperature(&sensors), Some(41.0));
    }

    #[test]
    fn test_select_nothing_usable() {
        assert_eq!(select_temperature(&[sensor(Some("mem"), 70.0)]), None);
        assert_eq!(select_temperature(&[]), None);
    }

    #[test]
    fn test_read_gpu_from_fake_tree() {
        let dir = TempDir::new().unwrap();
        let hwmon = fake_card(dir.path(), "card1", "0x1002");
        let device = hwmon.parent().unwrap().parent().unwrap();
        fs::write(hwmon.join("temp1_input"), "52000\n").unwrap();
        fs::write(hwmon.join("temp1_label"), "edge\n").unwrap();
        fs::write(hwmon.join("temp2_input"), "61000\n").unwrap();
        fs::write(hwmon.join("temp2_label"), "junction\n").unwrap();
        fs::write(hwmon.join("power1_average"), "35000000\n").unwrap();
        fs::write(device.join("gpu_busy_percent"), "17\n").unwrap();
        fs::write(device.join("product_name"), "Radeon RX 7800 XT\n").unwrap();
        // connector entries are ignored
        fs::create_dir_all(dir.path().join("card1-DP-1")).unwrap();

        let reading = read_gpu(dir.path()).unwrap();
        assert_eq!(reading.vendor, GpuVendor::Amd);
        assert_eq!(reading.name, "Radeon RX 7800 XT");
        assert_eq!(reading.temperature_c, Some(52.0));
        assert_eq!(reading.power_watts, Some(35.0));
        assert_eq!(reading.utilization_percent, Some(17.0));
    }

    #[test]
    fn test_non_amd_cards_are_skipped() {
        let dir = TempDir::new().unwrap();
        let hwmon = fake_card(dir.path(), "card0", "0x8086");
        fs::write(hwmon.join("temp1_input"), "48000\n").unwrap();

        assert!(matches!(read_gpu(dir.path()), Err(FanpilotError::HardwareNotFound(_))));
    }

    #[test]
    fn test_missing_drm_root() {
        let dir = TempDir::new().unwrap();
        assert!(read_gpu(&dir.path().join("nope")).is_err());
    }
}
