//! PWM and sensor file access
//!
//! Low-level read/write operations on hwmon attribute files.
//!
//! # PWM Values
//!
//! PWM values range from 0 to 255:
//! - 0 = fan off (or minimum speed on some fans)
//! - 255 = full speed
//!
//! # Temperature Values
//!
//! Linux hwmon reports temperatures in millidegrees Celsius.
//! Everything above this module works in Celsius.

use fp_error::{FanpilotError, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::temperature;

/// Write a raw PWM value (0-255)
pub fn write_pwm_value(pwm_path: &Path, value: u8) -> Result<()> {
    fs::write(pwm_path, value.to_string()).map_err(|e| {
        FanpilotError::actuator_write(pwm_path, format!("Failed to write PWM value {}: {}", value, e))
    })
}

/// Write a `pwmN_enable` code
pub fn write_enable_code(enable_path: &Path, code: u8) -> Result<()> {
    write_enable_raw(enable_path, &code.to_string())
}

/// Write a `pwmN_enable` value exactly as given (used to restore captured modes)
pub fn write_enable_raw(enable_path: &Path, raw: &str) -> Result<()> {
    fs::write(enable_path, raw).map_err(|e| {
        FanpilotError::actuator_write(enable_path, format!("Failed to write mode '{}': {}", raw, e))
    })
}

/// Read the first line of an attribute, trimmed
pub fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Read a non-empty text attribute such as `name` or `pwmN_label`
pub fn read_label(path: &Path) -> Option<String> {
    read_trimmed(path).filter(|s| !s.is_empty())
}

/// Read and parse a numeric attribute
pub fn read_number<T: std::str::FromStr>(path: &Path) -> Option<T> {
    read_trimmed(path).and_then(|s| s.parse::<T>().ok())
}

/// Read a `tempN_input` file as Celsius
pub fn read_celsius(path: &Path) -> Option<f64> {
    read_number::<i64>(path).map(|m| m as f64 / temperature::MILLIDEGREE_DIVISOR)
}

/// `hwmonN` directories under `root`, sorted by name
pub fn hwmon_dirs(root: &Path) -> Vec<PathBuf> {
    list_matching(root, |name| name.starts_with("hwmon"))
}

/// Entries of `dir` whose file name satisfies `filter`, sorted by path
pub fn list_matching(dir: &Path, filter: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| filter(&e.file_name().to_string_lossy()))
                .map(|e| e.path())
                .collect()
        })
        .unwrap_or_default();
    paths.sort();
    paths
}

/// `tempN_input` files of one hwmon directory with their labels
pub fn temp_inputs(hwmon_dir: &Path) -> Vec<(PathBuf, Option<String>)> {
    list_matching(hwmon_dir, |name| name.starts_with("temp") && name.ends_with("_input"))
        .into_iter()
        .map(|input| {
            let label = input
                .file_name()
                .map(|n| input.with_file_name(n.to_string_lossy().replace("_input", "_label")))
                .and_then(|label_path| read_label(&label_path));
            (input, label)
        })
        .collect()
}

/// Extract N from names like `pwmN` (exact match only)
pub fn pwm_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("pwm")?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
