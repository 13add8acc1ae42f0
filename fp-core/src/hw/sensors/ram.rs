//! Memory module temperature
//!
//! DIMM sensors (SPD5118 hubs on DDR5, jc42-style DIMM sensors) are read from
//! the lm-sensors text output first, then from hwmon directly. Both paths are
//! best effort; the text format is not a stable interface.

use crate::constants::temperature;
use crate::hw::sysfs;
use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

static TEMP_VALUE: OnceLock<Option<Regex>> = OnceLock::new();

fn temp_value_pattern() -> Option<&'static Regex> {
    TEMP_VALUE
        .get_or_init(|| Regex::new(r":\s*([+-]?\d+(?:\.\d+)?)\s*°C").ok())
        .as_ref()
}

fn is_ram_chip(name: &str) -> bool {
    let name = name.to_lowercase();
    temperature::RAM_CHIP_TOKENS.iter().any(|t| name.contains(t))
}

/// Collect DIMM temperatures from `sensors` output.
///
/// A block opens at a chip header naming a memory sensor and closes at a
/// blank line or at the next chip header. Every `label: +NN.N°C` line inside
/// contributes its first value.
pub fn parse_sensors_output(output: &str) -> Vec<f64> {
    let mut readings = Vec::new();
    let mut in_ram_block = false;

    for line in output.lines() {
        if line.trim().is_empty() {
            in_ram_block = false;
            continue;
        }

        let indented = line.starts_with(char::is_whitespace);
        if !indented && !line.contains(':') {
            in_ram_block = is_ram_chip(line);
            continue;
        }

        if !in_ram_block {
            continue;
        }

        let value = temp_value_pattern()
            .and_then(|re| re.captures(line))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        if let Some(value) = value {
            readings.push(value);
        }
    }

    readings
}

/// Run `sensors` and parse its output; empty when the tool is missing
pub fn read_from_sensors_command() -> Vec<f64> {
    match Command::new(temperature::SENSORS_COMMAND).output() {
        Ok(output) if output.status.success() => {
            parse_sensors_output(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            debug!(status = %output.status, "sensors exited with failure");
            Vec::new()
        }
        Err(e) => {
            debug!(error = %e, "sensors command unavailable");
            Vec::new()
        }
    }
}

/// Read every temperature of hwmon chips named like a memory sensor
pub fn read_from_hwmon(hwmon_root: &Path) -> Vec<f64> {
    sysfs::hwmon_dirs(hwmon_root)
        .into_iter()
        .filter(|dir| {
            sysfs::read_label(&dir.join("name"))
                .map(|name| is_ram_chip(&name))
                .unwrap_or(false)
        })
        .flat_map(|dir| sysfs::temp_inputs(&dir))
        .filter_map(|(input, _)| sysfs::read_celsius(&input))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SENSORS_OUTPUT: &str = "\
coretemp-isa-0000
Adapter: ISA adapter
Package id 0:  +48.0°C  (high = +80.0°C, crit = +100.0°C)
Core 0:        +45.0°C  (high = +80.0°C, crit = +100.0°C)

spd5118-i2c-0-51
Adapter: SMBus I801 adapter at efa0
temp1:        +35.5°C  (low  =  +0.0°C, high = +55.0°C)
                       (crit low =  +0.0°C, crit = +85.0°C)

spd5118-i2c-0-53
Adapter: SMBus I801 adapter at efa0
temp1:        +36.5°C  (low  =  +0.0°C, high = +55.0°C)

nvme-pci-0100
Adapter: PCI adapter
Composite:    +41.9°C  (low  = -273.1°C, high = +81.8°C)
";

    #[test]
    fn test_parses_only_memory_blocks() {
        assert_eq!(parse_sensors_output(SENSORS_OUTPUT), vec![35.5, 36.5]);
    }

    #[test]
    fn test_block_ends_at_next_header_without_blank_line() {
        let output = "jc42-dimmtemp-0018\nAdapter: SMBus\ntemp1: +30.0°C\nacpitz-acpi-0\ntemp1: +27.8°C\n";
        assert_eq!(parse_sensors_output(output), vec![30.0]);
    }

    #[test]
    fn test_no_memory_sensors() {
        assert!(parse_sensors_output("coretemp-isa-0000\nCore 0: +45.0°C\n").is_empty());
        assert!(parse_sensors_output("").is_empty());
    }

    #[test]
    fn test_hwmon_fallback() {
        let root = TempDir::new().unwrap();
        let dimm = root.path().join("hwmon4");
        let other = root.path().join("hwmon5");
        fs::create_dir_all(&dimm).unwrap();
        fs::create_dir_all(&other).unwrap();
        fs::write(dimm.join("name"), "spd5118\n").unwrap();
        fs::write(dimm.join("temp1_input"), "34250").unwrap();
        fs::write(other.join("name"), "acpitz\n").unwrap();
        fs::write(other.join("temp1_input"), "27800").unwrap();

        assert_eq!(read_from_hwmon(root.path()), vec![34.25]);
    }
}
