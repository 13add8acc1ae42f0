//! Daemon wiring against a fake sysfs tree

use clap::Parser;
use fanpilot::cli::Cli;
use fanpilot::daemon;
use fp_core::{FanControl, MetricKind};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fake_tree(root: &Path) -> PathBuf {
    let cpu = root.join("hwmon").join("hwmon0");
    fs::create_dir_all(&cpu).unwrap();
    fs::write(cpu.join("name"), "k10temp\n").unwrap();
    fs::write(cpu.join("temp1_input"), "47500\n").unwrap();

    let fans = root.join("hwmon").join("hwmon1");
    fs::create_dir_all(&fans).unwrap();
    fs::write(fans.join("name"), "it8688\n").unwrap();
    fs::write(fans.join("pwm1"), "64\n").unwrap();
    fs::write(fans.join("pwm1_enable"), "2\n").unwrap();
    fs::write(fans.join("pwm1_label"), "Rear\n").unwrap();
    fans.join("pwm1")
}

fn write_config(root: &Path, pwm: &Path) -> PathBuf {
    let config = serde_json::json!({
        "general": {"tick_interval_ms": 2000, "notification_title": "Rig"},
        "paths": {
            "hwmon_root": root.join("hwmon"),
            "powercap_energy": root.join("powercap").join("energy_uj"),
            "drm_root": root.join("drm"),
            "data_dir": root.join("data"),
        },
        "sensors": {"use_nvml": false, "use_sensors_command": false},
        "notifications": {"backend": "log"},
        "assignments": [
            {"pwm": pwm, "control": {"mode": "manual", "percent": 100.0}},
            {"pwm": root.join("hwmon").join("hwmon1").join("pwm4"), "control": {"mode": "auto"}},
        ],
    });
    let path = root.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn test_settings_from_file_and_overrides() {
    let root = TempDir::new().unwrap();
    let pwm = fake_tree(root.path());
    let config = write_config(root.path(), &pwm);

    let cli = Cli::parse_from(["fanpilotd", "--config", config.to_str().unwrap(), "--interval-ms", "500"]);
    let settings = daemon::effective_settings(&cli);
    assert_eq!(settings.general.notification_title, "Rig");
    assert_eq!(settings.tick_interval().as_millis(), 500);
    assert_eq!(settings.curves_path(), root.path().join("data").join("curves.json"));
}

#[test]
fn test_malformed_settings_fall_back_to_defaults() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("config.json");
    fs::write(&config, "{\"general\": ").unwrap();

    let cli = Cli::parse_from(["fanpilotd", "--config", config.to_str().unwrap()]);
    let settings = daemon::effective_settings(&cli);
    assert_eq!(settings.general.notification_title, "Fanpilot");
    assert_eq!(settings.tick_interval().as_millis(), 1000);
}

#[test]
fn test_controller_applies_valid_assignments() {
    let root = TempDir::new().unwrap();
    let pwm = fake_tree(root.path());
    let config = write_config(root.path(), &pwm);
    let cli = Cli::parse_from(["fanpilotd", "--config", config.to_str().unwrap()]);
    let settings = daemon::effective_settings(&cli);

    let controller = daemon::build_controller(&settings);
    assert_eq!(fs::read_to_string(&pwm).unwrap().trim(), "255");
    assert_eq!(controller.fan_control(&pwm), Some(FanControl::Manual { percent: 100.0 }));

    assert_eq!(controller.restore_original_modes(), 1);
    let enable = pwm.with_file_name("pwm1_enable");
    assert_eq!(fs::read_to_string(enable).unwrap().trim(), "2");
}

#[test]
fn test_once_report_serializes() {
    let root = TempDir::new().unwrap();
    let pwm = fake_tree(root.path());
    let config = write_config(root.path(), &pwm);
    let cli = Cli::parse_from(["fanpilotd", "--config", config.to_str().unwrap(), "--once"]);
    let settings = daemon::effective_settings(&cli);

    let report = daemon::sample_once(&settings);
    assert_eq!(report.snapshot.value(MetricKind::CpuTemp), Some(47.5));
    assert_eq!(report.devices.len(), 1);
    assert_eq!(report.devices[0].label.as_deref(), Some("Rear"));
    // sampling never writes
    assert_eq!(fs::read_to_string(&pwm).unwrap().trim(), "64");

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["devices"][0]["path"].as_str().unwrap().ends_with("pwm1"));
}
