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

//! Command line interface

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fanpilotd")]
#[command(version)]
#[command(about = "Fanpilot - telemetry driven fan control for Linux")]
#[command(long_about = "Fanpilot - telemetry driven fan control for Linux

Samples CPU, GPU, and memory telemetry every tick, drives curve-assigned
PWM fans, and raises desktop notifications when alert thresholds are crossed.
Original fan modes are restored on exit.

EXAMPLES:
    fanpilotd                          Run the control loop
    fanpilotd --once                   Print one snapshot and the fan list as JSON
    fanpilotd --config ./fanpilot.json --interval-ms 500

ENVIRONMENT VARIABLES:
    FANPILOT_CONFIG    Settings file (default /etc/fanpilot/config.json)
    FANPILOT_LOG       Log filter, e.g. debug or fp_core=trace (default info)

FILES:
    ~/.config/fanpilot/curves.json         Fan curve definitions
    ~/.config/fanpilot/notifications.json  Alert rules")]
pub struct Cli {
    /// Settings file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Control loop cadence, overrides the settings file
    #[arg(short, long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Sample once, print the snapshot and devices as JSON, and exit
    #[arg(long)]
    pub once: bool,

    /// Log filter, overrides FANPILOT_LOG
    #[arg(short, long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl Cli {
    /// `--config`, else `$FANPILOT_CONFIG`, else the system settings file
    pub fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(fp_core::settings::get_settings_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["fanpilotd"]);
        assert!(cli.config.is_none());
        assert!(cli.interval_ms.is_none());
        assert!(!cli.once);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::parse_from([
            "fanpilotd",
            "--config",
            "/tmp/fanpilot.json",
            "--interval-ms",
            "500",
            "--once",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.settings_path(), PathBuf::from("/tmp/fanpilot.json"));
        assert_eq!(cli.interval_ms, Some(500));
        assert!(cli.once);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_rejects_non_numeric_interval() {
        assert!(Cli::try_parse_from(["fanpilotd", "--interval-ms", "fast"]).is_err());
    }
}
