//! Constants and configuration values for Fanpilot
//!
//! Centralizes magic numbers, paths, and configuration defaults.
//! Add new values here rather than inlining them.

use std::time::Duration;

/// System paths
pub mod paths {
    use std::path::PathBuf;

    /// Base path for hwmon devices
    pub const HWMON_BASE: &str = "/sys/class/hwmon";

    /// RAPL package-0 energy accumulator, in microjoules
    pub const RAPL_ENERGY: &str = "/sys/class/powercap/intel-rapl:0/energy_uj";

    /// Sibling of the accumulator holding its wrap range
    pub const RAPL_MAX_RANGE_FILE: &str = "max_energy_range_uj";

    /// DRM device tree used by the AMD GPU probe
    pub const DRM_BASE: &str = "/sys/class/drm";

    /// System-wide daemon configuration
    pub const SYSTEM_CONFIG_FILE: &str = "/etc/fanpilot/config.json";

    /// Environment variable overriding the configuration file location
    pub const CONFIG_ENV: &str = "FANPILOT_CONFIG";

    /// Curve store file name inside the data directory
    pub const CURVES_FILE: &str = "curves.json";

    /// Alert rule file name inside the data directory
    pub const RULES_FILE: &str = "notifications.json";

    /// journald socket, present when systemd-journald is running
    pub const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

    /// Per-user runtime directory holding the session bus socket
    pub fn user_bus_socket(uid: u32) -> PathBuf {
        PathBuf::from(format!("/run/user/{}/bus", uid))
    }

    /// A line of /etc/passwd
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PasswdEntry {
        pub name: String,
        pub uid: u32,
        pub home: PathBuf,
    }

    /// Data directory for curves and rules.
    ///
    /// When the daemon runs elevated through sudo or pkexec the files belong
    /// to the invoking user, so their home is used instead of root's.
    pub fn user_data_dir() -> Option<PathBuf> {
        let config_base = if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            lookup_user(&sudo_user).map(|e| e.home.join(".config"))
        } else if let Ok(pkexec_uid) = std::env::var("PKEXEC_UID") {
            pkexec_uid
                .parse::<u32>()
                .ok()
                .and_then(lookup_uid)
                .map(|e| e.home.join(".config"))
        } else {
            None
        };

        let config_base = config_base.or_else(|| {
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                Some(PathBuf::from(xdg))
            } else if let Ok(home) = std::env::var("HOME") {
                Some(PathBuf::from(home).join(".config"))
            } else {
                dirs::config_dir()
            }
        });

        config_base.map(|p| p.join("fanpilot"))
    }

    /// Find a user by name in /etc/passwd
    pub fn lookup_user(username: &str) -> Option<PasswdEntry> {
        read_passwd().into_iter().find(|e| e.name == username)
    }

    /// Find a user by UID in /etc/passwd
    pub fn lookup_uid(uid: u32) -> Option<PasswdEntry> {
        read_passwd().into_iter().find(|e| e.uid == uid)
    }

    fn read_passwd() -> Vec<PasswdEntry> {
        std::fs::read_to_string("/etc/passwd")
            .map(|passwd| parse_passwd(&passwd))
            .unwrap_or_default()
    }

    pub(crate) fn parse_passwd(passwd: &str) -> Vec<PasswdEntry> {
        passwd
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split(':').collect();
                if parts.len() < 6 {
                    return None;
                }
                Some(PasswdEntry {
                    name: parts[0].to_string(),
                    uid: parts[2].parse().ok()?,
                    home: PathBuf::from(parts[5]),
                })
            })
            .collect()
    }
}

/// PWM-related constants
pub mod pwm {
    /// Maximum PWM value
    pub const MAX: u8 = 255;

    /// `pwmN_enable` values
    pub mod enable {
        pub const DISABLED: u8 = 0;
        pub const MANUAL: u8 = 1;

        /// Codes tried in order when handing a fan back to firmware control.
        /// Drivers disagree on which one means "automatic".
        pub const AUTOMATIC_CANDIDATES: [u8; 3] = [2, 3, 5];
    }

    /// Convert percentage (0-100) to PWM value (0-255), clamping the input
    #[inline]
    pub fn from_percent(percent: f64) -> u8 {
        ((percent.clamp(0.0, 100.0) / 100.0) * MAX as f64).round() as u8
    }

    /// Convert PWM value (0-255) to percentage (0-100), one decimal
    #[inline]
    pub fn to_percent(value: u8) -> f64 {
        ((value as f64 / MAX as f64) * 1000.0).round() / 10.0
    }
}

/// Temperature-related constants
pub mod temperature {
    /// hwmon temperatures are in millidegrees Celsius
    pub const MILLIDEGREE_DIVISOR: f64 = 1000.0;

    /// hwmon chip names whose readings make up the CPU temperature
    pub const CPU_CHIPS: [&str; 3] = ["coretemp", "k10temp", "zenpower"];

    /// Chip tokens identifying memory module sensors, matched case-insensitively
    pub const RAM_CHIP_TOKENS: [&str; 3] = ["spd5118", "dimm", "dimmtemp"];

    /// External command printing lm-sensors text output
    pub const SENSORS_COMMAND: &str = "sensors";
}

/// Energy accumulator constants
pub mod energy {
    use std::time::Duration;

    /// The accumulator wraps at 2^32 microjoules unless it reports otherwise
    pub const DEFAULT_COUNTER_MODULUS: u64 = 1 << 32;

    pub const MICROJOULES_PER_JOULE: f64 = 1_000_000.0;

    /// Gap between the two accumulator reads
    pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
}

/// Alert-related constants
pub mod alert {
    /// Fraction below threshold a value must fall to re-arm a fired rule
    pub const HYSTERESIS_MARGIN: f64 = 0.10;

    /// Default notification title
    pub const DEFAULT_TITLE: &str = "Fanpilot";

    /// Prefix added to critical notification titles
    pub const CRITICAL_TITLE_PREFIX: &str = "⚠️ ";

    /// Command used for desktop delivery
    pub const NOTIFY_COMMAND: &str = "notify-send";

    /// Command used to run the delivery as the invoking user
    pub const RUNUSER_COMMAND: &str = "runuser";
}

/// Curve-related constants
pub mod curve {
    /// Duty range every curve output is clamped to
    pub const MIN_DUTY: f64 = 0.0;
    pub const MAX_DUTY: f64 = 100.0;

    /// Y axis label written for every curve
    pub const DUTY_AXIS_LABEL: &str = "Fan Speed (%)";

    /// Floating point comparison epsilon
    pub const FLOAT_EPSILON: f64 = 0.001;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Control loop cadence
    pub const TICK_INTERVAL: Duration = Duration::from_millis(1000);

    /// Smallest cadence accepted from configuration
    pub const MIN_TICK_INTERVAL_MS: u64 = 100;
}

/// Logging
pub mod logging {
    /// Environment variable holding the tracing filter
    pub const LOG_ENV: &str = "FANPILOT_LOG";

    pub const DEFAULT_FILTER: &str = "info";
}
