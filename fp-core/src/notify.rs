//! Alert delivery
//!
//! The control loop hands fired alerts to a `Notifier`. Delivery failures are
//! reported but never stop the loop, and a failed delivery does not re-arm
//! the rule.

use crate::constants::{alert as alert_const, paths};
use crate::data::Severity;
use fp_error::{FanpilotError, Result};
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Something that can show a message to the user
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Show a message; returns an identifier for the delivered notification
    fn deliver(&self, title: &str, body: &str, severity: Severity, timeout: Duration) -> Result<u32>;
}

/// Title as shown, with the critical marker when needed
pub fn decorate_title(title: &str, severity: Severity) -> String {
    match severity {
        Severity::Critical => format!("{}{}", alert_const::CRITICAL_TITLE_PREFIX, title),
        _ => title.to_string(),
    }
}

/// Desktop user owning the graphical session when running elevated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub name: String,
    pub uid: u32,
}

impl SessionUser {
    /// The sudo caller, when this process is root under sudo
    pub fn detect() -> Option<Self> {
        // SAFETY: geteuid is always safe - it just returns the effective user ID of the process.
        if unsafe { libc::geteuid() } != 0 {
            return None;
        }
        let name = std::env::var("SUDO_USER").ok().filter(|n| !n.is_empty() && n != "root")?;
        let uid = std::env::var("SUDO_UID")
            .ok()
            .and_then(|u| u.parse::<u32>().ok())
            .or_else(|| paths::lookup_user(&name).map(|e| e.uid))?;
        Some(Self { name, uid })
    }
}

/// Delivers through `notify-send`
pub struct DesktopNotifier {
    app_name: String,
    session_user: Option<SessionUser>,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        let session_user = SessionUser::detect();
        if let Some(user) = &session_user {
            info!(user = %user.name, uid = user.uid, "Notifications fall back to the sudo user's session");
        }
        Self {
            app_name: app_name.into(),
            session_user,
        }
    }

    /// `notify-send` arguments for one message
    pub fn notify_send_args(
        &self,
        title: &str,
        body: &str,
        severity: Severity,
        timeout: Duration,
    ) -> Vec<String> {
        let mut args = vec![
            format!("--app-name={}", self.app_name),
            format!("--urgency={}", severity.urgency().as_str()),
            format!("--icon={}", severity.icon()),
            "--print-id".to_string(),
        ];
        if !timeout.is_zero() {
            args.push(format!("--expire-time={}", timeout.as_millis()));
        }
        args.push(decorate_title(title, severity));
        args.push(body.to_string());
        args
    }

    fn run(mut command: Command) -> Result<u32> {
        let output = command
            .output()
            .map_err(|e| FanpilotError::delivery(format!("failed to start notify-send: {}", e)))?;
        if !output.status.success() {
            return Err(FanpilotError::delivery(format!(
                "notify-send exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().parse().unwrap_or(0))
    }
}

/// Arguments running `notify-send` inside another user's session
pub fn session_user_args(user: &SessionUser, bus_available: bool, notify_args: &[String]) -> Vec<String> {
    let mut args = vec!["-u".to_string(), user.name.clone(), "--".to_string(), "env".to_string()];
    if bus_available {
        args.push(format!(
            "DBUS_SESSION_BUS_ADDRESS=unix:path={}",
            paths::user_bus_socket(user.uid).display()
        ));
    }
    args.push(alert_const::NOTIFY_COMMAND.to_string());
    args.extend(notify_args.iter().cloned());
    args
}

impl Notifier for DesktopNotifier {
    fn deliver(&self, title: &str, body: &str, severity: Severity, timeout: Duration) -> Result<u32> {
        let args = self.notify_send_args(title, body, severity, timeout);

        let mut direct = Command::new(alert_const::NOTIFY_COMMAND);
        direct.args(&args);
        let first_error = match Self::run(direct) {
            Ok(id) => return Ok(id),
            Err(e) => e,
        };

        let Some(user) = &self.session_user else {
            return Err(first_error);
        };
        debug!(error = %first_error, user = %user.name, "Direct delivery failed, retrying as session user");

        let bus_available = paths::user_bus_socket(user.uid).exists();
        let mut as_user = Command::new(alert_const::RUNUSER_COMMAND);
        as_user.args(session_user_args(user, bus_available, &args));
        Self::run(as_user)
    }
}

/// Writes alerts to the log only
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicU32,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    fn deliver(&self, title: &str, body: &str, severity: Severity, _timeout: Duration) -> Result<u32> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        match severity {
            Severity::Info => info!(id, %title, "ALERT: {}", body),
            Severity::Warning => warn!(id, %title, "ALERT: {}", body),
            Severity::Error | Severity::Critical => error!(id, %title, %severity, "ALERT: {}", body),
        }
        Ok(id)
    }
}
