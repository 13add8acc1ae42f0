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

//! Fanpilot daemon (fanpilotd)
//!
//! Samples hardware telemetry once per tick, drives curve-assigned PWM fans,
//! and raises alerts. Needs root for writes under /sys.

use anyhow::Context;
use clap::Parser;
use fanpilot::cli::Cli;
use fanpilot::{daemon, logger};
use tracing::{info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = logger::filter_directive(cli.log_level.as_deref());
    let target = logger::init(&directive);

    info!("STARTUP: fanpilotd {} starting", VERSION);
    info!("STARTUP: Logging to {} (filter {})", target, directive);

    let settings = daemon::effective_settings(&cli);

    if cli.once {
        let report = daemon::sample_once(&settings);
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize snapshot")?;
        println!("{}", json);
        return Ok(());
    }

    // SAFETY: geteuid is always safe - it just returns the effective user ID of the process.
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root: fan control writes will fail, telemetry and alerts still work");
    }

    daemon::run(settings).await;
    info!("SHUTDOWN: fanpilotd terminated gracefully");
    Ok(())
}
