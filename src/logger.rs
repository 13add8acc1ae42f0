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

//! Log setup: systemd journal when available, stdout otherwise

use fp_core::constants::{logging, paths};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Where log records end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Journald,
    Stdout,
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogTarget::Journald => write!(f, "systemd journal"),
            LogTarget::Stdout => write!(f, "stdout"),
        }
    }
}

/// Filter directive: explicit override, else `$FANPILOT_LOG`, else `info`
pub fn filter_directive(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(logging::LOG_ENV).ok())
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| logging::DEFAULT_FILTER.to_string())
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(directive: &str) -> LogTarget {
    if Path::new(paths::JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(EnvFilter::new(directive))
                    .init();
                return LogTarget::Journald;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(EnvFilter::new(directive))
        .init();
    LogTarget::Stdout
}
