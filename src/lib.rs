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

//! Fanpilot - telemetry driven fan control for Linux
//!
//! The daemon side of the workspace: command line parsing, log setup, and
//! the wiring from settings to the `fp-core` control loop.

pub mod cli;
pub mod daemon;
pub mod logger;
