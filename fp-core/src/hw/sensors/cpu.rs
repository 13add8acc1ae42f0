//! CPU temperature and package power
//!
//! Temperature is the mean of every reading the CPU hwmon chip exposes.
//! Power comes from the RAPL energy accumulator, which counts microjoules
//! and wraps around; two reads a short interval apart give the average
//! draw over that interval.

use crate::constants::{energy, paths, temperature};
use crate::hw::sysfs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Mean of all CPU chip temperature readings under `hwmon_root`
pub fn read_cpu_temperature(hwmon_root: &Path) -> Option<f64> {
    let readings: Vec<f64> = sysfs::hwmon_dirs(hwmon_root)
        .into_iter()
        .filter(|dir| {
            sysfs::read_label(&dir.join("name"))
                .map(|name| temperature::CPU_CHIPS.contains(&name.as_str()))
                .unwrap_or(false)
        })
        .flat_map(|dir| sysfs::temp_inputs(&dir))
        .filter_map(|(input, _)| sysfs::read_celsius(&input))
        .collect();

    mean(&readings)
}

/// Energy consumed between two accumulator reads, accounting for one wrap.
/// `None` when the first read already lies beyond the assumed wrap point.
pub fn energy_delta(first: u64, second: u64, modulus: u64) -> Option<u64> {
    if second >= first {
        Some(second - first)
    } else {
        modulus.checked_sub(first)?.checked_add(second)
    }
}

/// Average package power in watts over `interval`.
///
/// Blocks the calling thread for `interval`. `None` when the accumulator is
/// unreadable or its reads do not fit the wrap range.
pub fn read_cpu_power(energy_path: &Path, interval: Duration) -> Option<f64> {
    let first = sysfs::read_number::<u64>(energy_path)?;
    let started = Instant::now();
    thread::sleep(interval);
    let second = sysfs::read_number::<u64>(energy_path)?;
    let elapsed = started.elapsed().as_secs_f64();

    if elapsed <= 0.0 {
        return None;
    }

    let modulus = counter_modulus(energy_path);
    let Some(delta) = energy_delta(first, second, modulus) else {
        debug!(first, second, modulus, "Accumulator reads do not fit its wrap range");
        return None;
    };
    let joules = delta as f64 / energy::MICROJOULES_PER_JOULE;
    Some(joules / elapsed)
}

/// Wrap point of the accumulator: its advertised range plus one, or 2^32
fn counter_modulus(energy_path: &Path) -> u64 {
    energy_path
        .parent()
        .and_then(|dir| sysfs::read_number::<u64>(&dir.join(paths::RAPL_MAX_RANGE_FILE)))
        .map(|max| max.saturating_add(1))
        .filter(|m| *m > 1)
        .unwrap_or_else(|| {
            debug!("No accumulator range advertised, assuming 32-bit wrap");
            energy::DEFAULT_COUNTER_MODULUS
        })
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
