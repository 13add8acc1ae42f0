//! JSON persistence for curves and alert rules
//!
//! Both stores load tolerantly: a missing, empty, or unparsable file is an
//! empty store, and individually malformed entries are skipped. Saves rewrite
//! the whole file through a temp file and rename.

use crate::data::{AlertRule, Curve, CurvePoint, NewAlertRule};
use fp_error::{FanpilotError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A curve as written to the curve file, keyed by title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCurve {
    pub data: Vec<(f64, f64)>,
    #[serde(default)]
    pub xlabel: String,
    #[serde(default)]
    pub ylabel: String,
}

impl PersistedCurve {
    fn from_curve(curve: &Curve) -> Self {
        Self {
            data: curve
                .points()
                .iter()
                .map(|p| (p.metric_value, p.fan_percent))
                .collect(),
            xlabel: curve.xlabel().to_string(),
            ylabel: curve.ylabel().to_string(),
        }
    }

    fn into_curve(self, title: &str) -> Curve {
        let points = self.data.into_iter().map(CurvePoint::from).collect();
        Curve::with_labels(title, points, self.xlabel, self.ylabel)
    }
}

/// Rule file layout: `{"notifications": [...]}`
#[derive(Debug, Serialize, Deserialize)]
struct RuleFile<T> {
    #[serde(default = "Vec::new")]
    notifications: Vec<T>,
}

/// Named curves backed by one JSON file
#[derive(Debug)]
pub struct CurveStore {
    path: PathBuf,
    curves: BTreeMap<String, Curve>,
}

impl CurveStore {
    /// Load the store; never fails, see module docs
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut curves = BTreeMap::new();

        if let Some(Value::Object(entries)) = read_document(&path) {
            for (title, entry) in entries {
                match serde_json::from_value::<PersistedCurve>(entry) {
                    Ok(persisted) => {
                        curves.insert(title.clone(), persisted.into_curve(&title));
                    }
                    Err(e) => warn!(path = %path.display(), curve = %title, error = %e, "Skipping malformed curve"),
                }
            }
        } else if path.exists() {
            debug!(path = %path.display(), "Curve file holds no curve map");
        }

        info!("Loaded {} curves from {:?}", curves.len(), path);
        Self { path, curves }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All curves, ordered by title
    pub fn list(&self) -> Vec<&Curve> {
        self.curves.values().collect()
    }

    pub fn get(&self, title: &str) -> Option<&Curve> {
        self.curves.get(title)
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Add a curve, replacing any curve with the same title, and save
    pub fn add(&mut self, curve: Curve) -> Result<()> {
        validate_curve(&curve)?;
        debug!(curve = %curve.title(), points = curve.points().len(), "Storing curve");
        let mut staged = self.curves.clone();
        staged.insert(curve.title().to_string(), curve);
        self.commit(staged)
    }

    /// Replace the points of an existing curve and save.
    /// Returns `false` when no curve has that title.
    pub fn update(&mut self, title: &str, points: Vec<CurvePoint>) -> Result<bool> {
        let Some(existing) = self.curves.get(title) else {
            return Ok(false);
        };
        let mut curve = existing.clone();
        curve.set_points(points);
        validate_curve(&curve)?;
        let mut staged = self.curves.clone();
        staged.insert(title.to_string(), curve);
        self.commit(staged)?;
        Ok(true)
    }

    /// Remove a curve and save. Returns `false` when no curve has that title.
    pub fn remove(&mut self, title: &str) -> Result<bool> {
        if !self.curves.contains_key(title) {
            return Ok(false);
        }
        let mut staged = self.curves.clone();
        staged.remove(title);
        self.commit(staged)?;
        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        write_curves(&self.path, &self.curves)
    }

    /// Persist `staged`, then adopt it; memory is left untouched on failure
    fn commit(&mut self, staged: BTreeMap<String, Curve>) -> Result<()> {
        write_curves(&self.path, &staged)?;
        self.curves = staged;
        Ok(())
    }
}

fn write_curves(path: &Path, curves: &BTreeMap<String, Curve>) -> Result<()> {
    let document: BTreeMap<&str, PersistedCurve> = curves
        .iter()
        .map(|(title, curve)| (title.as_str(), PersistedCurve::from_curve(curve)))
        .collect();
    write_json_atomic(path, &document)?;
    debug!("Saved {} curves to {:?}", document.len(), path);
    Ok(())
}

fn validate_curve(curve: &Curve) -> Result<()> {
    if curve.title().trim().is_empty() {
        return Err(FanpilotError::InvalidCurve("title must not be empty".to_string()));
    }
    if let Some(p) = curve
        .points()
        .iter()
        .find(|p| !p.metric_value.is_finite() || !p.fan_percent.is_finite())
    {
        return Err(FanpilotError::InvalidCurve(format!(
            "point ({}, {}) is not a finite number",
            p.metric_value, p.fan_percent
        )));
    }
    Ok(())
}

/// Alert rules backed by one JSON file
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    rules: Vec<AlertRule>,
}

impl RuleStore {
    /// Load the store; never fails, see module docs
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut rules: Vec<AlertRule> = Vec::new();

        if let Some(document) = read_document(&path) {
            match serde_json::from_value::<RuleFile<Value>>(document) {
                Ok(file) => {
                    for entry in file.notifications {
                        match serde_json::from_value::<AlertRule>(entry) {
                            Ok(rule) if rules.iter().any(|r| r.id == rule.id) => {
                                warn!(path = %path.display(), id = rule.id, "Skipping rule with duplicate id");
                            }
                            Ok(rule) => rules.push(rule),
                            Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed rule"),
                        }
                    }
                }
                Err(e) => {
                    let err = FanpilotError::corrupt(&path, e.to_string());
                    warn!("{}, starting with no rules", err);
                }
            }
        }

        info!("Loaded {} alert rules from {:?}", rules.len(), path);
        Self { path, rules }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn get(&self, id: u64) -> Option<&AlertRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Store a new rule under the next free id and save
    pub fn add(&mut self, rule: NewAlertRule) -> Result<AlertRule> {
        if !rule.threshold.is_finite() {
            return Err(FanpilotError::InvalidRule(format!(
                "threshold {} is not a finite number",
                rule.threshold
            )));
        }

        let id = match self.rules.iter().map(|r| r.id).max() {
            Some(last) => last.checked_add(1).ok_or_else(|| {
                FanpilotError::InvalidRule(format!("no rule id left after {}", last))
            })?,
            None => 0,
        };
        let rule = AlertRule {
            id,
            message: rule.message,
            severity: rule.severity,
            metric: rule.metric,
            threshold: rule.threshold,
        };
        let mut staged = self.rules.clone();
        staged.push(rule.clone());
        self.commit(staged)?;
        Ok(rule)
    }

    /// Delete a rule and save. Returns `false` when the id is unknown.
    pub fn remove(&mut self, id: u64) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        let staged: Vec<AlertRule> = self.rules.iter().filter(|r| r.id != id).cloned().collect();
        self.commit(staged)?;
        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        write_rules(&self.path, &self.rules)
    }

    /// Persist `staged`, then adopt it; memory is left untouched on failure
    fn commit(&mut self, staged: Vec<AlertRule>) -> Result<()> {
        write_rules(&self.path, &staged)?;
        self.rules = staged;
        Ok(())
    }
}

fn write_rules(path: &Path, rules: &[AlertRule]) -> Result<()> {
    let file = RuleFile { notifications: rules.to_vec() };
    write_json_atomic(path, &file)?;
    debug!("Saved {} alert rules to {:?}", rules.len(), path);
    Ok(())
}

/// Read and parse a JSON document, mapping every failure to `None`
fn read_document(path: &Path) -> Option<Value> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No file found at {:?}, starting empty", path);
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read file, starting empty");
            return None;
        }
    };

    if contents.trim().is_empty() {
        debug!("File {:?} is empty", path);
        return None;
    }

    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            let err = FanpilotError::corrupt(path, e.to_string());
            warn!("{}, starting empty", err);
            None
        }
    }
}

/// Write JSON to `path` atomically: temp file, fsync, rename
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| FanpilotError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&temp_path).map_err(|e| FanpilotError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;
    file.write_all(json.as_bytes())
        .map_err(|e| FanpilotError::FileWrite { path: temp_path.clone(), source: e })?;
    file.sync_all()
        .map_err(|e| FanpilotError::FileWrite { path: temp_path.clone(), source: e })?;

    fs::rename(&temp_path, path).map_err(|e| FanpilotError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
