//! Response curve definitions

use crate::constants::curve as curve_const;
use crate::data::MetricKind;
use serde::{Deserialize, Serialize};

/// One (metric value, duty) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub metric_value: f64,
    pub fan_percent: f64,
}

impl CurvePoint {
    pub fn new(metric_value: f64, fan_percent: f64) -> Self {
        Self { metric_value, fan_percent }
    }
}

impl From<(f64, f64)> for CurvePoint {
    fn from((metric_value, fan_percent): (f64, f64)) -> Self {
        Self::new(metric_value, fan_percent)
    }
}

/// A named piecewise-linear map from one metric to a fan duty.
///
/// Points are kept sorted by metric value; every constructor and mutator
/// re-sorts.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    title: String,
    points: Vec<CurvePoint>,
    source: Option<MetricKind>,
    xlabel: String,
    ylabel: String,
}

impl Curve {
    pub fn new(title: impl Into<String>, source: MetricKind, points: Vec<CurvePoint>) -> Self {
        Self::with_labels(
            title,
            points,
            source.axis_label(),
            curve_const::DUTY_AXIS_LABEL.to_string(),
        )
    }

    /// Build from stored axis labels. The source metric is recovered from the
    /// x label and stays `None` when the label names no known metric.
    pub fn with_labels(
        title: impl Into<String>,
        points: Vec<CurvePoint>,
        xlabel: String,
        ylabel: String,
    ) -> Self {
        let mut curve = Self {
            title: title.into(),
            points,
            source: MetricKind::from_axis_label(&xlabel),
            xlabel,
            ylabel,
        };
        curve.sort_points();
        curve
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn source(&self) -> Option<MetricKind> {
        self.source
    }

    pub fn xlabel(&self) -> &str {
        &self.xlabel
    }

    pub fn ylabel(&self) -> &str {
        &self.ylabel
    }

    /// Replace the points, keeping title and labels
    pub fn set_points(&mut self, points: Vec<CurvePoint>) {
        self.points = points;
        self.sort_points();
    }

    fn sort_points(&mut self) {
        self.points
            .sort_by(|a, b| a.metric_value.total_cmp(&b.metric_value));
    }
}
