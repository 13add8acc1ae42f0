//! Curve evaluation
//!
//! Maps a metric value to a fan duty by linear interpolation between the
//! curve's points:
//!
//! - Below the first point: the first point's duty
//! - Above the last point: the last point's duty
//! - Between points: linear interpolation on the bracketing segment
//!
//! The result is always clamped to 0-100. An empty curve yields 0.

use crate::constants::curve as curve_const;
use crate::data::{Curve, CurvePoint, Snapshot};

/// Evaluate sorted points at `value`
pub fn evaluate_points(points: &[CurvePoint], value: f64) -> f64 {
    let (Some(first_point), Some(last_point)) = (points.first(), points.last()) else {
        return curve_const::MIN_DUTY;
    };

    let duty = if value <= first_point.metric_value {
        first_point.fan_percent
    } else if value >= last_point.metric_value {
        last_point.fan_percent
    } else {
        points
            .windows(2)
            .find(|w| value >= w[0].metric_value && value <= w[1].metric_value)
            .map(|w| interpolate(&w[0], &w[1], value))
            .unwrap_or(last_point.fan_percent)
    };

    duty.clamp(curve_const::MIN_DUTY, curve_const::MAX_DUTY)
}

fn interpolate(lower_point: &CurvePoint, upper_point: &CurvePoint, value: f64) -> f64 {
    let span = upper_point.metric_value - lower_point.metric_value;

    // Two points at the same x
    if span.abs() < curve_const::FLOAT_EPSILON {
        return lower_point.fan_percent;
    }

    let ratio = (value - lower_point.metric_value) / span;
    lower_point.fan_percent + ratio * (upper_point.fan_percent - lower_point.fan_percent)
}

impl Curve {
    /// Target duty for a metric value
    pub fn evaluate(&self, value: f64) -> f64 {
        evaluate_points(self.points(), value)
    }

    /// Target duty for the curve's source metric in `snapshot`.
    ///
    /// `None` when the curve names no metric or the metric is absent; an
    /// absent reading never drives a fan.
    pub fn evaluate_snapshot(&self, snapshot: &Snapshot) -> Option<f64> {
        let value = snapshot.value(self.source()?)?;
        Some(self.evaluate(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MetricKind;
    use std::time::SystemTime;

    fn test_curve() -> Curve {
        Curve::new(
            "CPU",
            MetricKind::CpuTemp,
            vec![(30.0, 20.0).into(), (50.0, 40.0).into(), (70.0, 80.0).into()],
        )
    }

    #[test]
    fn test_interpolation_at_points() {
        let curve = test_curve();
        assert_eq!(curve.evaluate(30.0), 20.0);
        assert_eq!(curve.evaluate(50.0), 40.0);
        assert_eq!(curve.evaluate(70.0), 80.0);
    }

    #[test]
    fn test_interpolation_between_points() {
        let curve = test_curve();
        assert!((curve.evaluate(60.0) - 60.0).abs() < 1e-9);
        assert!((curve.evaluate(40.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_left_and_right() {
        let curve = test_curve();
        assert_eq!(curve.evaluate(10.0), 20.0);
        assert_eq!(curve.evaluate(95.0), 80.0);
    }

    #[test]
    fn test_empty_curve_is_zero() {
        assert_eq!(evaluate_points(&[], 55.0), 0.0);
    }

    #[test]
    fn test_single_point_curve() {
        let points = [CurvePoint::new(40.0, 35.0)];
        assert_eq!(evaluate_points(&points, 10.0), 35.0);
        assert_eq!(evaluate_points(&points, 90.0), 35.0);
    }

    #[test]
    fn test_shared_x_resolves_to_first_matching_segment() {
        let points = [
            CurvePoint::new(30.0, 20.0),
            CurvePoint::new(50.0, 40.0),
            CurvePoint::new(50.0, 90.0),
            CurvePoint::new(70.0, 100.0),
        ];
        assert_eq!(evaluate_points(&points, 50.0), 40.0);
    }

    #[test]
    fn test_zero_width_segment_returns_lower_duty() {
        let lower = CurvePoint::new(50.0, 40.0);
        let upper = CurvePoint::new(50.0, 90.0);
        assert_eq!(interpolate(&lower, &upper, 50.0), 40.0);

        // x values closer than the epsilon count as the same point
        let points = [
            CurvePoint::new(30.0, 20.0),
            CurvePoint::new(50.0, 40.0),
            CurvePoint::new(50.0005, 90.0),
            CurvePoint::new(70.0, 100.0),
        ];
        assert_eq!(evaluate_points(&points, 50.0002), 40.0);
    }

    #[test]
    fn test_output_clamped_to_duty_range() {
        let points = [CurvePoint::new(0.0, -20.0), CurvePoint::new(100.0, 140.0)];
        assert_eq!(evaluate_points(&points, 0.0), 0.0);
        assert_eq!(evaluate_points(&points, 100.0), 100.0);
    }

    #[test]
    fn test_absent_metric_yields_nothing() {
        let curve = test_curve();
        let absent = Snapshot::new(SystemTime::now(), []);
        assert_eq!(curve.evaluate_snapshot(&absent), None);

        let present = Snapshot::new(SystemTime::now(), [(MetricKind::CpuTemp, Some(60.0))]);
        let duty = curve.evaluate_snapshot(&present).unwrap();
        assert!((duty - 60.0).abs() < 1e-9);
    }
}
