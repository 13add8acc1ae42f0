//! Curve evaluation and threshold alerts

mod alert;
mod curve;

pub use alert::{AlertEngine, DeliveryRequest};
pub use curve::evaluate_points;
