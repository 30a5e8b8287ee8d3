//! Automated-caller detection.

pub mod anomaly;
