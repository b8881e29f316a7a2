//! Statistics for graph endpoints

pub mod metrics;

pub use metrics::{DeliverySnapshot, DeliveryStats};
