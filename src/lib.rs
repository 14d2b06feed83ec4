//! bodytrend - Personal body-metrics tracker
//!
//! Weight and body-fat history bucketed by day, week or month, with a
//! rolling trend line, goal ETA projection and logging streaks.

pub mod config;
pub mod db;
pub mod metrics;

pub use db::Database;
pub use metrics::{BodyView, Overlay};
