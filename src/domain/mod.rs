//! Domain layer types and invariants.

pub mod analytics;
pub mod catalog;
pub mod duration;
pub mod error;
pub mod period;
pub mod types;
