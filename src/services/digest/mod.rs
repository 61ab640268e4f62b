// src/services/digest/mod.rs

//! Daily progress digest: local-time scheduling, metrics gathering and delivery.

pub mod clock;
pub mod dispatcher;
pub mod notifier;
pub mod scheduler;
