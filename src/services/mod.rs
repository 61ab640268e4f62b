// src/services/mod.rs

pub mod attempts;
pub mod digest;
pub mod evaluator;
pub mod mistakes;
pub mod review;
pub mod scoring;
