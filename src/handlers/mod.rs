// src/handlers/mod.rs

pub mod attempts;
pub mod digest;
pub mod mistakes;
pub mod review;
