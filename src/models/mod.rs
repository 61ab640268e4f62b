// src/models/mod.rs

pub mod attempt;
pub mod digest;
pub mod question;
pub mod result;
pub mod review;
