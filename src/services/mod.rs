// src/services/mod.rs

pub mod attempts;
pub mod gate;
pub mod results;
pub mod scoring;
