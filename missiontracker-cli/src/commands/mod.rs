//! CLI command implementations.

pub mod config;
pub mod hazard;
pub mod simulate;
