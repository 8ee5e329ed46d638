//! CLI command implementations.

pub mod config;
pub mod doctor;
pub mod item;
