//! CLI command implementations.

pub mod classify;
pub mod config;
pub mod models;
