//! Configuration module for the decoder.
//!
//! Provides CLI argument parsing, JSON config file merging and configuration management.

#[allow(clippy::module_inception)]
mod config;

pub use config::{AppConfig, FileConfig, PruningStrategy};
