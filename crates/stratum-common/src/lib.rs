//! StratumDB common types, errors, and utilities.
//!
//! This crate provides shared definitions used across all StratumDB components.

pub mod config;
pub mod error;

pub use config::IndexConfig;
pub use error::{Result, StratumError};
