//! Common utilities shared across the service crates.
//!
//! This crate provides:
//! - The transport-agnostic error taxonomy and its gRPC status mapping
//! - Configuration structures

pub mod config;
pub mod error;

pub use config::*;
pub use error::{AppError, AppResult, OptionExt};
