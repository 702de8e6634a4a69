//! # Voxlens Common Library
//!
//! Shared code for the voxlens crates:
//! - Error and result types
//! - TOML configuration loading and atomic write-back
//! - Tracing subscriber setup
//! - Pipeline event types and the broadcast event bus

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
