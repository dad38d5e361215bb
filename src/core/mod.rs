//! Core module containing fundamental types for Elevated-Launcher
//!
//! This module provides the foundational building blocks used throughout
//! the launcher: the launch description, process states and error types.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{LaunchError, LaunchResult, LaunchSpec, ProcessState, STILL_ACTIVE};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
