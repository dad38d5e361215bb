//! Core type definitions for Elevated-Launcher
//!
//! This module contains the types shared by every pipeline component:
//! the launch description, the process state model and the error type.

mod error;
mod launch_spec;
mod process_state;

// Re-export all public types
pub use error::{LaunchError, LaunchResult};
pub use launch_spec::LaunchSpec;
pub use process_state::{ProcessState, STILL_ACTIVE};

// Common type aliases
pub type ProcessId = u32;
pub type SessionId = u32;
