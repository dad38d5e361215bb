//! Elevated-Launcher library for starting processes in the interactive
//! user's desktop session from a service session on Windows

pub mod config;
pub mod core;
pub mod launcher;
pub mod os;
pub mod process;
pub mod windows;

// Re-export main types from core module
pub use crate::core::types::{
    LaunchError, LaunchResult, LaunchSpec, ProcessId, ProcessState, SessionId, STILL_ACTIVE,
};
pub use crate::core::{AUTHORS, VERSION};

pub use launcher::{AnchorLocator, AnchorSelection, LaunchOptions, Launcher};
pub use os::{MockOs, OsApi};
pub use process::LaunchedProcess;
pub use windows::ErrorCode;

#[cfg(windows)]
pub use launcher::start_elevated;
#[cfg(windows)]
pub use windows::Win32Os;
