//! Process handle ownership
//!
//! This module provides the single-owner wrappers for OS handles and the
//! [`LaunchedProcess`] object handed to callers after a successful launch.

pub mod handle;
pub mod launched;

pub use handle::{HandleKind, OwnedHandle, ProcessAccess, TokenAccess};
pub use launched::LaunchedProcess;
