//! Windows API bindings
//!
//! Thin wrappers over the system libraries the launcher calls, each
//! returning the thread's last error on failure.

pub mod advapi32;
pub mod kernel32;
pub mod userenv;
