//! Windows API layer
//!
//! Provides safe wrappers around the Windows API functions the launcher
//! needs. All unsafe FFI calls are contained within this module; the rest
//! of the crate reaches them only through [`Win32Os`].

#[cfg(windows)]
pub mod bindings;
#[cfg(windows)]
mod system;
pub mod utils;

#[cfg(windows)]
pub use system::Win32Os;
pub use utils::ErrorCode;

/// Whether the live Win32 backend is compiled in
pub fn is_supported_windows() -> bool {
    cfg!(target_os = "windows")
}
