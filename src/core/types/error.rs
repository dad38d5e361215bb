//! Custom error types for Elevated-Launcher

use crate::windows::utils::ErrorCode;
use thiserror::Error;

/// Every way a launch or a lifecycle operation on a launched process can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Anchor process not found: {0}")]
    AnchorNotFound(String),

    #[error("Anchor process is ambiguous: {count} processes named {name}")]
    AnchorAmbiguous { name: String, count: usize },

    #[error("Failed to enumerate processes: {0}")]
    AnchorQueryError(ErrorCode),

    #[error("OpenProcess failed for anchor {pid}: {code}")]
    OpenAnchorFailed { pid: u32, code: ErrorCode },

    #[error("OpenProcessToken failed: {0}")]
    OpenTokenFailed(ErrorCode),

    #[error("DuplicateTokenEx failed: {0}")]
    DuplicateTokenFailed(ErrorCode),

    #[error("ProcessIdToSessionId failed for anchor {pid}: {code}")]
    SessionQueryFailed { pid: u32, code: ErrorCode },

    #[error("SetTokenInformation failed for session {session}: {code}")]
    SetSessionFailed { session: u32, code: ErrorCode },

    #[error("ImpersonateLoggedOnUser failed: {0}")]
    ImpersonationFailed(ErrorCode),

    #[error("CreateEnvironmentBlock failed: {0}")]
    EnvironmentBuildFailed(ErrorCode),

    #[error("CreateProcessAsUser failed for '{command_line}': {code}")]
    ProcessCreateFailed { command_line: String, code: ErrorCode },

    #[error("ResumeThread failed for process {pid}: {code}")]
    ResumeFailed { pid: u32, code: ErrorCode },

    #[error("GetExitCodeProcess failed for process {pid}: {code}")]
    ExitCodeQueryFailed { pid: u32, code: ErrorCode },

    #[error("WaitForSingleObject failed for process {pid}: {code}")]
    WaitFailed { pid: u32, code: ErrorCode },

    #[error("TerminateProcess failed for process {pid}: {code}")]
    KillFailed { pid: u32, code: ErrorCode },

    #[error("Process {0} handles are already closed")]
    ProcessClosed(u32),
}

/// Result type alias for launch operations
pub type LaunchResult<T> = Result<T, LaunchError>;

impl LaunchError {
    /// The underlying OS error code, for errors that carry one
    pub fn os_code(&self) -> Option<u32> {
        match self {
            LaunchError::AnchorQueryError(code)
            | LaunchError::OpenTokenFailed(code)
            | LaunchError::DuplicateTokenFailed(code)
            | LaunchError::ImpersonationFailed(code)
            | LaunchError::EnvironmentBuildFailed(code)
            | LaunchError::OpenAnchorFailed { code, .. }
            | LaunchError::SessionQueryFailed { code, .. }
            | LaunchError::SetSessionFailed { code, .. }
            | LaunchError::ProcessCreateFailed { code, .. }
            | LaunchError::ResumeFailed { code, .. }
            | LaunchError::ExitCodeQueryFailed { code, .. }
            | LaunchError::WaitFailed { code, .. }
            | LaunchError::KillFailed { code, .. } => Some(code.code()),
            LaunchError::AnchorNotFound(_)
            | LaunchError::AnchorAmbiguous { .. }
            | LaunchError::ProcessClosed(_) => None,
        }
    }

    /// Short stable name of the failure kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            LaunchError::AnchorNotFound(_) => "AnchorNotFound",
            LaunchError::AnchorAmbiguous { .. } => "AnchorAmbiguous",
            LaunchError::AnchorQueryError(_) => "AnchorQueryError",
            LaunchError::OpenAnchorFailed { .. } => "OpenAnchorFailed",
            LaunchError::OpenTokenFailed(_) => "OpenTokenFailed",
            LaunchError::DuplicateTokenFailed(_) => "DuplicateTokenFailed",
            LaunchError::SessionQueryFailed { .. } => "SessionQueryFailed",
            LaunchError::SetSessionFailed { .. } => "SetSessionFailed",
            LaunchError::ImpersonationFailed(_) => "ImpersonationFailed",
            LaunchError::EnvironmentBuildFailed(_) => "EnvironmentBuildFailed",
            LaunchError::ProcessCreateFailed { .. } => "ProcessCreateFailed",
            LaunchError::ResumeFailed { .. } => "ResumeFailed",
            LaunchError::ExitCodeQueryFailed { .. } => "ExitCodeQueryFailed",
            LaunchError::WaitFailed { .. } => "WaitFailed",
            LaunchError::KillFailed { .. } => "KillFailed",
            LaunchError::ProcessClosed(_) => "ProcessClosed",
        }
    }
}
