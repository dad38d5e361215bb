//! Windows error code handling utilities

use std::fmt;

/// Common Windows error codes seen along the launch pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Success,
    FileNotFound,
    PathNotFound,
    AccessDenied,
    InvalidHandle,
    InvalidParameter,
    InsufficientBuffer,
    NoToken,
    PrivilegeNotHeld,
    BadImpersonationLevel,
    Unknown(u32),
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0 => ErrorCode::Success,
            2 => ErrorCode::FileNotFound,
            3 => ErrorCode::PathNotFound,
            5 => ErrorCode::AccessDenied,
            6 => ErrorCode::InvalidHandle,
            87 => ErrorCode::InvalidParameter,
            122 => ErrorCode::InsufficientBuffer,
            1008 => ErrorCode::NoToken,
            1314 => ErrorCode::PrivilegeNotHeld,
            1346 => ErrorCode::BadImpersonationLevel,
            _ => ErrorCode::Unknown(code),
        }
    }
}

impl ErrorCode {
    /// Raw Win32 error value
    pub fn code(&self) -> u32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::FileNotFound => 2,
            ErrorCode::PathNotFound => 3,
            ErrorCode::AccessDenied => 5,
            ErrorCode::InvalidHandle => 6,
            ErrorCode::InvalidParameter => 87,
            ErrorCode::InsufficientBuffer => 122,
            ErrorCode::NoToken => 1008,
            ErrorCode::PrivilegeNotHeld => 1314,
            ErrorCode::BadImpersonationLevel => 1346,
            ErrorCode::Unknown(code) => *code,
        }
    }

    /// Get the calling thread's last Windows error
    #[cfg(windows)]
    pub fn last_error() -> Self {
        unsafe { ErrorCode::from(winapi::um::errhandlingapi::GetLastError()) }
    }

    /// System message text for this code, when the OS knows one
    #[cfg(windows)]
    pub fn system_message(&self) -> Option<String> {
        let message = ::windows::core::HRESULT::from_win32(self.code())
            .message()
            .to_string();
        let message = message.trim();
        (!message.is_empty()).then(|| message.to_string())
    }

    #[cfg(not(windows))]
    pub fn system_message(&self) -> Option<String> {
        None
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Success => write!(f, "Success"),
            ErrorCode::FileNotFound => write!(f, "File not found (2)"),
            ErrorCode::PathNotFound => write!(f, "Path not found (3)"),
            ErrorCode::AccessDenied => write!(f, "Access denied (5)"),
            ErrorCode::InvalidHandle => write!(f, "Invalid handle (6)"),
            ErrorCode::InvalidParameter => write!(f, "Invalid parameter (87)"),
            ErrorCode::InsufficientBuffer => write!(f, "Insufficient buffer (122)"),
            ErrorCode::NoToken => write!(f, "No token (1008)"),
            ErrorCode::PrivilegeNotHeld => write!(f, "Privilege not held (1314)"),
            ErrorCode::BadImpersonationLevel => write!(f, "Bad impersonation level (1346)"),
            ErrorCode::Unknown(code) => match self.system_message() {
                Some(message) => write!(f, "{} ({})", message, code),
                None => write!(f, "Unknown error: {}", code),
            },
        }
    }
}
