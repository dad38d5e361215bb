//! Owned OS handle wrapper with RAII semantics

use crate::os::{OsApi, OsResult, RawHandle};
use crate::windows::utils::ErrorCode;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Access rights for process handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessAccess {
    value: u32,
}

impl ProcessAccess {
    /// Duplicate handles out of the process
    pub const DUPLICATE_HANDLE: Self = Self { value: 0x0040 };
    /// Query information access
    pub const QUERY_INFORMATION: Self = Self { value: 0x0400 };

    /// Combine access rights
    pub fn combine(rights: &[Self]) -> Self {
        let mut value = 0;
        for right in rights {
            value |= right.value;
        }
        Self { value }
    }

    /// Get raw value
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Access rights for token handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccess {
    value: u32,
}

impl TokenAccess {
    /// Attach the token as a process's primary token
    pub const ASSIGN_PRIMARY: Self = Self { value: 0x0001 };
    /// Duplicate the token
    pub const DUPLICATE: Self = Self { value: 0x0002 };
    /// Query the token
    pub const QUERY: Self = Self { value: 0x0008 };

    /// Combine access rights
    pub fn combine(rights: &[Self]) -> Self {
        let mut value = 0;
        for right in rights {
            value |= right.value;
        }
        Self { value }
    }

    /// Get raw value
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// What an [`OwnedHandle`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Process,
    Thread,
    Token,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Process => write!(f, "process"),
            HandleKind::Thread => write!(f, "thread"),
            HandleKind::Token => write!(f, "token"),
        }
    }
}

/// Exclusively owned OS handle, closed exactly once.
///
/// The handle is closed by [`OwnedHandle::close`] or on drop, whichever comes
/// first. Closing an already closed handle is a no-op.
pub struct OwnedHandle<O: OsApi> {
    os: Arc<O>,
    raw: Option<RawHandle>,
    kind: HandleKind,
}

impl<O: OsApi> OwnedHandle<O> {
    /// Take ownership of `raw`
    pub fn new(os: Arc<O>, raw: RawHandle, kind: HandleKind) -> Self {
        OwnedHandle {
            os,
            raw: Some(raw),
            kind,
        }
    }

    /// The raw handle, or `None` once closed
    pub fn raw(&self) -> Option<RawHandle> {
        self.raw
    }

    /// The raw handle for an OS call; `InvalidHandle` once closed
    pub fn as_raw(&self) -> OsResult<RawHandle> {
        self.raw.ok_or(ErrorCode::InvalidHandle)
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.raw.is_none()
    }

    /// Close the handle now. Later calls do nothing and return `Ok`.
    pub fn close(&mut self) -> OsResult<()> {
        match self.raw.take() {
            Some(raw) => self.os.close_handle(raw),
            None => Ok(()),
        }
    }

    /// Give up ownership without closing
    pub fn into_raw(mut self) -> Option<RawHandle> {
        self.raw.take()
    }
}

impl<O: OsApi> Drop for OwnedHandle<O> {
    fn drop(&mut self) {
        let kind = self.kind;
        if let Some(raw) = self.raw {
            if let Err(code) = self.close() {
                warn!(handle = %raw, %kind, %code, "CloseHandle failed");
            }
        }
    }
}

impl<O: OsApi> fmt::Debug for OwnedHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("kind", &self.kind)
            .field("raw", &self.raw.map(|raw| raw.to_string()))
            .finish()
    }
}
