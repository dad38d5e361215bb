//! The OS seam used by the launch pipeline
//!
//! Every system call the launcher makes goes through [`OsApi`]. The Win32
//! implementation lives in [`crate::windows::Win32Os`]; [`MockOs`] is an
//! in-memory implementation that records calls and simulates a child process.
//!
//! Raw values crossing this seam are opaque. Ownership and release of the
//! resources they name is the job of the owned wrappers in
//! [`crate::process::handle`] and [`crate::launcher`].

pub mod mock;

pub use mock::{MockCall, MockOs, MockProcess, SpawnRecord};

use crate::core::types::{ProcessId, SessionId};
use crate::windows::utils::ErrorCode;
use std::fmt;

/// Result of a single OS call: the value or the OS error code
pub type OsResult<T> = Result<T, ErrorCode>;

/// Opaque OS handle value (process, thread or token)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(usize);

impl RawHandle {
    pub const fn new(value: usize) -> Self {
        RawHandle(value)
    }

    pub const fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Opaque pointer to an OS-allocated environment block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawEnvironment(usize);

impl RawEnvironment {
    pub const fn new(value: usize) -> Self {
        RawEnvironment(value)
    }

    pub const fn value(&self) -> usize {
        self.0
    }
}

/// One entry of a system process snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: ProcessId,
    pub name: String,
}

impl ProcessEntry {
    pub fn new(pid: ProcessId, name: impl Into<String>) -> Self {
        ProcessEntry {
            pid,
            name: name.into(),
        }
    }
}

/// Handles and ids of a freshly created (still suspended) process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedProcess {
    pub process: RawHandle,
    pub thread: RawHandle,
    pub pid: ProcessId,
    pub tid: u32,
}

/// Everything `CreateProcessAsUser` needs besides the token and environment
#[derive(Debug, Clone, Copy)]
pub struct CreateProcessRequest<'a> {
    pub command_line: &'a str,
    pub working_directory: Option<&'a str>,
    pub desktop: Option<&'a str>,
}

/// Outcome of waiting on a process handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
}

/// The system calls the launch pipeline and launched processes depend on.
///
/// Implementations must be callable from several threads at once; the OS
/// objects behind the handles are themselves thread-safe.
pub trait OsApi: Send + Sync {
    /// Snapshot of all running processes
    fn processes(&self) -> OsResult<Vec<ProcessEntry>>;

    /// Session of the physical console, if any user is attached to it
    fn active_console_session(&self) -> Option<SessionId>;

    fn open_process(&self, pid: ProcessId, access: u32) -> OsResult<RawHandle>;

    fn open_process_token(&self, process: RawHandle, access: u32) -> OsResult<RawHandle>;

    /// Duplicate `token` into a new primary token with identification-level
    /// impersonation and maximum allowed rights
    fn duplicate_primary_token(&self, token: RawHandle) -> OsResult<RawHandle>;

    fn process_session_id(&self, pid: ProcessId) -> OsResult<SessionId>;

    fn set_token_session_id(&self, token: RawHandle, session: SessionId) -> OsResult<()>;

    /// Impersonate `token` on the calling thread
    fn impersonate(&self, token: RawHandle) -> OsResult<()>;

    /// Drop any impersonation on the calling thread
    fn revert_to_self(&self) -> OsResult<()>;

    fn create_environment_block(&self, token: RawHandle, inherit: bool)
        -> OsResult<RawEnvironment>;

    fn destroy_environment_block(&self, environment: RawEnvironment) -> OsResult<()>;

    /// Create a suspended, windowless process with a unicode environment
    fn create_process_as_user(
        &self,
        token: RawHandle,
        environment: RawEnvironment,
        request: &CreateProcessRequest<'_>,
    ) -> OsResult<CreatedProcess>;

    fn resume_thread(&self, thread: RawHandle) -> OsResult<()>;

    /// Current exit code, [`crate::STILL_ACTIVE`] while running
    fn exit_code(&self, process: RawHandle) -> OsResult<u32>;

    /// Wait for the process to be signaled; `None` waits forever
    fn wait(&self, process: RawHandle, timeout_ms: Option<u32>) -> OsResult<WaitOutcome>;

    fn terminate(&self, process: RawHandle, exit_code: u32) -> OsResult<()>;

    fn close_handle(&self, handle: RawHandle) -> OsResult<()>;
}
