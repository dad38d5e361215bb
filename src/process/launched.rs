//! The launched child process and its lifecycle operations

use super::handle::{HandleKind, OwnedHandle};
use crate::core::types::{LaunchError, LaunchResult, ProcessId, ProcessState, STILL_ACTIVE};
use crate::os::{CreatedProcess, OsApi, RawHandle, WaitOutcome};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest finite wait accepted by `WaitForSingleObject` (0xFFFFFFFF means INFINITE)
const MAX_FINITE_WAIT_MS: u32 = u32::MAX - 1;

/// A child process started by the launcher.
///
/// Owns the process and primary-thread handles. They are released by
/// [`LaunchedProcess::close`] or when the value is dropped; the child itself
/// keeps running either way.
///
/// `exit_code`, `has_exited`, `wait`, `wait_timeout` and `kill` take `&self`
/// and may be called from several threads at once (share the value through an
/// `Arc`). `close` takes `&mut self`, so it can never race those calls.
pub struct LaunchedProcess<O: OsApi> {
    os: Arc<O>,
    process: OwnedHandle<O>,
    thread: OwnedHandle<O>,
    pid: ProcessId,
    tid: u32,
}

impl<O: OsApi> LaunchedProcess<O> {
    /// Take ownership of the handles of a freshly created process
    pub(crate) fn from_created(os: Arc<O>, created: CreatedProcess) -> Self {
        LaunchedProcess {
            process: OwnedHandle::new(Arc::clone(&os), created.process, HandleKind::Process),
            thread: OwnedHandle::new(Arc::clone(&os), created.thread, HandleKind::Thread),
            os,
            pid: created.pid,
            tid: created.tid,
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Id of the primary thread
    pub fn tid(&self) -> u32 {
        self.tid
    }

    pub fn is_closed(&self) -> bool {
        self.process.is_closed()
    }

    fn process_handle(&self) -> LaunchResult<RawHandle> {
        self.process.raw().ok_or(LaunchError::ProcessClosed(self.pid))
    }

    /// Resume the primary thread of the suspended child
    pub(crate) fn resume(&self) -> LaunchResult<()> {
        let thread = self.thread.raw().ok_or(LaunchError::ProcessClosed(self.pid))?;
        self.os
            .resume_thread(thread)
            .map_err(|code| LaunchError::ResumeFailed {
                pid: self.pid,
                code,
            })
    }

    /// Current exit code; [`STILL_ACTIVE`] while the process runs.
    ///
    /// A failed query is reported as [`LaunchError::ExitCodeQueryFailed`]
    /// rather than folded into an exit code.
    pub fn exit_code(&self) -> LaunchResult<u32> {
        let process = self.process_handle()?;
        self.os
            .exit_code(process)
            .map_err(|code| LaunchError::ExitCodeQueryFailed {
                pid: self.pid,
                code,
            })
    }

    pub fn has_exited(&self) -> LaunchResult<bool> {
        Ok(self.exit_code()? != STILL_ACTIVE)
    }

    /// Lifecycle state; `Closed` once the handles are released
    pub fn state(&self) -> LaunchResult<ProcessState> {
        if self.is_closed() {
            return Ok(ProcessState::Closed);
        }
        Ok(ProcessState::from_exit_code(self.exit_code()?))
    }

    /// Block until the process exits
    pub fn wait(&self) -> LaunchResult<()> {
        let process = self.process_handle()?;
        self.os
            .wait(process, None)
            .map(|_| ())
            .map_err(|code| LaunchError::WaitFailed {
                pid: self.pid,
                code,
            })
    }

    /// Block for at most `timeout`; returns whether the process has exited.
    /// Running past the timeout is not an error.
    pub fn wait_timeout(&self, timeout: Duration) -> LaunchResult<bool> {
        let process = self.process_handle()?;
        let timeout_ms = u32::try_from(timeout.as_millis())
            .unwrap_or(MAX_FINITE_WAIT_MS)
            .min(MAX_FINITE_WAIT_MS);
        let outcome = self
            .os
            .wait(process, Some(timeout_ms))
            .map_err(|code| LaunchError::WaitFailed {
                pid: self.pid,
                code,
            })?;
        Ok(outcome == WaitOutcome::Signaled)
    }

    /// Forcibly terminate the process with exit code 0.
    ///
    /// Killing a process that already exited succeeds; killing after
    /// [`close`](Self::close) fails with [`LaunchError::ProcessClosed`].
    pub fn kill(&self) -> LaunchResult<()> {
        let process = self.process_handle()?;
        match self.os.terminate(process, 0) {
            Ok(()) => {
                debug!(pid = self.pid, "terminated child process");
                Ok(())
            }
            Err(code) => {
                if self.has_exited()? {
                    Ok(())
                } else {
                    Err(LaunchError::KillFailed {
                        pid: self.pid,
                        code,
                    })
                }
            }
        }
    }

    /// Release the process and thread handles. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.is_closed() && self.thread.is_closed() {
            return;
        }
        if let Err(code) = self.process.close() {
            warn!(pid = self.pid, %code, "failed to close process handle");
        }
        if let Err(code) = self.thread.close() {
            warn!(pid = self.pid, %code, "failed to close thread handle");
        }
        debug!(pid = self.pid, "released child process handles");
    }
}

impl<O: OsApi> fmt::Debug for LaunchedProcess<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedProcess")
            .field("pid", &self.pid)
            .field("tid", &self.tid)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<O: OsApi> fmt::Display for LaunchedProcess<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LaunchedProcess(pid={}, closed={})",
            self.pid,
            self.is_closed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::{CreateProcessRequest, MockCall, MockOs};
    use crate::windows::utils::ErrorCode;

    /// Drive the mock by hand up to a running child, releasing everything but the child handles
    fn spawn_child(os: &Arc<MockOs>) -> LaunchedProcess<MockOs> {
        let anchor = os.open_process(4000, 0).unwrap();
        let token = os.open_process_token(anchor, 0).unwrap();
        let primary = os.duplicate_primary_token(token).unwrap();
        let env = os.create_environment_block(primary, false).unwrap();
        let request = CreateProcessRequest {
            command_line: "child.exe ",
            working_directory: None,
            desktop: None,
        };
        let created = os.create_process_as_user(primary, env, &request).unwrap();
        for raw in [anchor, token, primary] {
            os.close_handle(raw).unwrap();
        }
        os.destroy_environment_block(env).unwrap();

        let child = LaunchedProcess::from_created(Arc::clone(os), created);
        child.resume().unwrap();
        child
    }

    #[test]
    fn test_running_child_reports_still_active() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::from_secs(60), 3));
        let child = spawn_child(&os);

        assert_eq!(child.exit_code().unwrap(), STILL_ACTIVE);
        assert!(!child.has_exited().unwrap());
        assert_eq!(child.state().unwrap(), ProcessState::Running);
    }

    #[test]
    fn test_wait_timeout_then_exit_code() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::from_millis(50), 17));
        let child = spawn_child(&os);

        assert!(!child.wait_timeout(Duration::from_millis(10)).unwrap());
        assert!(child.wait_timeout(Duration::from_millis(100)).unwrap());
        assert_eq!(child.exit_code().unwrap(), 17);
        assert_eq!(child.state().unwrap(), ProcessState::Exited(17));
    }

    #[test]
    fn test_kill_reports_zero() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::from_secs(60), 3));
        let child = spawn_child(&os);

        child.kill().unwrap();
        assert_eq!(child.exit_code().unwrap(), 0);
        assert!(child.has_exited().unwrap());

        // already exited: still fine
        assert!(child.kill().is_ok());
    }

    #[test]
    fn test_kill_failure_on_running_process() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::from_secs(60), 3));
        let child = spawn_child(&os);
        os.set_failure(MockCall::Terminate, ErrorCode::AccessDenied);

        let err = child.kill().unwrap_err();
        assert_eq!(
            err,
            LaunchError::KillFailed {
                pid: child.pid(),
                code: ErrorCode::AccessDenied
            }
        );
    }

    #[test]
    fn test_exit_code_query_failure_is_distinct() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::ZERO, 0));
        let child = spawn_child(&os);
        os.set_failure(MockCall::ExitCode, ErrorCode::AccessDenied);

        assert!(matches!(
            child.exit_code(),
            Err(LaunchError::ExitCodeQueryFailed { .. })
        ));
        assert!(child.has_exited().is_err());
    }

    #[test]
    fn test_close_twice() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::ZERO, 0));
        let mut child = spawn_child(&os);

        child.close();
        child.close();
        drop(child);

        assert_eq!(os.invalid_closes(), 0);
        assert!(os.is_balanced());
    }

    #[test]
    fn test_operations_after_close() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::from_secs(60), 0));
        let mut child = spawn_child(&os);
        let pid = child.pid();
        child.close();

        assert_eq!(child.kill(), Err(LaunchError::ProcessClosed(pid)));
        assert_eq!(child.exit_code(), Err(LaunchError::ProcessClosed(pid)));
        assert_eq!(child.wait(), Err(LaunchError::ProcessClosed(pid)));
        assert_eq!(child.state().unwrap(), ProcessState::Closed);
    }

    #[test]
    fn test_drop_releases_handles() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::from_secs(60), 0));
        {
            let _child = spawn_child(&os);
            assert_eq!(os.open_handles(), 2);
        }
        assert!(os.is_balanced());
    }

    #[test]
    fn test_kill_from_another_thread_wakes_waiter() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::from_secs(60), 5));
        let child = Arc::new(spawn_child(&os));

        let killer = {
            let child = Arc::clone(&child);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                child.kill()
            })
        };

        assert!(child.wait_timeout(Duration::from_secs(10)).unwrap());
        killer.join().unwrap().unwrap();
        assert_eq!(child.exit_code().unwrap(), 0);
    }

    #[test]
    fn test_huge_timeout_is_clamped() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::ZERO, 1));
        let child = spawn_child(&os);
        assert!(child.wait_timeout(Duration::from_secs(u64::MAX)).unwrap());
    }

    #[test]
    fn test_display() {
        let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::ZERO, 1));
        let child = spawn_child(&os);
        assert!(child.to_string().contains("closed=false"));
    }
}
