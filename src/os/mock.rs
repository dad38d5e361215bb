//! In-memory [`OsApi`] implementation
//!
//! `MockOs` keeps a ledger of every handle, environment block and
//! impersonation it hands out, so callers can assert that a launch released
//! exactly what it acquired. Children are simulated: they stay suspended
//! until resumed, then report [`STILL_ACTIVE`] until their configured runtime
//! elapses, after which they report their configured exit code.
//!
//! Injected failures on release calls (`CloseHandle`, `DestroyEnvironment`)
//! are reported to the caller but the resource is still considered released,
//! which is how a failed `CloseHandle` behaves on a bad handle.

use super::{
    CreateProcessRequest, CreatedProcess, OsApi, OsResult, ProcessEntry, RawEnvironment,
    RawHandle, WaitOutcome,
};
use crate::core::types::{ProcessId, SessionId, STILL_ACTIVE};
use crate::windows::utils::ErrorCode;
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Kinds of OS calls recorded by [`MockOs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    Processes,
    ActiveConsoleSession,
    OpenProcess,
    OpenProcessToken,
    DuplicateToken,
    QuerySession,
    SetTokenSession,
    Impersonate,
    RevertToSelf,
    CreateEnvironment,
    DestroyEnvironment,
    CreateProcess,
    ResumeThread,
    ExitCode,
    Wait,
    Terminate,
    CloseHandle,
}

/// A process present in the simulated system before any launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockProcess {
    pub pid: ProcessId,
    pub name: String,
    pub session: SessionId,
}

/// What the simulated `CreateProcessAsUser` was asked to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRecord {
    pub pid: ProcessId,
    pub command_line: String,
    pub working_directory: Option<String>,
    pub desktop: Option<String>,
    pub token_session: Option<SessionId>,
    pub inherited_environment: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Process(ProcessId),
    Token { primary: bool },
    ChildProcess(usize),
    ChildThread(usize),
}

#[derive(Debug)]
struct Child {
    resumed_at: Option<Instant>,
    runtime: Duration,
    exit_code: u32,
    killed_with: Option<u32>,
}

impl Child {
    fn exit_at(&self) -> Option<Instant> {
        self.resumed_at.map(|start| start + self.runtime)
    }

    fn exit_code_at(&self, now: Instant) -> u32 {
        if let Some(code) = self.killed_with {
            return code;
        }
        match self.exit_at() {
            Some(exit_at) if now >= exit_at => self.exit_code,
            _ => STILL_ACTIVE,
        }
    }
}

#[derive(Debug)]
struct State {
    processes: Vec<MockProcess>,
    console_session: Option<SessionId>,
    failures: HashMap<MockCall, ErrorCode>,
    calls: Vec<MockCall>,
    next_handle: usize,
    next_pid: ProcessId,
    open: HashMap<RawHandle, Resource>,
    handles_opened: usize,
    handles_closed: usize,
    invalid_closes: usize,
    token_sessions: HashMap<RawHandle, SessionId>,
    environments: HashMap<RawEnvironment, bool>,
    environments_created: usize,
    invalid_destroys: usize,
    impersonating: HashSet<ThreadId>,
    unmatched_reverts: usize,
    child_runtime: Duration,
    child_exit_code: u32,
    children: Vec<Child>,
    spawns: Vec<SpawnRecord>,
}

impl State {
    fn record(&mut self, call: MockCall) -> OsResult<()> {
        self.calls.push(call);
        match self.failures.get(&call) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }

    fn allocate(&mut self, resource: Resource) -> RawHandle {
        self.next_handle += 4;
        let handle = RawHandle::new(self.next_handle);
        self.open.insert(handle, resource);
        self.handles_opened += 1;
        handle
    }

    fn resource(&self, handle: RawHandle) -> OsResult<Resource> {
        self.open.get(&handle).copied().ok_or(ErrorCode::InvalidHandle)
    }

    fn token(&self, handle: RawHandle) -> OsResult<bool> {
        match self.resource(handle)? {
            Resource::Token { primary } => Ok(primary),
            _ => Err(ErrorCode::InvalidHandle),
        }
    }

    fn child_index(&self, handle: RawHandle) -> OsResult<usize> {
        match self.resource(handle)? {
            Resource::ChildProcess(index) => Ok(index),
            _ => Err(ErrorCode::InvalidHandle),
        }
    }

    fn session_of(&self, pid: ProcessId) -> Option<SessionId> {
        self.processes
            .iter()
            .find(|p| p.pid == pid)
            .map(|p| p.session)
    }
}

/// Recording, failure-injecting OS simulation
#[derive(Debug)]
pub struct MockOs {
    state: Mutex<State>,
    exited: Condvar,
}

impl MockOs {
    /// An empty system: no processes, no console session
    pub fn new() -> Self {
        MockOs {
            state: Mutex::new(State {
                processes: Vec::new(),
                console_session: None,
                failures: HashMap::new(),
                calls: Vec::new(),
                next_handle: 0x100,
                next_pid: 9000,
                open: HashMap::new(),
                handles_opened: 0,
                handles_closed: 0,
                invalid_closes: 0,
                token_sessions: HashMap::new(),
                environments: HashMap::new(),
                environments_created: 0,
                invalid_destroys: 0,
                impersonating: HashSet::new(),
                unmatched_reverts: 0,
                child_runtime: Duration::ZERO,
                child_exit_code: 0,
                children: Vec::new(),
                spawns: Vec::new(),
            }),
            exited: Condvar::new(),
        }
    }

    /// A desktop with `explorer.exe` (pid 4000) logged on in console session 1
    pub fn interactive_desktop() -> Self {
        MockOs::new()
            .with_process(4, "System", 0)
            .with_process(688, "services.exe", 0)
            .with_process(4000, "explorer.exe", 1)
            .with_console_session(Some(1))
    }

    pub fn with_process(self, pid: ProcessId, name: impl Into<String>, session: SessionId) -> Self {
        self.lock().processes.push(MockProcess {
            pid,
            name: name.into(),
            session,
        });
        self
    }

    pub fn with_console_session(self, session: Option<SessionId>) -> Self {
        self.lock().console_session = session;
        self
    }

    /// Children created from now on run for `runtime` after resume, then exit with `exit_code`
    pub fn with_child(self, runtime: Duration, exit_code: u32) -> Self {
        {
            let mut state = self.lock();
            state.child_runtime = runtime;
            state.child_exit_code = exit_code;
        }
        self
    }

    pub fn fail_on(self, call: MockCall, code: ErrorCode) -> Self {
        self.set_failure(call, code);
        self
    }

    /// Make every later `call` fail with `code`
    pub fn set_failure(&self, call: MockCall, code: ErrorCode) {
        self.lock().failures.insert(call, code);
    }

    pub fn clear_failure(&self, call: MockCall) {
        self.lock().failures.remove(&call);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, call: MockCall) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Handles currently open (opened and not yet closed)
    pub fn open_handles(&self) -> usize {
        self.lock().open.len()
    }

    pub fn handles_opened(&self) -> usize {
        self.lock().handles_opened
    }

    pub fn handles_closed(&self) -> usize {
        self.lock().handles_closed
    }

    /// `CloseHandle` calls on handles that were not open (double release)
    pub fn invalid_closes(&self) -> usize {
        self.lock().invalid_closes
    }

    pub fn live_environments(&self) -> usize {
        self.lock().environments.len()
    }

    pub fn environments_created(&self) -> usize {
        self.lock().environments_created
    }

    /// `DestroyEnvironmentBlock` calls on blocks that were not live
    pub fn invalid_destroys(&self) -> usize {
        self.lock().invalid_destroys
    }

    /// Number of threads currently impersonating
    pub fn impersonating_threads(&self) -> usize {
        self.lock().impersonating.len()
    }

    pub fn is_impersonating(&self, thread: ThreadId) -> bool {
        self.lock().impersonating.contains(&thread)
    }

    /// `RevertToSelf` calls made by threads that were not impersonating
    pub fn unmatched_reverts(&self) -> usize {
        self.lock().unmatched_reverts
    }

    pub fn spawns(&self) -> Vec<SpawnRecord> {
        self.lock().spawns.clone()
    }

    pub fn last_spawn(&self) -> Option<SpawnRecord> {
        self.lock().spawns.last().cloned()
    }

    /// Forget recorded calls and spawns; open handles and children are kept
    pub fn reset_ledger(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.spawns.clear();
    }

    /// True when nothing is leaked and nothing was released twice
    pub fn is_balanced(&self) -> bool {
        let state = self.lock();
        state.open.is_empty()
            && state.environments.is_empty()
            && state.invalid_closes == 0
            && state.invalid_destroys == 0
            && state.impersonating.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockOs {
    fn default() -> Self {
        Self::new()
    }
}

impl OsApi for MockOs {
    fn processes(&self) -> OsResult<Vec<ProcessEntry>> {
        let mut state = self.lock();
        state.record(MockCall::Processes)?;
        Ok(state
            .processes
            .iter()
            .map(|p| ProcessEntry::new(p.pid, p.name.clone()))
            .collect())
    }

    fn active_console_session(&self) -> Option<SessionId> {
        let mut state = self.lock();
        state.record(MockCall::ActiveConsoleSession).ok()?;
        state.console_session
    }

    fn open_process(&self, pid: ProcessId, _access: u32) -> OsResult<RawHandle> {
        let mut state = self.lock();
        state.record(MockCall::OpenProcess)?;
        if state.session_of(pid).is_none() {
            return Err(ErrorCode::InvalidParameter);
        }
        Ok(state.allocate(Resource::Process(pid)))
    }

    fn open_process_token(&self, process: RawHandle, _access: u32) -> OsResult<RawHandle> {
        let mut state = self.lock();
        state.record(MockCall::OpenProcessToken)?;
        let pid = match state.resource(process)? {
            Resource::Process(pid) => pid,
            _ => return Err(ErrorCode::InvalidHandle),
        };
        let token = state.allocate(Resource::Token { primary: false });
        if let Some(session) = state.session_of(pid) {
            state.token_sessions.insert(token, session);
        }
        Ok(token)
    }

    fn duplicate_primary_token(&self, token: RawHandle) -> OsResult<RawHandle> {
        let mut state = self.lock();
        state.record(MockCall::DuplicateToken)?;
        state.token(token)?;
        let session = state.token_sessions.get(&token).copied();
        let primary = state.allocate(Resource::Token { primary: true });
        if let Some(session) = session {
            state.token_sessions.insert(primary, session);
        }
        Ok(primary)
    }

    fn process_session_id(&self, pid: ProcessId) -> OsResult<SessionId> {
        let mut state = self.lock();
        state.record(MockCall::QuerySession)?;
        state.session_of(pid).ok_or(ErrorCode::InvalidParameter)
    }

    fn set_token_session_id(&self, token: RawHandle, session: SessionId) -> OsResult<()> {
        let mut state = self.lock();
        state.record(MockCall::SetTokenSession)?;
        if !state.token(token)? {
            return Err(ErrorCode::InvalidParameter);
        }
        state.token_sessions.insert(token, session);
        Ok(())
    }

    fn impersonate(&self, token: RawHandle) -> OsResult<()> {
        let mut state = self.lock();
        state.record(MockCall::Impersonate)?;
        state.token(token)?;
        state.impersonating.insert(thread::current().id());
        Ok(())
    }

    fn revert_to_self(&self) -> OsResult<()> {
        let mut state = self.lock();
        state.record(MockCall::RevertToSelf)?;
        if !state.impersonating.remove(&thread::current().id()) {
            state.unmatched_reverts += 1;
        }
        Ok(())
    }

    fn create_environment_block(
        &self,
        token: RawHandle,
        inherit: bool,
    ) -> OsResult<RawEnvironment> {
        let mut state = self.lock();
        state.record(MockCall::CreateEnvironment)?;
        state.token(token)?;
        state.environments_created += 1;
        let environment = RawEnvironment::new(0x7F00_0000 + state.environments_created * 0x1000);
        state.environments.insert(environment, inherit);
        Ok(environment)
    }

    fn destroy_environment_block(&self, environment: RawEnvironment) -> OsResult<()> {
        let mut state = self.lock();
        let result = state.record(MockCall::DestroyEnvironment);
        if state.environments.remove(&environment).is_none() {
            state.invalid_destroys += 1;
            return Err(ErrorCode::InvalidParameter);
        }
        result
    }

    fn create_process_as_user(
        &self,
        token: RawHandle,
        environment: RawEnvironment,
        request: &CreateProcessRequest<'_>,
    ) -> OsResult<CreatedProcess> {
        let mut state = self.lock();
        state.record(MockCall::CreateProcess)?;
        if !state.token(token)? {
            return Err(ErrorCode::InvalidParameter);
        }
        let inherited_environment = *state
            .environments
            .get(&environment)
            .ok_or(ErrorCode::InvalidParameter)?;

        let index = state.children.len();
        let child = Child {
            resumed_at: None,
            runtime: state.child_runtime,
            exit_code: state.child_exit_code,
            killed_with: None,
        };
        state.children.push(child);
        state.next_pid += 4;
        let pid = state.next_pid;
        let process = state.allocate(Resource::ChildProcess(index));
        let thread = state.allocate(Resource::ChildThread(index));

        let token_session = state.token_sessions.get(&token).copied();
        state.spawns.push(SpawnRecord {
            pid,
            command_line: request.command_line.to_string(),
            working_directory: request.working_directory.map(str::to_string),
            desktop: request.desktop.map(str::to_string),
            token_session,
            inherited_environment,
        });

        Ok(CreatedProcess {
            process,
            thread,
            pid,
            tid: pid + 1,
        })
    }

    fn resume_thread(&self, thread: RawHandle) -> OsResult<()> {
        let mut state = self.lock();
        state.record(MockCall::ResumeThread)?;
        let index = match state.resource(thread)? {
            Resource::ChildThread(index) => index,
            _ => return Err(ErrorCode::InvalidHandle),
        };
        let child = &mut state.children[index];
        if child.resumed_at.is_none() {
            child.resumed_at = Some(Instant::now());
        }
        drop(state);
        self.exited.notify_all();
        Ok(())
    }

    fn exit_code(&self, process: RawHandle) -> OsResult<u32> {
        let mut state = self.lock();
        state.record(MockCall::ExitCode)?;
        let index = state.child_index(process)?;
        Ok(state.children[index].exit_code_at(Instant::now()))
    }

    fn wait(&self, process: RawHandle, timeout_ms: Option<u32>) -> OsResult<WaitOutcome> {
        let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(u64::from(ms)));
        let mut state = self.lock();
        state.record(MockCall::Wait)?;
        loop {
            let index = state.child_index(process)?;
            let now = Instant::now();
            let child = &state.children[index];
            if child.exit_code_at(now) != STILL_ACTIVE {
                return Ok(WaitOutcome::Signaled);
            }
            if deadline.is_some_and(|deadline| now >= deadline) {
                return Ok(WaitOutcome::TimedOut);
            }
            let wake_at = match (child.exit_at(), deadline) {
                (Some(exit_at), Some(deadline)) => Some(exit_at.min(deadline)),
                (Some(at), None) | (None, Some(at)) => Some(at),
                (None, None) => None,
            };
            state = match wake_at {
                Some(at) => {
                    let timeout = at.saturating_duration_since(now);
                    match self.exited.wait_timeout(state, timeout) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => self
                    .exited
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            };
        }
    }

    fn terminate(&self, process: RawHandle, exit_code: u32) -> OsResult<()> {
        let mut state = self.lock();
        state.record(MockCall::Terminate)?;
        let index = state.child_index(process)?;
        let child = &mut state.children[index];
        if child.exit_code_at(Instant::now()) != STILL_ACTIVE {
            return Err(ErrorCode::AccessDenied);
        }
        child.killed_with = Some(exit_code);
        drop(state);
        self.exited.notify_all();
        Ok(())
    }

    fn close_handle(&self, handle: RawHandle) -> OsResult<()> {
        let mut state = self.lock();
        let result = state.record(MockCall::CloseHandle);
        if state.open.remove(&handle).is_none() {
            state.invalid_closes += 1;
            return Err(ErrorCode::InvalidHandle);
        }
        state.token_sessions.remove(&handle);
        state.handles_closed += 1;
        drop(state);
        // a waiter on a closed handle must observe the close
        self.exited.notify_all();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_desktop_snapshot() {
        let os = MockOs::interactive_desktop();
        let processes = os.processes().unwrap();
        assert!(processes.iter().any(|p| p.name == "explorer.exe" && p.pid == 4000));
        assert_eq!(os.active_console_session(), Some(1));
        assert_eq!(os.process_session_id(4000).unwrap(), 1);
    }

    #[test]
    fn test_handle_ledger() {
        let os = MockOs::interactive_desktop();
        let process = os.open_process(4000, 0).unwrap();
        assert_eq!(os.open_handles(), 1);

        assert!(os.close_handle(process).is_ok());
        assert_eq!(os.open_handles(), 0);

        assert_eq!(os.close_handle(process), Err(ErrorCode::InvalidHandle));
        assert_eq!(os.invalid_closes(), 1);
        assert!(!os.is_balanced());
    }

    #[test]
    fn test_failure_injection() {
        let os = MockOs::interactive_desktop().fail_on(MockCall::OpenProcess, ErrorCode::AccessDenied);
        assert_eq!(os.open_process(4000, 0), Err(ErrorCode::AccessDenied));
        assert_eq!(os.calls(), vec![MockCall::OpenProcess]);

        os.clear_failure(MockCall::OpenProcess);
        assert!(os.open_process(4000, 0).is_ok());
    }

    #[test]
    fn test_reset_ledger_keeps_open_handles() {
        let os = MockOs::interactive_desktop();
        let process = os.open_process(4000, 0).unwrap();
        os.reset_ledger();

        assert!(os.calls().is_empty());
        assert!(os.spawns().is_empty());
        assert_eq!(os.open_handles(), 1);
        assert!(os.close_handle(process).is_ok());
        assert_eq!(os.calls(), vec![MockCall::CloseHandle]);
        assert!(os.is_balanced());
    }

    #[test]
    fn test_open_unknown_pid_fails() {
        let os = MockOs::interactive_desktop();
        assert_eq!(os.open_process(1, 0), Err(ErrorCode::InvalidParameter));
        assert_eq!(os.handles_opened(), 0);
    }

    #[test]
    fn test_impersonation_is_per_thread() {
        let os = MockOs::interactive_desktop();
        let process = os.open_process(4000, 0).unwrap();
        let token = os.open_process_token(process, 0).unwrap();
        os.impersonate(token).unwrap();

        assert!(os.is_impersonating(thread::current().id()));
        std::thread::scope(|scope| {
            scope.spawn(|| {
                os.revert_to_self().unwrap();
            });
        });
        assert_eq!(os.unmatched_reverts(), 1);
        assert!(os.is_impersonating(thread::current().id()));

        os.revert_to_self().unwrap();
        assert_eq!(os.impersonating_threads(), 0);
    }

    #[test]
    fn test_simulated_child_lifecycle() {
        let os = MockOs::interactive_desktop().with_child(Duration::from_millis(20), 7);
        let process = os.open_process(4000, 0).unwrap();
        let token = os.open_process_token(process, 0).unwrap();
        let primary = os.duplicate_primary_token(token).unwrap();
        let env = os.create_environment_block(primary, false).unwrap();
        let request = CreateProcessRequest {
            command_line: "child.exe ",
            working_directory: None,
            desktop: None,
        };
        let child = os.create_process_as_user(primary, env, &request).unwrap();

        // suspended children never finish
        assert_eq!(os.exit_code(child.process).unwrap(), STILL_ACTIVE);
        assert_eq!(os.wait(child.process, Some(30)).unwrap(), WaitOutcome::TimedOut);

        os.resume_thread(child.thread).unwrap();
        assert_eq!(os.wait(child.process, None).unwrap(), WaitOutcome::Signaled);
        assert_eq!(os.exit_code(child.process).unwrap(), 7);
        assert_eq!(os.terminate(child.process, 0), Err(ErrorCode::AccessDenied));
    }
}
