//! The Win32 implementation of [`OsApi`]

use super::bindings::{advapi32, kernel32, userenv};
use crate::core::types::{ProcessId, SessionId};
use crate::os::{
    CreateProcessRequest, CreatedProcess, OsApi, OsResult, ProcessEntry, RawEnvironment,
    RawHandle, WaitOutcome,
};
use winapi::shared::minwindef::LPVOID;
use winapi::um::winnt::HANDLE;

fn handle(raw: RawHandle) -> HANDLE {
    raw.value() as HANDLE
}

fn raw(handle: HANDLE) -> RawHandle {
    RawHandle::new(handle as usize)
}

fn block(environment: RawEnvironment) -> LPVOID {
    environment.value() as LPVOID
}

/// The live operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Os;

impl OsApi for Win32Os {
    fn processes(&self) -> OsResult<Vec<ProcessEntry>> {
        kernel32::snapshot_processes()
    }

    fn active_console_session(&self) -> Option<SessionId> {
        kernel32::active_console_session()
    }

    fn open_process(&self, pid: ProcessId, access: u32) -> OsResult<RawHandle> {
        kernel32::open_process(pid, access).map(raw)
    }

    fn open_process_token(&self, process: RawHandle, access: u32) -> OsResult<RawHandle> {
        unsafe { advapi32::open_process_token(handle(process), access).map(raw) }
    }

    fn duplicate_primary_token(&self, token: RawHandle) -> OsResult<RawHandle> {
        unsafe { advapi32::duplicate_primary_token(handle(token)).map(raw) }
    }

    fn process_session_id(&self, pid: ProcessId) -> OsResult<SessionId> {
        kernel32::process_session_id(pid)
    }

    fn set_token_session_id(&self, token: RawHandle, session: SessionId) -> OsResult<()> {
        unsafe { advapi32::set_token_session_id(handle(token), session) }
    }

    fn impersonate(&self, token: RawHandle) -> OsResult<()> {
        unsafe { advapi32::impersonate(handle(token)) }
    }

    fn revert_to_self(&self) -> OsResult<()> {
        advapi32::revert_to_self()
    }

    fn create_environment_block(
        &self,
        token: RawHandle,
        inherit: bool,
    ) -> OsResult<RawEnvironment> {
        unsafe {
            userenv::create_environment_block(handle(token), inherit)
                .map(|block| RawEnvironment::new(block as usize))
        }
    }

    fn destroy_environment_block(&self, environment: RawEnvironment) -> OsResult<()> {
        unsafe { userenv::destroy_environment_block(block(environment)) }
    }

    fn create_process_as_user(
        &self,
        token: RawHandle,
        environment: RawEnvironment,
        request: &CreateProcessRequest<'_>,
    ) -> OsResult<CreatedProcess> {
        unsafe {
            advapi32::create_process_as_user(
                handle(token),
                block(environment),
                request.command_line,
                request.working_directory,
                request.desktop,
            )
        }
    }

    fn resume_thread(&self, thread: RawHandle) -> OsResult<()> {
        unsafe { kernel32::resume_thread(handle(thread)) }
    }

    fn exit_code(&self, process: RawHandle) -> OsResult<u32> {
        unsafe { kernel32::exit_code(handle(process)) }
    }

    fn wait(&self, process: RawHandle, timeout_ms: Option<u32>) -> OsResult<WaitOutcome> {
        unsafe { kernel32::wait(handle(process), timeout_ms) }
    }

    fn terminate(&self, process: RawHandle, exit_code: u32) -> OsResult<()> {
        unsafe { kernel32::terminate(handle(process), exit_code) }
    }

    fn close_handle(&self, handle_value: RawHandle) -> OsResult<()> {
        unsafe { kernel32::close_handle(handle(handle_value)) }
    }
}
