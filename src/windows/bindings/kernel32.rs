//! Kernel32.dll bindings for process enumeration and lifetime

use crate::os::{OsResult, ProcessEntry, WaitOutcome};
use crate::windows::utils::{wide_to_string, ErrorCode};
use std::mem;
use winapi::shared::minwindef::{DWORD, FALSE};
use winapi::shared::winerror::WAIT_TIMEOUT;
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::processthreadsapi::{
    GetExitCodeProcess, OpenProcess, ProcessIdToSessionId, ResumeThread, TerminateProcess,
};
use winapi::um::synchapi::WaitForSingleObject;
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use winapi::um::winbase::{WTSGetActiveConsoleSessionId, INFINITE, WAIT_FAILED, WAIT_OBJECT_0};
use winapi::um::winnt::HANDLE;

/// Returned by `WTSGetActiveConsoleSessionId` when nobody is attached
const NO_CONSOLE_SESSION: DWORD = 0xFFFF_FFFF;

/// Returned by `ResumeThread` on failure
const RESUME_FAILED: DWORD = DWORD::MAX;

/// Snapshot every running process with the ToolHelp32 API
pub fn snapshot_processes() -> OsResult<Vec<ProcessEntry>> {
    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
        if snapshot.is_null() || snapshot == INVALID_HANDLE_VALUE {
            return Err(ErrorCode::last_error());
        }

        let mut processes = Vec::new();
        let mut entry: PROCESSENTRY32W = mem::zeroed();
        entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

        let mut more = Process32FirstW(snapshot, &mut entry);
        while more != FALSE {
            processes.push(ProcessEntry::new(
                entry.th32ProcessID,
                wide_to_string(&entry.szExeFile),
            ));
            more = Process32NextW(snapshot, &mut entry);
        }

        CloseHandle(snapshot);
        Ok(processes)
    }
}

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> OsResult<HANDLE> {
    unsafe {
        let handle = OpenProcess(desired_access, FALSE, pid);
        if handle.is_null() {
            Err(ErrorCode::last_error())
        } else {
            Ok(handle)
        }
    }
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle owned by the caller
pub unsafe fn close_handle(handle: HANDLE) -> OsResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(())
    }
}

pub fn process_session_id(pid: u32) -> OsResult<u32> {
    let mut session: DWORD = 0;
    unsafe {
        if ProcessIdToSessionId(pid, &mut session) == FALSE {
            return Err(ErrorCode::last_error());
        }
    }
    Ok(session)
}

pub fn active_console_session() -> Option<u32> {
    let session = unsafe { WTSGetActiveConsoleSessionId() };
    (session != NO_CONSOLE_SESSION).then_some(session)
}

/// # Safety
/// The handle must be a valid thread handle with THREAD_SUSPEND_RESUME access
pub unsafe fn resume_thread(thread: HANDLE) -> OsResult<()> {
    if ResumeThread(thread) == RESUME_FAILED {
        Err(ErrorCode::last_error())
    } else {
        Ok(())
    }
}

/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn exit_code(process: HANDLE) -> OsResult<u32> {
    let mut code: DWORD = 0;
    if GetExitCodeProcess(process, &mut code) == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(code)
    }
}

/// # Safety
/// The handle must be a valid process handle with SYNCHRONIZE access
pub unsafe fn wait(process: HANDLE, timeout_ms: Option<u32>) -> OsResult<WaitOutcome> {
    match WaitForSingleObject(process, timeout_ms.unwrap_or(INFINITE)) {
        WAIT_OBJECT_0 => Ok(WaitOutcome::Signaled),
        WAIT_TIMEOUT => Ok(WaitOutcome::TimedOut),
        WAIT_FAILED => Err(ErrorCode::last_error()),
        other => Err(ErrorCode::Unknown(other)),
    }
}

/// # Safety
/// The handle must be a valid process handle with PROCESS_TERMINATE access
pub unsafe fn terminate(process: HANDLE, exit_code: u32) -> OsResult<()> {
    if TerminateProcess(process, exit_code) == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(())
    }
}
