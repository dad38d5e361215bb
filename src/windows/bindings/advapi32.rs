//! Advapi32.dll bindings for tokens, impersonation and process creation

use crate::os::{CreatedProcess, OsResult, RawHandle};
use crate::windows::utils::{string_to_wide, ErrorCode};
use std::{mem, ptr};
use winapi::shared::minwindef::{DWORD, FALSE, LPVOID};
use winapi::um::processthreadsapi::{
    CreateProcessAsUserW, OpenProcessToken, PROCESS_INFORMATION, STARTUPINFOW,
};
use winapi::um::securitybaseapi::{
    DuplicateTokenEx, ImpersonateLoggedOnUser, RevertToSelf, SetTokenInformation,
};
use winapi::um::winbase::{CREATE_NO_WINDOW, CREATE_SUSPENDED, CREATE_UNICODE_ENVIRONMENT};
use winapi::um::winnt::{
    SecurityIdentification, TokenPrimary, TokenSessionId, HANDLE, MAXIMUM_ALLOWED,
};

/// Creation flags for every launched child
pub const CREATION_FLAGS: DWORD = CREATE_SUSPENDED | CREATE_NO_WINDOW | CREATE_UNICODE_ENVIRONMENT;

/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn open_process_token(process: HANDLE, access: u32) -> OsResult<HANDLE> {
    let mut token: HANDLE = ptr::null_mut();
    if OpenProcessToken(process, access, &mut token) == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(token)
    }
}

/// Duplicate into a primary token at identification level
///
/// # Safety
/// The handle must be a valid token handle with TOKEN_DUPLICATE access
pub unsafe fn duplicate_primary_token(token: HANDLE) -> OsResult<HANDLE> {
    let mut duplicate: HANDLE = ptr::null_mut();
    let ok = DuplicateTokenEx(
        token,
        MAXIMUM_ALLOWED,
        ptr::null_mut(),
        SecurityIdentification,
        TokenPrimary,
        &mut duplicate,
    );
    if ok == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(duplicate)
    }
}

/// Requires SeTcbPrivilege in the caller
///
/// # Safety
/// The handle must be a valid primary token handle
pub unsafe fn set_token_session_id(token: HANDLE, session: u32) -> OsResult<()> {
    let mut session: DWORD = session;
    let ok = SetTokenInformation(
        token,
        TokenSessionId,
        &mut session as *mut DWORD as LPVOID,
        mem::size_of::<DWORD>() as DWORD,
    );
    if ok == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(())
    }
}

/// # Safety
/// The handle must be a valid token handle
pub unsafe fn impersonate(token: HANDLE) -> OsResult<()> {
    if ImpersonateLoggedOnUser(token) == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(())
    }
}

pub fn revert_to_self() -> OsResult<()> {
    if unsafe { RevertToSelf() } == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(())
    }
}

/// Safe-ish wrapper for CreateProcessAsUserW
///
/// The command line is copied into a mutable buffer, which the API may modify.
///
/// # Safety
/// `token` must be a valid primary token and `environment` a block returned by
/// `CreateEnvironmentBlock` (or null).
pub unsafe fn create_process_as_user(
    token: HANDLE,
    environment: LPVOID,
    command_line: &str,
    working_directory: Option<&str>,
    desktop: Option<&str>,
) -> OsResult<CreatedProcess> {
    let mut command_line = string_to_wide(command_line);
    let working_directory = working_directory.map(string_to_wide);
    let mut desktop = desktop.map(string_to_wide);

    let mut startup: STARTUPINFOW = mem::zeroed();
    startup.cb = mem::size_of::<STARTUPINFOW>() as DWORD;
    if let Some(desktop) = desktop.as_mut() {
        startup.lpDesktop = desktop.as_mut_ptr();
    }

    let mut info: PROCESS_INFORMATION = mem::zeroed();
    let ok = CreateProcessAsUserW(
        token,
        ptr::null(),
        command_line.as_mut_ptr(),
        ptr::null_mut(),
        ptr::null_mut(),
        FALSE,
        CREATION_FLAGS,
        environment,
        working_directory
            .as_ref()
            .map_or(ptr::null(), |dir| dir.as_ptr()),
        &mut startup,
        &mut info,
    );

    if ok == FALSE {
        return Err(ErrorCode::last_error());
    }

    Ok(CreatedProcess {
        process: RawHandle::new(info.hProcess as usize),
        thread: RawHandle::new(info.hThread as usize),
        pid: info.dwProcessId,
        tid: info.dwThreadId,
    })
}
