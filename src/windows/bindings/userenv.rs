//! Userenv.dll bindings for per-user environment blocks

use crate::os::OsResult;
use crate::windows::utils::ErrorCode;
use std::ptr;
use winapi::shared::minwindef::{FALSE, LPVOID, TRUE};
use winapi::um::userenv::{CreateEnvironmentBlock, DestroyEnvironmentBlock};
use winapi::um::winnt::HANDLE;

/// # Safety
/// The handle must be a valid token handle with TOKEN_QUERY access
pub unsafe fn create_environment_block(token: HANDLE, inherit: bool) -> OsResult<LPVOID> {
    let mut block: LPVOID = ptr::null_mut();
    let inherit = if inherit { TRUE } else { FALSE };
    if CreateEnvironmentBlock(&mut block, token, inherit) == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(block)
    }
}

/// # Safety
/// The block must come from `create_environment_block` and not be destroyed yet
pub unsafe fn destroy_environment_block(block: LPVOID) -> OsResult<()> {
    if DestroyEnvironmentBlock(block) == FALSE {
        Err(ErrorCode::last_error())
    } else {
        Ok(())
    }
}
