//! Process creation under the session token

use super::environment::EnvironmentBlock;
use super::token::SessionToken;
use crate::core::types::{LaunchError, LaunchResult, LaunchSpec};
use crate::os::{CreateProcessRequest, OsApi};
use crate::process::LaunchedProcess;
use std::sync::Arc;
use tracing::{debug, warn};

/// Create the process suspended, take ownership of its handles, then resume it.
///
/// If the resume fails the child is terminated and its handles released, so
/// a caller never receives a process that will stay suspended forever.
pub(crate) fn create_process<O: OsApi>(
    os: &Arc<O>,
    spec: &LaunchSpec,
    token: &SessionToken<O>,
    environment: &EnvironmentBlock<O>,
    desktop: Option<&str>,
) -> LaunchResult<LaunchedProcess<O>> {
    let command_line = spec.command_line();
    let request = CreateProcessRequest {
        command_line: &command_line,
        working_directory: spec.working_directory(),
        desktop,
    };

    let created = token
        .as_raw()
        .and_then(|token| os.create_process_as_user(token, environment.raw(), &request))
        .map_err(|code| LaunchError::ProcessCreateFailed {
            command_line: command_line.clone(),
            code,
        })?;
    let process = LaunchedProcess::from_created(Arc::clone(os), created);
    debug!(pid = created.pid, tid = created.tid, "created suspended process");

    if let Err(err) = process.resume() {
        if let Err(kill_err) = process.kill() {
            warn!(pid = created.pid, error = %kill_err, "could not terminate unresumable process");
        }
        return Err(err);
    }

    Ok(process)
}
