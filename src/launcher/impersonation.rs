//! Scoped impersonation of the session token on the calling thread

use super::token::SessionToken;
use crate::core::types::{LaunchError, LaunchResult};
use crate::os::OsApi;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error};

/// While alive, the calling thread runs as the token's user.
///
/// Dropping the guard reverts the thread to its own identity. The guard is
/// `!Send`: impersonation belongs to one thread and the revert has to happen
/// on that same thread.
pub struct ImpersonationGuard<'t, O: OsApi> {
    os: Arc<O>,
    _token: PhantomData<&'t SessionToken<O>>,
    _not_send: PhantomData<*const ()>,
}

impl<'t, O: OsApi> ImpersonationGuard<'t, O> {
    /// Impersonate `token` on the current thread. The token must outlive the guard.
    pub fn begin(os: &Arc<O>, token: &'t SessionToken<O>) -> LaunchResult<Self> {
        token
            .as_raw()
            .and_then(|raw| os.impersonate(raw))
            .map_err(LaunchError::ImpersonationFailed)?;
        debug!(session = token.session(), "impersonating interactive user");
        Ok(ImpersonationGuard {
            os: Arc::clone(os),
            _token: PhantomData,
            _not_send: PhantomData,
        })
    }
}

impl<O: OsApi> Drop for ImpersonationGuard<'_, O> {
    fn drop(&mut self) {
        match self.os.revert_to_self() {
            Ok(()) => debug!("reverted to own identity"),
            Err(code) => error!(%code, "RevertToSelf failed; thread is still impersonating"),
        }
    }
}

impl<O: OsApi> fmt::Debug for ImpersonationGuard<'_, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpersonationGuard").finish_non_exhaustive()
    }
}
