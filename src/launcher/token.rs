//! Token pipeline: derive a primary token scoped to the anchor's session
//!
//! Every intermediate resource is an [`OwnedHandle`], so an early return at
//! any step closes exactly what the previous steps opened.

use super::anchor::Anchor;
use crate::core::types::{LaunchError, LaunchResult, SessionId};
use crate::os::{OsApi, OsResult, RawHandle};
use crate::process::{HandleKind, OwnedHandle, ProcessAccess, TokenAccess};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The anchor's own access token, as opened from the anchor process
struct AnchorToken<O: OsApi> {
    handle: OwnedHandle<O>,
}

impl<O: OsApi> AnchorToken<O> {
    /// Open the anchor process and its token. The process handle is closed
    /// as soon as the token is open, whether or not that succeeded.
    fn open(os: &Arc<O>, anchor: &Anchor) -> LaunchResult<Self> {
        let process_access = ProcessAccess::combine(&[
            ProcessAccess::DUPLICATE_HANDLE,
            ProcessAccess::QUERY_INFORMATION,
        ]);
        let raw = os
            .open_process(anchor.pid, process_access.value())
            .map_err(|code| LaunchError::OpenAnchorFailed {
                pid: anchor.pid,
                code,
            })?;
        let anchor_process = OwnedHandle::new(Arc::clone(os), raw, HandleKind::Process);
        debug!(pid = anchor.pid, handle = %raw, "opened anchor process");

        let token_access = TokenAccess::combine(&[
            TokenAccess::QUERY,
            TokenAccess::DUPLICATE,
            TokenAccess::ASSIGN_PRIMARY,
        ]);
        let token = anchor_process
            .as_raw()
            .and_then(|process| os.open_process_token(process, token_access.value()))
            .map_err(LaunchError::OpenTokenFailed)?;
        drop(anchor_process);
        debug!(handle = %token, "opened anchor token");

        Ok(AnchorToken {
            handle: OwnedHandle::new(Arc::clone(os), token, HandleKind::Token),
        })
    }

    /// Duplicate into a primary token, consuming (and closing) the anchor token
    fn into_primary(self, os: &Arc<O>) -> LaunchResult<OwnedHandle<O>> {
        let primary = self
            .handle
            .as_raw()
            .and_then(|token| os.duplicate_primary_token(token))
            .map_err(LaunchError::DuplicateTokenFailed)?;
        debug!(handle = %primary, "duplicated primary token");
        Ok(OwnedHandle::new(Arc::clone(os), primary, HandleKind::Token))
    }
}

/// Primary token of the interactive user, bound to the anchor's session.
///
/// Closed when dropped.
pub struct SessionToken<O: OsApi> {
    handle: OwnedHandle<O>,
    session: SessionId,
}

impl<O: OsApi> SessionToken<O> {
    /// Run the token pipeline against `anchor`:
    /// open process, open token, duplicate to primary, query session, set session.
    pub fn acquire(os: &Arc<O>, anchor: &Anchor) -> LaunchResult<Self> {
        let primary = AnchorToken::open(os, anchor)?.into_primary(os)?;

        let session = os
            .process_session_id(anchor.pid)
            .map_err(|code| LaunchError::SessionQueryFailed {
                pid: anchor.pid,
                code,
            })?;

        primary
            .as_raw()
            .and_then(|token| os.set_token_session_id(token, session))
            .map_err(|code| LaunchError::SetSessionFailed { session, code })?;
        debug!(session, "bound token to anchor session");

        Ok(SessionToken {
            handle: primary,
            session,
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub(crate) fn as_raw(&self) -> OsResult<RawHandle> {
        self.handle.as_raw()
    }
}

impl<O: OsApi> fmt::Debug for SessionToken<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("session", &self.session)
            .field("handle", &self.handle)
            .finish()
    }
}
