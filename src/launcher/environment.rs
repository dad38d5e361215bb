//! Environment block for the target user

use super::token::SessionToken;
use crate::core::types::{LaunchError, LaunchResult};
use crate::os::{OsApi, RawEnvironment};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Environment block built from the user's profile; destroyed on drop
pub struct EnvironmentBlock<O: OsApi> {
    os: Arc<O>,
    raw: RawEnvironment,
}

impl<O: OsApi> EnvironmentBlock<O> {
    /// Build the block for `token`'s user; `inherit` also copies the caller's variables
    pub fn create(os: &Arc<O>, token: &SessionToken<O>, inherit: bool) -> LaunchResult<Self> {
        let raw = token
            .as_raw()
            .and_then(|token| os.create_environment_block(token, inherit))
            .map_err(LaunchError::EnvironmentBuildFailed)?;
        debug!(inherit, "created environment block");
        Ok(EnvironmentBlock {
            os: Arc::clone(os),
            raw,
        })
    }

    pub(crate) fn raw(&self) -> RawEnvironment {
        self.raw
    }
}

impl<O: OsApi> Drop for EnvironmentBlock<O> {
    fn drop(&mut self) {
        if let Err(code) = self.os.destroy_environment_block(self.raw) {
            warn!(%code, "DestroyEnvironmentBlock failed");
        }
    }
}

impl<O: OsApi> fmt::Debug for EnvironmentBlock<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvironmentBlock(0x{:X})", self.raw.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::anchor::Anchor;
    use crate::os::{MockCall, MockOs};
    use crate::windows::utils::ErrorCode;

    fn token(os: &Arc<MockOs>) -> SessionToken<MockOs> {
        let anchor = Anchor {
            pid: 4000,
            name: "explorer.exe".to_string(),
        };
        SessionToken::acquire(os, &anchor).unwrap()
    }

    #[test]
    fn test_block_destroyed_once() {
        let os = Arc::new(MockOs::interactive_desktop());
        let token = token(&os);
        {
            let _block = EnvironmentBlock::create(&os, &token, false).unwrap();
            assert_eq!(os.live_environments(), 1);
        }
        assert_eq!(os.live_environments(), 0);
        assert_eq!(os.call_count(MockCall::DestroyEnvironment), 1);
        assert_eq!(os.invalid_destroys(), 0);
    }

    #[test]
    fn test_build_failure() {
        let os = Arc::new(
            MockOs::interactive_desktop().fail_on(MockCall::CreateEnvironment, ErrorCode::AccessDenied),
        );
        let token = token(&os);
        let err = EnvironmentBlock::create(&os, &token, true).unwrap_err();
        assert_eq!(err, LaunchError::EnvironmentBuildFailed(ErrorCode::AccessDenied));
        assert_eq!(os.call_count(MockCall::DestroyEnvironment), 0);
    }
}
