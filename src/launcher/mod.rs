//! Cross-session launcher
//!
//! Starts a child process as the user logged on to the interactive desktop,
//! from a caller running in another (typically non-interactive service)
//! session. The pipeline is linear:
//!
//! 1. [`AnchorLocator`] finds a process already running as that user.
//! 2. [`SessionToken`] derives a primary token bound to the anchor's session.
//! 3. [`ImpersonationGuard`] impersonates it on the calling thread.
//! 4. [`EnvironmentBlock`] builds the user's environment.
//! 5. The process is created suspended, then resumed, and handed to the
//!    caller as a [`LaunchedProcess`].
//!
//! Each intermediate resource releases itself on drop, so every exit path
//! (including early error returns) releases exactly what was acquired.

pub mod anchor;
mod creator;
pub mod environment;
pub mod impersonation;
pub mod token;

pub use anchor::{Anchor, AnchorLocator, AnchorSelection};
pub use environment::EnvironmentBlock;
pub use impersonation::ImpersonationGuard;
pub use token::SessionToken;

use crate::config::Config;
use crate::core::types::{LaunchResult, LaunchSpec};
use crate::os::OsApi;
use crate::process::LaunchedProcess;
use std::sync::Arc;
use tracing::info;

/// Knobs of a launch that are not part of the [`LaunchSpec`]
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub anchor: AnchorLocator,
    /// Also inherit the caller's environment variables
    pub inherit_environment: bool,
    /// Window station and desktop for the child, e.g. `winsta0\default`
    pub desktop: Option<String>,
}

impl LaunchOptions {
    pub fn from_config(config: &Config) -> Self {
        LaunchOptions {
            anchor: AnchorLocator::new(
                config.anchor.process_name.clone(),
                config.anchor.selection,
            ),
            inherit_environment: config.launch.inherit_environment,
            desktop: config.launch.desktop.clone().filter(|d| !d.is_empty()),
        }
    }
}

/// Launches processes into the interactive user's session
pub struct Launcher<O: OsApi> {
    os: Arc<O>,
    options: LaunchOptions,
}

impl<O: OsApi> Launcher<O> {
    pub fn new(os: Arc<O>) -> Self {
        Launcher {
            os,
            options: LaunchOptions::default(),
        }
    }

    pub fn with_options(os: Arc<O>, options: LaunchOptions) -> Self {
        Launcher { os, options }
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Start `spec` as the interactive user.
    ///
    /// Blocks the calling thread for the duration of the pipeline. The
    /// calling thread impersonates the user only inside this call.
    pub fn start_elevated(&self, spec: &LaunchSpec) -> LaunchResult<LaunchedProcess<O>> {
        let anchor = self.options.anchor.locate(self.os.as_ref())?;
        let token = SessionToken::acquire(&self.os, &anchor)?;

        // Locals drop in reverse order: the environment block is destroyed,
        // then the thread reverts, then the token is closed.
        let _impersonation = ImpersonationGuard::begin(&self.os, &token)?;
        let environment =
            EnvironmentBlock::create(&self.os, &token, self.options.inherit_environment)?;
        let process = creator::create_process(
            &self.os,
            spec,
            &token,
            &environment,
            self.options.desktop.as_deref(),
        )?;

        info!(
            pid = process.pid(),
            session = token.session(),
            anchor = anchor.pid,
            command = %spec,
            "started process in interactive session"
        );
        Ok(process)
    }
}

/// Start `spec` in the interactive user's session with default options
#[cfg(windows)]
pub fn start_elevated(
    spec: &LaunchSpec,
) -> LaunchResult<LaunchedProcess<crate::windows::Win32Os>> {
    Launcher::new(Arc::new(crate::windows::Win32Os)).start_elevated(spec)
}
