//! Default configuration values for Elevated-Launcher

use crate::launcher::AnchorSelection;

/// Compiled-in defaults, used for every key missing from the config file
#[derive(Debug, Clone)]
pub struct ConfigDefaults;

impl ConfigDefaults {
    /// The desktop shell runs in every interactive session
    pub const ANCHOR_PROCESS: &'static str = "explorer.exe";
    pub const ANCHOR_SELECTION: AnchorSelection = AnchorSelection::First;
    pub const INHERIT_ENVIRONMENT: bool = false;
    /// 0 waits indefinitely
    pub const WAIT_TIMEOUT_MS: u64 = 0;
    pub const KILL_ON_TIMEOUT: bool = true;
    pub const LOG_LEVEL: &'static str = "info";
    pub const CONFIG_FILE: &'static str = "elevated-launcher.toml";
}
