//! Anchor discovery: find the process whose token identifies the interactive user

use crate::core::types::{LaunchError, LaunchResult, ProcessId, SessionId};
use crate::os::OsApi;
use crate::windows::utils::image_name_matches;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How to choose between several processes carrying the anchor name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorSelection {
    /// Take the first match in snapshot order
    #[default]
    First,
    /// More than one match is an error
    Strict,
    /// First match running in the active console session
    ActiveConsoleSession,
}

impl fmt::Display for AnchorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorSelection::First => write!(f, "first"),
            AnchorSelection::Strict => write!(f, "strict"),
            AnchorSelection::ActiveConsoleSession => write!(f, "active-console-session"),
        }
    }
}

/// The process chosen as identity source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub pid: ProcessId,
    pub name: String,
}

/// Locates the anchor process by image name
#[derive(Debug, Clone)]
pub struct AnchorLocator {
    process_name: String,
    selection: AnchorSelection,
}

impl AnchorLocator {
    pub fn new(process_name: impl Into<String>, selection: AnchorSelection) -> Self {
        AnchorLocator {
            process_name: process_name.into(),
            selection,
        }
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn selection(&self) -> AnchorSelection {
        self.selection
    }

    /// Find the anchor. Opens no handles.
    pub fn locate<O: OsApi>(&self, os: &O) -> LaunchResult<Anchor> {
        let candidates: Vec<Anchor> = os
            .processes()
            .map_err(LaunchError::AnchorQueryError)?
            .into_iter()
            .filter(|entry| image_name_matches(&entry.name, &self.process_name))
            .map(|entry| Anchor {
                pid: entry.pid,
                name: entry.name,
            })
            .collect();

        debug!(
            name = %self.process_name,
            matches = candidates.len(),
            selection = %self.selection,
            "enumerated anchor candidates"
        );

        let not_found = || LaunchError::AnchorNotFound(self.process_name.clone());
        match self.selection {
            AnchorSelection::First => candidates.into_iter().next().ok_or_else(not_found),
            AnchorSelection::Strict => match candidates.len() {
                0 => Err(not_found()),
                1 => candidates.into_iter().next().ok_or_else(not_found),
                count => Err(LaunchError::AnchorAmbiguous {
                    name: self.process_name.clone(),
                    count,
                }),
            },
            AnchorSelection::ActiveConsoleSession => {
                let console = os.active_console_session().ok_or_else(not_found)?;
                candidates
                    .into_iter()
                    .find(|anchor| in_session(os, anchor.pid, console))
                    .ok_or_else(not_found)
            }
        }
    }
}

/// Processes whose session cannot be queried (already gone, protected) are skipped
fn in_session<O: OsApi>(os: &O, pid: ProcessId, session: SessionId) -> bool {
    os.process_session_id(pid).is_ok_and(|s| s == session)
}

impl Default for AnchorLocator {
    fn default() -> Self {
        AnchorLocator::new("explorer.exe", AnchorSelection::First)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::{MockCall, MockOs};
    use crate::windows::utils::ErrorCode;

    #[test]
    fn test_locates_explorer() {
        let os = MockOs::interactive_desktop();
        let anchor = AnchorLocator::default().locate(&os).unwrap();
        assert_eq!(anchor.pid, 4000);
        assert_eq!(anchor.name, "explorer.exe");
        assert_eq!(os.handles_opened(), 0);
    }

    #[test]
    fn test_name_without_extension() {
        let os = MockOs::interactive_desktop();
        let anchor = AnchorLocator::new("Explorer", AnchorSelection::First)
            .locate(&os)
            .unwrap();
        assert_eq!(anchor.pid, 4000);
    }

    #[test]
    fn test_not_found() {
        let os = MockOs::new().with_process(4, "System", 0);
        let err = AnchorLocator::default().locate(&os).unwrap_err();
        assert_eq!(err, LaunchError::AnchorNotFound("explorer.exe".to_string()));
    }

    #[test]
    fn test_query_error() {
        let os = MockOs::interactive_desktop().fail_on(MockCall::Processes, ErrorCode::AccessDenied);
        let err = AnchorLocator::default().locate(&os).unwrap_err();
        assert_eq!(err, LaunchError::AnchorQueryError(ErrorCode::AccessDenied));
    }

    #[test]
    fn test_first_match_wins() {
        let os = MockOs::new()
            .with_process(5000, "explorer.exe", 2)
            .with_process(4000, "explorer.exe", 1);
        let anchor = AnchorLocator::default().locate(&os).unwrap();
        assert_eq!(anchor.pid, 5000);
    }

    #[test]
    fn test_strict_rejects_ambiguity() {
        let os = MockOs::new()
            .with_process(5000, "explorer.exe", 2)
            .with_process(4000, "explorer.exe", 1);
        let err = AnchorLocator::new("explorer.exe", AnchorSelection::Strict)
            .locate(&os)
            .unwrap_err();
        assert_eq!(
            err,
            LaunchError::AnchorAmbiguous {
                name: "explorer.exe".to_string(),
                count: 2
            }
        );
    }

    #[test]
    fn test_strict_single_match() {
        let os = MockOs::interactive_desktop();
        let anchor = AnchorLocator::new("explorer.exe", AnchorSelection::Strict)
            .locate(&os)
            .unwrap();
        assert_eq!(anchor.pid, 4000);
    }

    #[test]
    fn test_active_console_session() {
        let os = MockOs::new()
            .with_process(5000, "explorer.exe", 2)
            .with_process(4000, "explorer.exe", 1)
            .with_console_session(Some(1));
        let anchor = AnchorLocator::new("explorer.exe", AnchorSelection::ActiveConsoleSession)
            .locate(&os)
            .unwrap();
        assert_eq!(anchor.pid, 4000);
    }

    #[test]
    fn test_active_console_session_missing() {
        let os = MockOs::new()
            .with_process(5000, "explorer.exe", 2)
            .with_console_session(None);
        let err = AnchorLocator::new("explorer.exe", AnchorSelection::ActiveConsoleSession)
            .locate(&os)
            .unwrap_err();
        assert!(matches!(err, LaunchError::AnchorNotFound(_)));

        let os = MockOs::new()
            .with_process(5000, "explorer.exe", 2)
            .with_console_session(Some(1));
        let err = AnchorLocator::new("explorer.exe", AnchorSelection::ActiveConsoleSession)
            .locate(&os)
            .unwrap_err();
        assert!(matches!(err, LaunchError::AnchorNotFound(_)));
    }

    #[test]
    fn test_selection_serde() {
        let value: AnchorSelection = serde_json::from_str("\"active-console-session\"").unwrap();
        assert_eq!(value, AnchorSelection::ActiveConsoleSession);
        assert_eq!(AnchorSelection::Strict.to_string(), "strict");
    }
}
