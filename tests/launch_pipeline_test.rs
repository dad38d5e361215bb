//! Integration tests for the cross-session launch pipeline against MockOs

use elevated_launcher::launcher::{AnchorLocator, AnchorSelection, LaunchOptions, Launcher};
use elevated_launcher::os::{MockCall, MockOs};
use elevated_launcher::{ErrorCode, LaunchError, LaunchSpec};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Calls whose failure aborts a launch, in pipeline order
const FAILURE_POINTS: [MockCall; 10] = [
    MockCall::Processes,
    MockCall::OpenProcess,
    MockCall::OpenProcessToken,
    MockCall::DuplicateToken,
    MockCall::QuerySession,
    MockCall::SetTokenSession,
    MockCall::Impersonate,
    MockCall::CreateEnvironment,
    MockCall::CreateProcess,
    MockCall::ResumeThread,
];

fn desktop() -> Arc<MockOs> {
    Arc::new(MockOs::interactive_desktop().with_child(Duration::from_secs(60), 0))
}

fn spec() -> LaunchSpec {
    LaunchSpec::new("C:\\Program Files\\Agent\\agent.exe").with_arguments("--report")
}

#[test]
fn test_successful_launch_call_sequence() {
    let os = desktop();
    let process = Launcher::new(Arc::clone(&os)).start_elevated(&spec()).unwrap();

    assert_eq!(
        os.calls(),
        vec![
            MockCall::Processes,
            MockCall::OpenProcess,
            MockCall::OpenProcessToken,
            MockCall::CloseHandle,
            MockCall::DuplicateToken,
            MockCall::CloseHandle,
            MockCall::QuerySession,
            MockCall::SetTokenSession,
            MockCall::Impersonate,
            MockCall::CreateEnvironment,
            MockCall::CreateProcess,
            MockCall::ResumeThread,
            MockCall::DestroyEnvironment,
            MockCall::RevertToSelf,
            MockCall::CloseHandle,
        ]
    );

    let spawn = os.last_spawn().unwrap();
    assert_eq!(spawn.pid, process.pid());
    assert_eq!(spawn.command_line, "C:\\Program Files\\Agent\\agent.exe --report");
    assert_eq!(spawn.token_session, Some(1));
    assert!(!spawn.inherited_environment);
}

#[test]
fn test_failure_kinds_per_step() {
    let expected = [
        "AnchorQueryError",
        "OpenAnchorFailed",
        "OpenTokenFailed",
        "DuplicateTokenFailed",
        "SessionQueryFailed",
        "SetSessionFailed",
        "ImpersonationFailed",
        "EnvironmentBuildFailed",
        "ProcessCreateFailed",
        "ResumeFailed",
    ];
    for (call, kind) in FAILURE_POINTS.iter().zip(expected) {
        let os = Arc::new(MockOs::interactive_desktop().fail_on(*call, ErrorCode::AccessDenied));
        let err = Launcher::new(Arc::clone(&os))
            .start_elevated(&spec())
            .unwrap_err();
        assert_eq!(err.kind(), kind, "failure injected at {:?}", call);
        assert_eq!(err.os_code(), Some(5));
    }
}

#[test]
fn test_anchor_not_found_opens_nothing() {
    let os = Arc::new(MockOs::new().with_process(4, "System", 0));
    let err = Launcher::new(Arc::clone(&os))
        .start_elevated(&spec())
        .unwrap_err();

    assert_eq!(err, LaunchError::AnchorNotFound("explorer.exe".to_string()));
    assert_eq!(os.call_count(MockCall::OpenProcess), 0);
    assert_eq!(os.handles_opened(), 0);
    assert!(os.spawns().is_empty());
}

#[test]
fn test_revert_exactly_once_after_impersonation() {
    for call in [MockCall::CreateEnvironment, MockCall::CreateProcess, MockCall::ResumeThread] {
        let os = Arc::new(MockOs::interactive_desktop().fail_on(call, ErrorCode::AccessDenied));
        let _ = Launcher::new(Arc::clone(&os)).start_elevated(&spec());
        assert_eq!(os.call_count(MockCall::RevertToSelf), 1, "after {:?}", call);
        assert_eq!(os.unmatched_reverts(), 0);
        assert!(!os.is_impersonating(thread::current().id()));
    }
}

#[test]
fn test_no_revert_without_impersonation() {
    let os = Arc::new(MockOs::interactive_desktop().fail_on(MockCall::Impersonate, ErrorCode::NoToken));
    let _ = Launcher::new(Arc::clone(&os)).start_elevated(&spec());
    assert_eq!(os.call_count(MockCall::RevertToSelf), 0);
    assert!(os.is_balanced());
}

#[test]
fn test_no_resume_after_failed_create() {
    let os = Arc::new(
        MockOs::interactive_desktop().fail_on(MockCall::CreateProcess, ErrorCode::FileNotFound),
    );
    let err = Launcher::new(Arc::clone(&os))
        .start_elevated(&spec())
        .unwrap_err();

    assert!(matches!(
        err,
        LaunchError::ProcessCreateFailed { ref command_line, code: ErrorCode::FileNotFound }
            if command_line == "C:\\Program Files\\Agent\\agent.exe --report"
    ));
    assert_eq!(os.call_count(MockCall::ResumeThread), 0);
    assert!(os.is_balanced());
}

#[test]
fn test_resume_failure_terminates_child() {
    let os = Arc::new(
        MockOs::interactive_desktop()
            .with_child(Duration::from_secs(60), 0)
            .fail_on(MockCall::ResumeThread, ErrorCode::AccessDenied),
    );
    let err = Launcher::new(Arc::clone(&os))
        .start_elevated(&spec())
        .unwrap_err();

    assert_eq!(err.kind(), "ResumeFailed");
    assert_eq!(os.call_count(MockCall::Terminate), 1);
    assert!(os.is_balanced());
}

#[test]
fn test_strict_selection_rejects_multiple_anchors() {
    let os = Arc::new(MockOs::interactive_desktop().with_process(5120, "explorer.exe", 2));
    let options = LaunchOptions {
        anchor: AnchorLocator::new("explorer.exe", AnchorSelection::Strict),
        ..LaunchOptions::default()
    };
    let err = Launcher::with_options(Arc::clone(&os), options)
        .start_elevated(&spec())
        .unwrap_err();

    assert_eq!(
        err,
        LaunchError::AnchorAmbiguous {
            name: "explorer.exe".to_string(),
            count: 2
        }
    );
    assert_eq!(os.handles_opened(), 0);
}

#[test]
fn test_console_session_selection_binds_to_console_user() {
    let os = Arc::new(
        MockOs::new()
            .with_process(3000, "explorer.exe", 2)
            .with_process(4000, "explorer.exe", 1)
            .with_console_session(Some(1))
            .with_child(Duration::ZERO, 0),
    );
    let options = LaunchOptions {
        anchor: AnchorLocator::new("Explorer", AnchorSelection::ActiveConsoleSession),
        ..LaunchOptions::default()
    };
    let _process = Launcher::with_options(Arc::clone(&os), options)
        .start_elevated(&spec())
        .unwrap();

    assert_eq!(os.last_spawn().unwrap().token_session, Some(1));
}

#[test]
fn test_first_selection_takes_first_in_snapshot_order() {
    let os = Arc::new(
        MockOs::new()
            .with_process(3000, "explorer.exe", 2)
            .with_process(4000, "explorer.exe", 1)
            .with_child(Duration::ZERO, 0),
    );
    let _process = Launcher::new(Arc::clone(&os)).start_elevated(&spec()).unwrap();
    assert_eq!(os.last_spawn().unwrap().token_session, Some(2));
}

#[test]
fn test_working_directory_and_desktop_reach_create() {
    let os = desktop();
    let options = LaunchOptions {
        desktop: Some("winsta0\\default".to_string()),
        ..LaunchOptions::default()
    };
    let spec = LaunchSpec::new("agent.exe").with_working_directory("C:\\Work");
    let _process = Launcher::with_options(Arc::clone(&os), options)
        .start_elevated(&spec)
        .unwrap();

    let spawn = os.last_spawn().unwrap();
    assert_eq!(spawn.command_line, "agent.exe ");
    assert_eq!(spawn.working_directory.as_deref(), Some("C:\\Work"));
    assert_eq!(spawn.desktop.as_deref(), Some("winsta0\\default"));
}

#[test]
fn test_concurrent_launches_stay_balanced() {
    let os = Arc::new(MockOs::interactive_desktop().with_child(Duration::from_millis(5), 0));
    let launcher = Arc::new(Launcher::new(Arc::clone(&os)));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let launcher = Arc::clone(&launcher);
            thread::spawn(move || {
                let process = launcher.start_elevated(&spec()).unwrap();
                process.wait().unwrap();
                process.pid()
            })
        })
        .collect();

    let mut pids: Vec<u32> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    pids.sort_unstable();
    pids.dedup();
    assert_eq!(pids.len(), 8);
    assert!(os.is_balanced());
}

proptest! {
    #[test]
    fn prop_failed_launch_leaks_nothing(
        call in prop::sample::select(FAILURE_POINTS.to_vec()),
        code in prop::sample::select(vec![
            ErrorCode::AccessDenied,
            ErrorCode::InvalidHandle,
            ErrorCode::PrivilegeNotHeld,
            ErrorCode::Unknown(1450),
        ]),
    ) {
        let os = Arc::new(MockOs::interactive_desktop().fail_on(call, code));
        let result = Launcher::new(Arc::clone(&os)).start_elevated(&spec());

        let err = result.err();
        prop_assert!(err.is_some());
        prop_assert_eq!(err.and_then(|e| e.os_code()), Some(code.code()));
        prop_assert!(os.is_balanced());
        prop_assert_eq!(os.handles_opened(), os.handles_closed());
    }
}
