//! Source-level rules for the chat crates

use architectural_enforcement::{assert_clean, find_violations, production_sources};

#[test]
fn test_sources_are_found() {
    let sources = production_sources();
    assert!(
        sources.iter().any(|p| p.ends_with("core/src/session.rs")),
        "scan did not find the session module: {sources:?}"
    );
}

#[test]
fn test_only_the_scheduler_sleeps() {
    assert_clean(
        "tokio::time::sleep outside the scheduler",
        &find_violations("tokio::time::sleep", &["transport/scheduler.rs"]),
    );
    assert_clean(
        "blocking thread sleep",
        &find_violations("thread::sleep", &[]),
    );
}

#[test]
fn test_blocking_fs_only_in_config() {
    assert_clean(
        "blocking std::fs outside config loading",
        &find_violations("std::fs", &["core/src/config.rs"]),
    );
}

#[test]
fn test_library_code_does_not_unwrap() {
    assert_clean(
        "unwrap in library code",
        &find_violations(".unwrap()", &[]),
    );
    assert_clean(
        "expect in library code",
        &find_violations(".expect(", &[]),
    );
}

#[test]
fn test_session_state_machine_has_no_io() {
    // The controller is driven by events; I/O belongs to the transport and backend
    let mut violations = Vec::new();
    for pattern in ["reqwest::Client", "tokio::spawn", "tokio::time"] {
        violations.extend(
            find_violations(pattern, &[])
                .into_iter()
                .filter(|v| {
                    v.file.ends_with("core/src/session.rs") || v.file.ends_with("core/src/store.rs")
                }),
        );
    }
    assert_clean("I/O in the session state machine", &violations);
}
