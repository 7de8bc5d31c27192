use std::process::{Command, Output};

use test_case::test_case;

use rustyfatal::constants::ENV_RUSTYFATAL_LOG;

fn trip(args: &[&str]) -> Output {
    let result = Command::new(env!("CARGO_BIN_EXE_rustyfatal-trip"))
        .args(args)
        .env_remove(ENV_RUSTYFATAL_LOG)
        .output()
        .unwrap();
    println!("Stdout: {}", String::from_utf8_lossy(&result.stdout));
    println!("Stderr: {}", String::from_utf8_lossy(&result.stderr));
    result
}

#[test_case("fatal-error", "Fatal error: boom")]
#[test_case("precondition", "Precondition failed: boom")]
#[test_case("precondition-failure", "Precondition failed: boom")]
fn default_handler_aborts(kind: &str, diagnostic: &str) {
    let result = trip(&[kind, "--message", "boom"]);

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains(diagnostic));
    assert!(stderr.contains("rustyfatal-trip.rs:"));
    assert!(!String::from_utf8_lossy(&result.stdout).contains("survived"));

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(result.status.signal(), Some(6)); // SIGABRT
    }
}

#[test]
fn holding_precondition_returns() {
    let result = trip(&["precondition", "--condition", "true", "--message", "boom"]);

    assert!(result.status.success());
    assert!(String::from_utf8_lossy(&result.stdout).contains("survived"));
    assert!(!String::from_utf8_lossy(&result.stderr).contains("boom"));
}

#[test]
fn unknown_kind_is_rejected() {
    let result = trip(&["segfault"]);

    assert!(!result.status.success());
    assert_eq!(result.status.code(), Some(2));
}
