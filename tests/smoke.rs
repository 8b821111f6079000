//! Smoke tests that run the shipped binaries to ensure they work end-to-end.
//!
//! These tests are disabled by default to avoid slowing down the regular test
//! suite. Enable them by setting the FOLLOWGRAPH_SMOKE_TESTS environment
//! variable:
//!
//!     FOLLOWGRAPH_SMOKE_TESTS=1 cargo test smoke
//!
//! Or run all tests including smoke tests:
//!
//!     FOLLOWGRAPH_SMOKE_TESTS=1 cargo test

use std::process::Command;

/// Helper to run a binary and verify it succeeds with output.
fn run_bin(bin_name: &str, args: &[&str]) {
    let result = Command::new("cargo")
        .args(["run", "--bin", bin_name, "--"])
        .args(args)
        .output()
        .unwrap_or_else(|_| panic!("Failed to run binary: {}", bin_name));

    assert!(
        result.status.success(),
        "Binary '{}' failed with exit code {:?}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
        bin_name,
        result.status.code(),
        String::from_utf8_lossy(&result.stdout),
        String::from_utf8_lossy(&result.stderr)
    );

    let stdout = String::from_utf8_lossy(&result.stdout);
    let stderr = String::from_utf8_lossy(&result.stderr);
    let combined_output = format!("{}{}", stdout, stderr);

    assert!(
        !combined_output.trim().is_empty(),
        "Binary '{}' produced no output",
        bin_name
    );
}

#[test]
fn smoke_test_daily_report() {
    if std::env::var("FOLLOWGRAPH_SMOKE_TESTS").is_err() {
        eprintln!(
            "Skipping smoke test smoke_test_daily_report (set FOLLOWGRAPH_SMOKE_TESTS=1 to enable)"
        );
        return;
    }

    run_bin("daily_report", &["2025-08-21"]);
}
