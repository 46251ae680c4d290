//! Build script for War Council
//!
//! Embeds the git revision, build timestamp, target and rustc version so the
//! `version` subcommand can report exactly which build is running.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = run_trimmed("git", &["rev-parse", "--short=8", "HEAD"]);
    let git_branch = run_trimmed("git", &["rev-parse", "--abbrev-ref", "HEAD"]);
    let git_dirty = match run_raw("git", &["status", "--porcelain"]) {
        Some(out) if !out.trim().is_empty() => "true",
        Some(_) => "false",
        None => "unknown",
    };

    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let rustc_version = run_trimmed("rustc", &["--version"]);

    println!("cargo:rustc-env=COUNCIL_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=COUNCIL_GIT_BRANCH={}", git_branch);
    println!("cargo:rustc-env=COUNCIL_GIT_DIRTY={}", git_dirty);
    println!("cargo:rustc-env=COUNCIL_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=COUNCIL_TARGET={}", target);
    println!("cargo:rustc-env=COUNCIL_PROFILE={}", profile);
    println!("cargo:rustc-env=COUNCIL_RUSTC_VERSION={}", rustc_version);
}

/// Run a command and return its stdout, or `None` if it could not run or failed
fn run_raw(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
}

/// Run a command and return its trimmed stdout, falling back to "unknown"
fn run_trimmed(program: &str, args: &[&str]) -> String {
    run_raw(program, args)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
