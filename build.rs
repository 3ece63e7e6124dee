//! Embeds build provenance for the `/version` endpoint.
//!
//! Container builds usually have no `.git` directory, so `SOURCE_COMMIT`
//! overrides the git lookup and `SOURCE_DATE_EPOCH` pins the build time.

use std::env;
use std::process::Command;

use chrono::{DateTime, Utc};

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn commit() -> Option<String> {
    env::var("SOURCE_COMMIT")
        .ok()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| git(&["rev-parse", "HEAD"]))
}

fn build_time() -> DateTime<Utc> {
    env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

fn main() {
    let full = commit().unwrap_or_else(|| "unknown".to_string());
    let short: String = if full == "unknown" {
        full.clone()
    } else {
        full.chars().take(8).collect()
    };

    println!("cargo:rustc-env=GIT_COMMIT_FULL={}", full);
    println!("cargo:rustc-env=GIT_COMMIT_SHORT={}", short);
    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        build_time().format("%Y-%m-%dT%H:%M:%SZ")
    );

    println!("cargo:rerun-if-env-changed=SOURCE_COMMIT");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
