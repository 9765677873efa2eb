//! Build script for bigring-vp
//!
//! Stamps the player with the values `GET /health` returns and `main` logs at
//! startup, so a running player can be matched to the commit it came from:
//! - `GIT_HASH`: short commit hash, or `BIGRING_GIT_HASH` for builds outside git
//! - `BUILD_TIMESTAMP`: UTC build time (RFC 3339)
//! - `BUILD_PROFILE`: cargo profile (debug/release)

use std::env;
use std::process::Command;

const UNKNOWN: &str = "unknown";

fn main() {
    emit("GIT_HASH", &git_hash());
    emit("BUILD_TIMESTAMP", &build_timestamp());
    emit("BUILD_PROFILE", &env::var("PROFILE").unwrap_or_else(|_| UNKNOWN.into()));

    println!("cargo:rerun-if-env-changed=BIGRING_GIT_HASH");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/refs");
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn git_hash() -> String {
    if let Ok(hash) = env::var("BIGRING_GIT_HASH") {
        if !hash.trim().is_empty() {
            return hash.trim().to_string();
        }
    }

    Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| UNKNOWN.into())
}

fn build_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
