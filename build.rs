use std::process::Command;

use chrono::Utc;

fn main() {
    // Stamped into `storefront-checkout --version`
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=CHECKOUT_GIT_HASH={}", git_hash);
    println!(
        "cargo:rustc-env=CHECKOUT_BUILD_DATE={}",
        Utc::now().format("%Y-%m-%d")
    );
    println!("cargo:rerun-if-changed=.git/HEAD");
}
