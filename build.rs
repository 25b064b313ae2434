// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packaging builds may pin the version from outside
    let version = std::env::var("VCAM_VERSION").unwrap_or_else(|_| git_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Version string from `git describe`, falling back to the crate version
/// plus commit hash, or to the crate version alone outside a checkout
fn git_version() -> String {
    let cargo_version = env!("CARGO_PKG_VERSION");

    let describe = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty", "--match", "v*"])
        .output();

    match describe {
        Ok(output) if output.status.success() => {
            let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let described = described.strip_prefix('v').unwrap_or(&described);
            if described.is_empty() {
                cargo_version.to_string()
            } else if described.chars().all(|c| c.is_ascii_hexdigit()) {
                // No tag reachable: describe printed a bare commit hash
                format!("{}-{}", cargo_version, described)
            } else {
                described.to_string()
            }
        }
        _ => cargo_version.to_string(),
    }
}
