//! Build script: embeds version information into the binary.

use std::process::Command;

fn main() {
    // Prefer RHC_VERSION env var if set (e.g., by the RPM build),
    // otherwise fall back to git describe for local development builds.
    if let Ok(version) = std::env::var("RHC_VERSION") {
        println!("cargo:rustc-env=RHC_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=RHC_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=RHC_VERSION");
}
