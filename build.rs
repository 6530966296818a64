use std::env;
use std::process::Command;

// Stamps `--version` as `<pkg>+<os>-<arch>[.<sha>]`.
fn main() {
    for watched in [".git/HEAD", ".git/index"] {
        println!("cargo:rerun-if-changed={watched}");
    }

    let var = |name: &str, fallback: &str| env::var(name).unwrap_or_else(|_| fallback.to_string());
    let mut version = format!(
        "{}+{}-{}",
        var("CARGO_PKG_VERSION", "0.0.0"),
        var("CARGO_CFG_TARGET_OS", "unknown-os"),
        var("CARGO_CFG_TARGET_ARCH", "unknown-arch"),
    );
    if let Some(sha) = head_commit() {
        version.push('.');
        version.push_str(&sha);
    }

    println!("cargo:rustc-env=CLIHUNTER_BUILD_VERSION={version}");
}

fn head_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let sha = String::from_utf8(output.stdout).ok()?;
    let sha = sha.trim();
    (!sha.is_empty()).then(|| sha.to_string())
}
