use std::env;
use std::path::PathBuf;

// Bakes a fallback project root into the binaries so they work from any cwd
// inside a checkout of this repository.
fn main() {
    println!("cargo:rerun-if-env-changed=INDEXSMITH_ROOT_HINT");
    println!("cargo:rerun-if-changed=schema");

    let Some(raw_hint) = env::var("INDEXSMITH_ROOT_HINT")
        .ok()
        .or_else(|| env::var("CARGO_MANIFEST_DIR").ok())
    else {
        return;
    };

    let candidate = PathBuf::from(raw_hint);
    if !candidate.join("indexsmith.json").is_file() {
        return;
    }
    let canonical = candidate.canonicalize().unwrap_or(candidate);
    println!(
        "cargo:rustc-env=INDEXSMITH_ROOT_HINT={}",
        canonical.display()
    );
}
