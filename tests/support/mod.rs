use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const ADMINS_LINK: &str = "https://console.firebase.google.com/u/0/project/liang-dev/firestore/databases/firestore-demo-api/indexes?create_composite=ClFwcm9qZWN0cy9saWFuZy1kZXYvZGF0YWJhc2VzL2ZpcmVzdG9yZS1kZW1vLWFwaS9jb2xsZWN0aW9uR3JvdXBzL2FkbWlucy9pbmRleGVzL18QARoNCglkZWxldGVkQXQQARoMCghpc0FjdGl2ZRABGg0KCWNyZWF0ZWRBdBACGgwKCF9fbmFtZV9fEAI";

pub fn helper_binary(name: &str) -> PathBuf {
    let path = match name {
        "index-discover" => env!("CARGO_BIN_EXE_index-discover"),
        "index-link" => env!("CARGO_BIN_EXE_index-link"),
        "index-synth" => env!("CARGO_BIN_EXE_index-synth"),
        "index-update" => env!("CARGO_BIN_EXE_index-update"),
        other => panic!("unknown helper {other}"),
    };
    PathBuf::from(path)
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("writing {}", path.display()))
}

pub fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Scratch project with an `indexsmith.json` covering orders and admins.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        write_json(&dir.path().join("indexsmith.json"), &project_config())?;
        Ok(Self { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config(&self) -> PathBuf {
        self.path("indexsmith.json")
    }

    pub fn catalog(&self) -> PathBuf {
        self.path("firestore.indexes.json")
    }

    pub fn report(&self) -> PathBuf {
        self.path("missing-indexes.json")
    }

    /// Command for `helper` running inside the project.
    pub fn command(&self, helper: &str) -> Command {
        let mut cmd = Command::new(helper_binary(helper));
        cmd.current_dir(self.dir.path())
            .env("INDEXSMITH_ROOT", self.dir.path())
            .env("RUST_LOG", "warn");
        cmd
    }
}

pub fn project_config() -> Value {
    json!({
        "schema_version": "indexsmith_config_v1",
        "collections": [
            {
                "collection": "orders",
                "classification": {
                    "equality": ["memberId", "status"],
                    "range": [
                        {"param": "minAmount", "field": "totalAmount"},
                        {"param": "maxAmount", "field": "totalAmount"}
                    ],
                    "orderBy": {},
                    "ignored": ["limit", "cursor"]
                },
                "queries": [
                    {"name": "default_sort", "params": {}},
                    {"name": "by_status", "params": {"status": "pending"}},
                    {"name": "amount_range", "params": {"minAmount": 100, "maxAmount": 500}},
                    {"name": "forbidden", "params": {"memberId": "m1"}}
                ]
            },
            {
                "collection": "admins",
                "classification": {
                    "equality": ["isActive"],
                    "range": [],
                    "orderBy": {},
                    "ignored": ["limit", "cursor"],
                    "implicitEquality": [{"field": "deletedAt", "unlessParam": "includeDeleted"}]
                },
                "queries": [
                    {"name": "active_only", "params": {"isActive": true}}
                ]
            }
        ]
    })
}

/// Replay outcomes matching `project_config`: two missing indexes, one
/// permission failure, everything else succeeds.
pub fn replay_outcomes() -> Value {
    json!({
        "orders": {
            "by_status": {"status": "index_required", "message": "The query requires an index."},
            "forbidden": {"status": "error", "message": "7 PERMISSION_DENIED", "code": 7}
        },
        "admins": {
            "active_only": {
                "status": "error",
                "code": 9,
                "message": format!("9 FAILED_PRECONDITION: The query requires an index. You can create it here: {ADMINS_LINK}")
            }
        }
    })
}
