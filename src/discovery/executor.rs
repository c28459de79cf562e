//! Query execution capability.
//!
//! The orchestrator never talks to a database itself. It hands each query to
//! a [`QueryExecutor`], which reports success, an index-required failure
//! (carrying the backend message, usually with a console link), or some other
//! failure. Two executors ship with the crate: [`ReplayExecutor`] for canned
//! outcomes and [`CommandExecutor`] for delegating to an external program.

use crate::query::QueryParams;
use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

// gRPC FAILED_PRECONDITION, which the backend uses for missing indexes.
const FAILED_PRECONDITION: i64 = 9;

/// One query to run.
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    pub collection: &'a str,
    pub query_name: &'a str,
    pub params: &'a QueryParams,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailure {
    #[error("query requires a composite index: {message}")]
    IndexRequired { message: String },
    #[error("{message}")]
    Other { message: String },
}

impl ExecutionFailure {
    pub fn message(&self) -> &str {
        match self {
            ExecutionFailure::IndexRequired { message } | ExecutionFailure::Other { message } => {
                message
            }
        }
    }

    pub fn is_index_required(&self) -> bool {
        matches!(self, ExecutionFailure::IndexRequired { .. })
    }
}

pub trait QueryExecutor {
    /// Run one query, waiting for its outcome.
    fn execute(&mut self, request: &QueryRequest<'_>) -> Result<(), ExecutionFailure>;
}

/// Classify a raw backend error the way the query layer reports it.
///
/// A FAILED_PRECONDITION code or a message that names a missing index is
/// index-required; anything else is a genuine failure.
pub fn classify_backend_error(code: Option<i64>, message: &str) -> ExecutionFailure {
    let lowered = message.to_ascii_lowercase();
    let index_required = code == Some(FAILED_PRECONDITION)
        || lowered.contains("requires an index")
        || lowered.contains("firestoreindexerror");
    if index_required {
        ExecutionFailure::IndexRequired {
            message: message.to_string(),
        }
    } else {
        ExecutionFailure::Other {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
/// Outcome record shared by replay files and command output.
pub enum RecordedOutcome {
    Ok,
    IndexRequired {
        #[serde(default)]
        message: String,
    },
    Error {
        #[serde(default)]
        message: String,
        #[serde(default)]
        code: Option<i64>,
    },
}

impl RecordedOutcome {
    fn into_result(self) -> Result<(), ExecutionFailure> {
        match self {
            RecordedOutcome::Ok => Ok(()),
            RecordedOutcome::IndexRequired { message } => {
                Err(ExecutionFailure::IndexRequired { message })
            }
            RecordedOutcome::Error { message, code } => Err(classify_backend_error(code, &message)),
        }
    }
}

/// Canned outcomes keyed by collection, then query name. Queries without a
/// recorded outcome succeed.
#[derive(Debug, Clone, Default)]
pub struct ReplayExecutor {
    outcomes: BTreeMap<String, BTreeMap<String, RecordedOutcome>>,
    calls: Vec<(String, String)>,
}

impl ReplayExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening replay file {}", path.display()))?;
        let value: Value = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing replay file {}", path.display()))?;
        Self::from_value(value).with_context(|| format!("decoding replay file {}", path.display()))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let outcomes: BTreeMap<String, BTreeMap<String, RecordedOutcome>> =
            serde_json::from_value(value)?;
        Ok(Self {
            outcomes,
            calls: Vec::new(),
        })
    }

    pub fn with_outcome(
        mut self,
        collection: &str,
        query_name: &str,
        outcome: RecordedOutcome,
    ) -> Self {
        self.outcomes
            .entry(collection.to_string())
            .or_default()
            .insert(query_name.to_string(), outcome);
        self
    }

    /// `(collection, query)` pairs in the order they were executed.
    pub fn calls(&self) -> &[(String, String)] {
        &self.calls
    }
}

impl QueryExecutor for ReplayExecutor {
    fn execute(&mut self, request: &QueryRequest<'_>) -> Result<(), ExecutionFailure> {
        self.calls
            .push((request.collection.to_string(), request.query_name.to_string()));
        match self
            .outcomes
            .get(request.collection)
            .and_then(|queries| queries.get(request.query_name))
        {
            Some(outcome) => outcome.clone().into_result(),
            None => Ok(()),
        }
    }
}

/// Delegates each query to an external program.
///
/// The program receives `<collection> <limit>` as arguments and the params
/// object as JSON on stdin, and must print one outcome object on stdout.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: PathBuf,
}

impl CommandExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, request: &QueryRequest<'_>) -> Result<RecordedOutcome> {
        let mut child = Command::new(&self.program)
            .arg(request.collection)
            .arg(request.limit.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute {}", self.program.display()))?;

        let body = serde_json::to_vec(request.params)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&body)
                .with_context(|| format!("writing params to {}", self.program.display()))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("waiting for {}", self.program.display()))?;
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with code {code}: {}",
                self.program.display(),
                stderr.trim()
            );
        }
        serde_json::from_slice(&output.stdout).with_context(|| {
            format!(
                "failed to parse outcome from {} for {}/{}",
                self.program.display(),
                request.collection,
                request.query_name
            )
        })
    }
}

impl QueryExecutor for CommandExecutor {
    fn execute(&mut self, request: &QueryRequest<'_>) -> Result<(), ExecutionFailure> {
        debug!(
            "running {} for {}/{}",
            self.program.display(),
            request.collection,
            request.query_name
        );
        match self.run(request) {
            Ok(outcome) => outcome.into_result(),
            Err(err) => Err(ExecutionFailure::Other {
                message: format!("{err:#}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn request<'a>(collection: &'a str, query_name: &'a str, params: &'a QueryParams) -> QueryRequest<'a> {
        QueryRequest {
            collection,
            query_name,
            params,
            limit: 1,
        }
    }

    #[test]
    fn backend_heuristic_matches_index_messages() {
        assert!(classify_backend_error(Some(9), "FAILED_PRECONDITION").is_index_required());
        assert!(
            classify_backend_error(None, "The query requires an index. You can create it here")
                .is_index_required()
        );
        assert!(classify_backend_error(None, "FirestoreIndexError: missing").is_index_required());
        let other = classify_backend_error(Some(7), "PERMISSION_DENIED");
        assert_eq!(
            other,
            ExecutionFailure::Other {
                message: "PERMISSION_DENIED".into()
            }
        );
    }

    #[test]
    fn replay_returns_recorded_outcomes_and_defaults_to_success() {
        let mut executor = ReplayExecutor::from_value(json!({
            "orders": {
                "by_status": {"status": "index_required", "message": "needs index"},
                "broken": {"status": "error", "message": "PERMISSION_DENIED", "code": 7},
                "fine": {"status": "ok"}
            }
        }))
        .unwrap();
        let params = Map::new();

        assert_eq!(
            executor.execute(&request("orders", "by_status", &params)),
            Err(ExecutionFailure::IndexRequired {
                message: "needs index".into()
            })
        );
        assert!(matches!(
            executor.execute(&request("orders", "broken", &params)),
            Err(ExecutionFailure::Other { .. })
        ));
        assert_eq!(executor.execute(&request("orders", "fine", &params)), Ok(()));
        assert_eq!(executor.execute(&request("members", "anything", &params)), Ok(()));
        assert_eq!(executor.calls().len(), 4);
        assert_eq!(executor.calls()[0], ("orders".to_string(), "by_status".to_string()));
    }

    #[test]
    fn replay_error_with_index_code_is_index_required() {
        let mut executor = ReplayExecutor::new().with_outcome(
            "orders",
            "q",
            RecordedOutcome::Error {
                message: "9 FAILED_PRECONDITION".into(),
                code: Some(9),
            },
        );
        let params = Map::new();
        assert!(
            executor
                .execute(&request("orders", "q", &params))
                .unwrap_err()
                .is_index_required()
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(ReplayExecutor::from_value(json!({"orders": {"q": {"status": "maybe"}}})).is_err());
    }

    #[test]
    fn missing_program_is_an_other_failure() {
        let mut executor = CommandExecutor::new("/nonexistent/indexsmith-executor");
        let params = Map::new();
        let failure = executor
            .execute(&request("orders", "q", &params))
            .unwrap_err();
        assert!(!failure.is_index_required());
        assert!(failure.message().contains("failed to execute"));
    }
}
