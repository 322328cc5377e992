//! Execution primitives: the run-command / run-script contract and result types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::secrets::SecureEnvMap;

pub mod local;

/// Name of the concealed parameter carrying the secure payload. The leading
/// underscore keeps it out of the user-visible parameter namespace.
pub const CONCEALED_PARAM: &str = "_env_vars";

/// Parameters handed to a primitive. Only the concealed payload exists here;
/// it is structured data and is never spliced into a command or script body.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    #[serde(rename = "_env_vars")]
    pub env_vars: SecureEnvMap,
}

impl Params {
    pub fn concealed(env_vars: SecureEnvMap) -> Self {
        Self { env_vars }
    }
}

impl std::fmt::Debug for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Params").field(CONCEALED_PARAM, &self.env_vars).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    pub target: String,
    pub status: TargetStatus,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TargetResult {
    pub fn success(target: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: TargetStatus::Success,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            message: None,
        }
    }

    pub fn failure(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: TargetStatus::Failure,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            message: Some(message.into()),
        }
    }

    pub fn ok(&self) -> bool {
        self.status == TargetStatus::Success
    }
}

/// Per-target outcomes, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub results: Vec<TargetResult>,
}

impl ExecutionResult {
    pub fn new(results: Vec<TargetResult>) -> Self {
        Self { results }
    }

    pub fn ok(&self) -> bool {
        self.results.iter().all(TargetResult::ok)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetResult> {
        self.results.iter().filter(|r| !r.ok())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{} of {} targets failed", .0.failures().count(), .0.len())]
    Failed(ExecutionResult),
    #[error("script not found: {0}")]
    ScriptNotFound(String),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The two primitives supplied by the host runtime.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run_command(
        &self,
        command: &str,
        targets: &[String],
        params: Params,
    ) -> Result<ExecutionResult, ExecutionError>;

    async fn run_script(
        &self,
        script: &str,
        targets: &[String],
        params: Params,
    ) -> Result<ExecutionResult, ExecutionError>;
}
