//! Validation and dispatch: turn an invocation request into exactly one
//! delegated run-command or run-script call carrying the secure payload.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::Error,
    execution::{ExecutionError, ExecutionResult, Executor, Params},
    secrets::{EnvParseError, SecretProvider, SecureEnvMap},
};

/// Name used in user-facing messages.
pub const ACTION_NAME: &str = "secure_env_vars";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub targets: Vec<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

impl InvocationRequest {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { targets: targets.into_iter().map(Into::into).collect(), command: None, script: None }
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }
}

/// A validated request: exactly one of command or script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Command(String),
    Script(String),
}

impl Mode {
    pub fn kind(&self) -> &'static str {
        match self {
            Mode::Command(_) => "command",
            Mode::Script(_) => "script",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Cannot specify both script and command for secure_env_vars")]
    BothSpecified,
    #[error("Must specify either script or command for secure_env_vars")]
    NeitherSpecified,
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

pub struct Dispatcher<E, P> {
    executor: E,
    secrets: P,
}

impl<E: Executor, P: SecretProvider> Dispatcher<E, P> {
    pub fn new(executor: E, secrets: P) -> Self {
        Self { executor, secrets }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn validate(request: &InvocationRequest) -> Result<Mode, ValidationError> {
        match (present(&request.command), present(&request.script)) {
            (Some(_), Some(_)) => Err(ValidationError::BothSpecified),
            (None, None) => Err(ValidationError::NeitherSpecified),
            (Some(cmd), None) => Ok(Mode::Command(cmd.to_string())),
            (None, Some(script)) => Ok(Mode::Script(script.to_string())),
        }
    }

    pub fn load_secure_env(&self) -> Result<SecureEnvMap, EnvParseError> {
        self.secrets.load()
    }

    /// Exactly one delegated call; the primitive's outcome is returned as-is.
    pub async fn dispatch(
        &self,
        mode: &Mode,
        targets: &[String],
        secure_env: SecureEnvMap,
    ) -> Result<ExecutionResult, ExecutionError> {
        let params = Params::concealed(secure_env);
        match mode {
            Mode::Command(cmd) => self.executor.run_command(cmd, targets, params).await,
            Mode::Script(path) => self.executor.run_script(path, targets, params).await,
        }
    }

    /// Validate, load the payload, then dispatch. Validation runs first so a
    /// rejected request reads nothing from the environment.
    pub async fn run(&self, request: &InvocationRequest) -> Result<ExecutionResult, Error> {
        let mode = Self::validate(request)?;
        debug!(mode = mode.kind(), targets = request.targets.len(), "validated request");
        if let Mode::Command(cmd) = &mode {
            debug!(command = %cmd, "dispatching command");
        }

        let secure_env = self.load_secure_env()?;
        info!(keys = secure_env.len(), "forwarding secure environment");

        self.dispatch(&mode, &request.targets, secure_env)
            .await
            .map_err(|e| {
                warn!(error = %e, "{} failed", ACTION_NAME);
                Error::Execution(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type D = Dispatcher<crate::execution::local::LocalExecutor, crate::secrets::StaticSecretProvider>;

    #[test]
    fn both_is_rejected() {
        let req = InvocationRequest::new(["localhost"]).command("whoami").script("foo");
        assert_eq!(D::validate(&req), Err(ValidationError::BothSpecified));
    }

    #[test]
    fn neither_is_rejected() {
        let req = InvocationRequest::new(["localhost"]);
        assert_eq!(D::validate(&req), Err(ValidationError::NeitherSpecified));
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let req = InvocationRequest::new(["localhost"]).command("").script("run.sh");
        assert_eq!(D::validate(&req), Ok(Mode::Script("run.sh".into())));
        let req = InvocationRequest::new(["localhost"]).command("").script("");
        assert_eq!(D::validate(&req), Err(ValidationError::NeitherSpecified));
    }

    #[test]
    fn single_input_selects_mode() {
        let req = InvocationRequest::new(["localhost"]).command("whoami");
        assert_eq!(D::validate(&req), Ok(Mode::Command("whoami".into())));
    }

    #[test]
    fn messages_match_action_name() {
        assert!(ValidationError::BothSpecified.to_string().ends_with(ACTION_NAME));
        assert!(ValidationError::NeitherSpecified.to_string().ends_with(ACTION_NAME));
    }
}
