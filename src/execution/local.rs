//! Local execution primitive: runs commands and scripts on `localhost`.
//!
//! Other targets need a transport this crate does not provide; they are
//! reported as failed targets rather than aborting the whole run.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};
use tracing::{debug, warn};

use super::{ExecutionError, ExecutionResult, Executor, Params, TargetResult, TargetStatus};
use crate::config::Config;

const LOCAL_TARGETS: &[&str] = &["localhost", "local://localhost", "127.0.0.1"];

pub fn is_local_target(target: &str) -> bool {
    LOCAL_TARGETS.iter().any(|t| t.eq_ignore_ascii_case(target))
}

#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell_name: Option<String>,
    timeout: Option<Duration>,
    modulepath: Vec<PathBuf>,
}

impl LocalExecutor {
    pub fn from_config(cfg: &Config) -> Self {
        let shell_name = cfg.get("SHELL_NAME").filter(|v| v != "auto");
        Self {
            shell_name,
            // COMMAND_TIMEOUT=0 waits without a limit.
            timeout: match cfg.get_u64("COMMAND_TIMEOUT") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => Some(Duration::from_secs(60)),
            },
            modulepath: cfg.modulepath(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell_name = Some(shell.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_modulepath(mut self, modulepath: Vec<PathBuf>) -> Self {
        self.modulepath = modulepath;
        self
    }

    /// Locate a script: an existing path wins, otherwise `module/file` is
    /// looked up as `<modulepath>/<module>/files/<file>`. The result is
    /// absolute, so a bare name is never searched for on `PATH`.
    pub fn resolve_script(&self, script: &str) -> Option<PathBuf> {
        let direct = Path::new(script);
        let found = if direct.is_file() {
            Some(direct.to_path_buf())
        } else {
            let (module, file) = script.split_once('/')?;
            if module.is_empty() || file.is_empty() {
                return None;
            }
            self.modulepath
                .iter()
                .map(|dir| dir.join(module).join("files").join(file))
                .find(|p| p.is_file())
        };
        found.map(|p| std::path::absolute(&p).unwrap_or(p))
    }

    fn shell_command(&self, cmd: &str) -> Command {
        let override_shell = self
            .shell_name
            .clone()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if cfg!(windows) {
            let prefer_ps = if override_shell.contains("powershell") || override_shell.contains("pwsh") {
                true
            } else if override_shell.contains("cmd") {
                false
            } else {
                !std::env::var("PSModulePath").unwrap_or_default().is_empty()
            };
            if prefer_ps {
                let mut c = Command::new("powershell.exe");
                c.args(["-NoLogo", "-NoProfile", "-Command", cmd]);
                c
            } else {
                let mut c = Command::new("cmd.exe");
                c.args(["/c", cmd]);
                c
            }
        } else {
            let shell = self
                .shell_name
                .clone()
                .or_else(|| std::env::var("SHELL").ok())
                .unwrap_or_else(|| "/bin/sh".into());
            let mut c = Command::new(shell);
            c.arg("-c").arg(cmd);
            c
        }
    }

    fn script_command(&self, path: &Path) -> Command {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let interpreter: Option<(&str, &[&str])> = match ext.as_str() {
            "sh" => Some(("sh", &[])),
            "py" => Some(("python3", &[])),
            "rb" => Some(("ruby", &[])),
            "ps1" => Some(("powershell.exe", &["-NoLogo", "-NoProfile", "-File"])),
            _ => None,
        };
        match interpreter {
            Some((program, args)) => {
                let mut c = Command::new(program);
                c.args(args).arg(path);
                c
            }
            None => Command::new(path),
        }
    }

    async fn run_each<F>(&self, targets: &[String], params: &Params, build: F) -> Result<ExecutionResult, ExecutionError>
    where
        F: Fn() -> Command,
    {
        let env_problem = check_env(params).err();
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            if !is_local_target(target) {
                warn!(host = %target, "no transport available");
                results.push(TargetResult::failure(
                    target.as_str(),
                    format!("no transport available for target '{}'", target),
                ));
                continue;
            }
            if let Some(problem) = &env_problem {
                results.push(TargetResult::failure(target.as_str(), problem.clone()));
                continue;
            }
            let mut cmd = build();
            for (k, v) in params.env_vars.env_pairs() {
                cmd.env(k, v);
            }
            let result = match self.run_one(target, cmd).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(host = %target, error = %e, "local run failed");
                    TargetResult::failure(target.as_str(), e.to_string())
                }
            };
            results.push(result);
        }
        let result = ExecutionResult::new(results);
        if result.ok() {
            Ok(result)
        } else {
            Err(ExecutionError::Failed(result))
        }
    }

    async fn run_one(&self, target: &str, mut cmd: Command) -> Result<TargetResult, ExecutionError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        let child = cmd
            .spawn()
            .map_err(|source| ExecutionError::Spawn { program, source })?;

        let waited = match self.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    return Ok(TargetResult::failure(
                        target,
                        format!("timed out after {}s", limit.as_secs()),
                    ))
                }
            },
            None => child.wait_with_output().await,
        };
        let out = waited.map_err(|e| ExecutionError::Other(e.into()))?;

        let code = out.status.code();
        debug!(host = %target, ?code, "local run finished");
        let status = if out.status.success() {
            TargetStatus::Success
        } else {
            TargetStatus::Failure
        };
        Ok(TargetResult {
            target: target.to_string(),
            status,
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            exit_code: code,
            message: match (status, code) {
                (TargetStatus::Success, _) => None,
                (TargetStatus::Failure, Some(c)) => Some(format!("exited with code {}", c)),
                (TargetStatus::Failure, None) => Some("terminated by signal".to_string()),
            },
        })
    }
}

/// Reject names and values the OS would silently split or truncate. Messages
/// name the key only.
fn check_env(params: &Params) -> Result<(), String> {
    for (k, v) in params.env_vars.env_pairs() {
        if k.is_empty() {
            return Err("environment variable name is empty".to_string());
        }
        if k.contains('=') || k.contains('\0') {
            return Err(format!("invalid environment variable name '{}'", k.escape_debug()));
        }
        if v.contains('\0') {
            return Err(format!(
                "value of environment variable '{}' contains a NUL byte",
                k.escape_debug()
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn run_command(
        &self,
        command: &str,
        targets: &[String],
        params: Params,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.run_each(targets, &params, || self.shell_command(command)).await
    }

    async fn run_script(
        &self,
        script: &str,
        targets: &[String],
        params: Params,
    ) -> Result<ExecutionResult, ExecutionError> {
        let path = self
            .resolve_script(script)
            .ok_or_else(|| ExecutionError::ScriptNotFound(script.to_string()))?;
        debug!(script = %path.display(), "resolved script");
        self.run_each(targets, &params, || self.script_command(&path)).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use super::*;
    use crate::secrets::SecureEnvMap;

    fn executor() -> LocalExecutor {
        LocalExecutor::from_config(&Config::default())
            .with_shell("/bin/sh")
            .with_timeout(Duration::from_secs(10))
            .with_modulepath(Vec::new())
    }

    fn localhost() -> Vec<String> {
        vec!["localhost".to_string()]
    }

    #[test]
    fn recognises_local_targets() {
        assert!(is_local_target("localhost"));
        assert!(is_local_target("LOCALHOST"));
        assert!(is_local_target("local://localhost"));
        assert!(!is_local_target("web01.example.com"));
    }

    #[tokio::test]
    async fn exports_concealed_vars_into_child_env() {
        let env: SecureEnvMap = [("SEV_SECRET", "s3cr3t")].into_iter().collect();
        let result = executor()
            .run_command("printf '%s' \"$SEV_SECRET\"", &localhost(), Params::concealed(env))
            .await
            .unwrap();
        assert_eq!(result.results[0].stdout, "s3cr3t");
    }

    #[tokio::test]
    async fn nonzero_exit_fails_the_run() {
        let err = executor()
            .run_command("exit 3", &localhost(), Params::default())
            .await
            .unwrap_err();
        match err {
            ExecutionError::Failed(result) => {
                assert_eq!(result.results[0].exit_code, Some(3));
                assert_eq!(result.results[0].message.as_deref(), Some("exited with code 3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn remote_targets_fail_without_aborting_local_ones() {
        let targets = vec!["localhost".to_string(), "web01".to_string()];
        let err = executor()
            .run_command("echo hi", &targets, Params::default())
            .await
            .unwrap_err();
        let ExecutionError::Failed(result) = err else {
            panic!("expected per-target failure");
        };
        assert!(result.results[0].ok());
        assert_eq!(result.results[0].stdout, "hi\n");
        assert_eq!(
            result.results[1].message.as_deref(),
            Some("no transport available for target 'web01'")
        );
    }

    #[tokio::test]
    async fn resolves_module_script_through_modulepath() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("secure_env_vars").join("files");
        fs::create_dir_all(&files).unwrap();
        fs::write(files.join("hello.sh"), "printf 'hello %s' \"$WHO\"").unwrap();

        let exec = executor().with_modulepath(vec![dir.path().to_path_buf()]);
        let env: SecureEnvMap = [("WHO", "world")].into_iter().collect();
        let result = exec
            .run_script("secure_env_vars/hello.sh", &localhost(), Params::concealed(env))
            .await
            .unwrap();
        assert_eq!(result.results[0].stdout, "hello world");
    }

    #[tokio::test]
    async fn missing_script_is_reported() {
        let err = executor()
            .run_script("nope/missing.sh", &localhost(), Params::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ScriptNotFound(s) if s == "nope/missing.sh"));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let exec = executor().with_timeout(Duration::from_secs(1));
        let err = exec
            .run_command("sleep 5", &localhost(), Params::default())
            .await
            .unwrap_err();
        let ExecutionError::Failed(result) = err else {
            panic!("expected timeout failure");
        };
        assert_eq!(result.results[0].message.as_deref(), Some("timed out after 1s"));
    }

    #[tokio::test]
    async fn zero_timeout_waits_without_limit() {
        let mut cfg = Config::default();
        cfg.set("COMMAND_TIMEOUT", "0");
        let exec = LocalExecutor::from_config(&cfg).with_shell("/bin/sh");
        assert_eq!(exec.timeout, None);
        let result = exec
            .run_command("sleep 1; echo done", &localhost(), Params::default())
            .await
            .unwrap();
        assert_eq!(result.results[0].stdout, "done\n");
    }

    #[tokio::test]
    async fn env_names_with_equals_are_rejected() {
        let env: SecureEnvMap = [("X=Y", "z")].into_iter().collect();
        let err = executor()
            .run_command("printf '[%s]' \"$X\"", &localhost(), Params::concealed(env))
            .await
            .unwrap_err();
        let ExecutionError::Failed(result) = err else {
            panic!("expected per-target failure");
        };
        assert!(result.results[0].stdout.is_empty());
        assert_eq!(
            result.results[0].message.as_deref(),
            Some("invalid environment variable name 'X=Y'")
        );
    }

    #[tokio::test]
    async fn nul_in_value_keeps_every_target() {
        let env: SecureEnvMap = [("A", "x\u{0}secret")].into_iter().collect();
        let targets = vec!["web01".to_string(), "localhost".to_string()];
        let err = executor()
            .run_command("true", &targets, Params::concealed(env))
            .await
            .unwrap_err();
        let ExecutionError::Failed(result) = err else {
            panic!("expected per-target failure");
        };
        assert_eq!(result.len(), 2);
        assert_eq!(result.results[0].target, "web01");
        let msg = result.results[1].message.as_deref().unwrap();
        assert_eq!(msg, "value of environment variable 'A' contains a NUL byte");
        assert!(!msg.contains("secret"));
    }

    #[tokio::test]
    async fn spawn_failure_is_a_target_failure() {
        // No execute bit, so spawning the script directly fails.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("deploy");
        fs::write(&script, "#!/bin/sh\necho deployed\n").unwrap();

        let targets = vec!["localhost".to_string(), "web01".to_string()];
        let err = executor()
            .run_script(&script.to_string_lossy(), &targets, Params::default())
            .await
            .unwrap_err();
        let ExecutionError::Failed(result) = err else {
            panic!("expected per-target failure");
        };
        assert_eq!(result.len(), 2);
        assert!(result.results[0]
            .message
            .as_deref()
            .unwrap()
            .starts_with("failed to spawn"));
        assert_eq!(result.results[1].target, "web01");
    }

    #[test]
    fn resolved_scripts_are_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("mod").join("files");
        fs::create_dir_all(&files).unwrap();
        fs::write(files.join("run"), "").unwrap();
        let exec = executor().with_modulepath(vec![dir.path().to_path_buf()]);
        let path = exec.resolve_script("mod/run").unwrap();
        assert!(path.is_absolute());
        assert!(exec.resolve_script("mod/missing").is_none());
    }
}
