//! Runs in its own binary: it changes the process working directory.
#![cfg(unix)]

use std::{env, fs, os::unix::fs::PermissionsExt, time::Duration};

use secure_env_vars::{
    config::Config, execution::local::LocalExecutor, Dispatcher, InvocationRequest,
    StaticSecretProvider,
};

#[tokio::test]
async fn bare_script_name_runs_from_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("deploy");
    fs::write(&script, "#!/bin/sh\necho \"deployed $foo\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let previous = env::current_dir().unwrap();
    env::set_current_dir(dir.path()).unwrap();

    let exec = LocalExecutor::from_config(&Config::default())
        .with_modulepath(Vec::new())
        .with_timeout(Duration::from_secs(10));
    let d = Dispatcher::new(exec, StaticSecretProvider::raw(r#"{"foo":"bar"}"#));
    let outcome = d.run(&InvocationRequest::new(["localhost"]).script("deploy")).await;

    env::set_current_dir(previous).unwrap();
    let result = outcome.unwrap();
    assert_eq!(result.results[0].stdout, "deployed bar\n");
}
