// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! External command execution
//!
//! Every side effect on the platform goes through a [`CommandExecutor`]. A
//! command that runs but exits non-zero is not an error here: the caller gets
//! the [`CommandResult`] and decides what the output means. Only failing to
//! start or wait for the process is reported as an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

/// A shell command plus the environment and directory it runs with
///
/// Environment values are held as secrets: passwords are handed to commands
/// this way so they never appear in the command line or in logs.
#[derive(Clone)]
pub struct CommandRequest {
    command: String,
    env: Vec<(String, SecretString)>,
    current_dir: Option<PathBuf>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: &str) -> Self {
        self.env.push((key.into(), SecretString::new(value.into())));
        self
    }

    pub fn secret_env(mut self, key: impl Into<String>, value: &SecretString) -> Self {
        self.env.push((key.into(), value.clone()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn env_vars(&self) -> &[(String, SecretString)] {
        &self.env
    }

    /// Value of an environment override, if set
    pub fn env_value(&self, key: &str) -> Option<&SecretString> {
        self.env.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

impl From<&str> for CommandRequest {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

impl From<String> for CommandRequest {
    fn from(command: String) -> Self {
        Self::new(command)
    }
}

impl fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandRequest")
            .field("command", &self.command)
            .field("env", &keys)
            .field("current_dir", &self.current_dir)
            .finish()
    }
}

/// Output and exit status of one command
#[must_use = "inspect the exit status or output, or discard it explicitly"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn success_with(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn failure_with(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn output(&self) -> &str {
        &self.stdout
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }

    /// Log a warning when the command did not succeed.
    pub fn warn_on_failure(&self, what: &str) {
        if !self.success() {
            warn!(
                "{} exited with {:?}: {}",
                what,
                self.exit_code,
                self.combined().trim()
            );
        }
    }
}

/// Runs shell commands on behalf of the harness
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: CommandRequest) -> Result<CommandResult>;
}

/// A sequence of commands run one after another through the same executor
///
/// ```ignore
/// let last = Execution::start(executor, "cf create-user ...")
///     .await?
///     .then("cf set-space-role ...")
///     .await?
///     .into_result();
/// ```
pub struct Execution<'a> {
    executor: &'a dyn CommandExecutor,
    results: Vec<CommandResult>,
}

impl<'a> Execution<'a> {
    pub async fn start(
        executor: &'a dyn CommandExecutor,
        request: impl Into<CommandRequest>,
    ) -> Result<Execution<'a>> {
        let result = executor.execute(request.into()).await?;
        Ok(Self {
            executor,
            results: vec![result],
        })
    }

    /// Run the next command regardless of how the previous one exited.
    pub async fn then(mut self, request: impl Into<CommandRequest>) -> Result<Execution<'a>> {
        let result = self.executor.execute(request.into()).await?;
        self.results.push(result);
        Ok(self)
    }

    /// Result of the most recent command
    pub fn result(&self) -> &CommandResult {
        self.results
            .last()
            .expect("an execution always holds at least one result")
    }

    pub fn results(&self) -> &[CommandResult] {
        &self.results
    }

    pub fn success(&self) -> bool {
        self.results.iter().all(CommandResult::success)
    }

    pub fn into_results(self) -> Vec<CommandResult> {
        self.results
    }
}

/// Executor that runs commands through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellSession {
    base_dir: PathBuf,
    shell: String,
}

impl ShellSession {
    /// Run commands from `base_dir` unless a request names its own directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            shell: "sh".to_string(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[async_trait]
impl CommandExecutor for ShellSession {
    async fn execute(&self, request: CommandRequest) -> Result<CommandResult> {
        let dir = match request.dir() {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.clone(),
        };
        debug!("Executing `{}` in {}", request.command(), dir.display());

        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg("-c")
            .arg(request.command())
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in request.env_vars() {
            cmd.env(key, value.expose_secret());
        }

        let output = cmd.output().await.with_context(|| {
            format!(
                "Failed to run `{}` in {}",
                request.command(),
                dir.display()
            )
        })?;

        let result = CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        debug!("`{}` exited with {:?}", request.command(), result.exit_code);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_request_debug_hides_env_values() {
        let request = CommandRequest::new("cf auth 'admin'").env("CF_PASSWORD", "hunter2");
        let rendered = format!("{:?}", request);
        assert!(rendered.contains("CF_PASSWORD"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(
            request.env_value("CF_PASSWORD").unwrap().expose_secret(),
            "hunter2"
        );
    }

    #[test]
    fn test_combined_output() {
        let both = CommandResult {
            stdout: "out\n".to_string(),
            stderr: "err".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(both.combined(), "out\nerr");
        assert!(!both.success());
        assert_eq!(CommandResult::success_with("ok").combined(), "ok");
        assert_eq!(CommandResult::failure_with("bad", 2).combined(), "bad");
    }

    #[test_log::test(tokio::test)]
    async fn test_shell_session_captures_output() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let shell = ShellSession::new(temp_dir.path());

        let result = shell
            .execute(CommandRequest::new("echo hello; echo oops >&2"))
            .await?;
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr.trim(), "oops");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_non_zero_exit_is_not_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let shell = ShellSession::new(temp_dir.path());

        let result = shell.execute("exit 3".into()).await?;
        assert_eq!(result.exit_code, Some(3));
        assert!(!result.success());
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_env_and_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        std::fs::create_dir(temp_dir.path().join("apps"))?;
        std::fs::write(temp_dir.path().join("apps/marker"), "present")?;
        let shell = ShellSession::new(temp_dir.path());

        let result = shell
            .execute(
                CommandRequest::new("printf '%s:' \"$SECRET_VALUE\"; cat marker")
                    .env("SECRET_VALUE", "s3cr3t")
                    .current_dir("apps"),
            )
            .await?;
        assert_eq!(result.stdout, "s3cr3t:present");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_execution_chain_runs_every_step() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let shell = ShellSession::new(temp_dir.path());

        let execution = Execution::start(&shell, "echo one > file")
            .await?
            .then("false")
            .await?
            .then("cat file")
            .await?;

        assert_eq!(execution.results().len(), 3);
        assert!(!execution.success());
        assert_eq!(execution.result().stdout.trim(), "one");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let shell = ShellSession::new("/nonexistent/buildpack-ci");
        assert!(shell.execute("true".into()).await.is_err());
    }
}
