//! Validated tool invocation.
//!
//! Commands are spawned directly with a program and argument list. There is
//! no shell anywhere on this path, and nothing reaches the spawn call
//! without passing [`make_safe`] first.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::command::{make_safe, validate, Rejection, SafeCommand};

/// Output longer than this is truncated.
const MAX_OUTPUT_CHARS: usize = 10_000;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Command rejected: {0}")]
    Rejected(Rejection),

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Sanitize tool output for display.
/// Removes binary garbage while preserving valid text.
fn sanitize_output(bytes: &[u8]) -> String {
    let non_printable_count = bytes
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();

    // More than 10% non-printable (excluding newlines/tabs) is treated as binary
    if bytes.len() > 100 && non_printable_count > bytes.len() / 10 {
        return format!(
            "[Binary output detected - {} bytes, {}% non-printable]",
            bytes.len(),
            non_printable_count * 100 / bytes.len()
        );
    }

    let text: String = String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c == '\n' || c == '\r' || c == '\t' || (c >= ' ' && c != '\u{FFFD}'))
        .collect();

    if text.chars().count() > MAX_OUTPUT_CHARS {
        let mut truncated: String = text.chars().take(MAX_OUTPUT_CHARS).collect();
        truncated.push_str("\n... [output truncated]");
        truncated
    } else {
        text
    }
}

/// Runs external tools after validation, with a timeout and explicit environment.
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    timeout: Duration,
    cwd: Option<PathBuf>,
}

impl ToolInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, cwd: None }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Validate `command_line` and run it.
    ///
    /// `envs` are added to the child's environment only; the current process
    /// environment is not modified.
    pub async fn run(
        &self,
        command_line: &str,
        envs: &[(String, String)],
    ) -> Result<ToolOutput, InvokeError> {
        let Some(safe) = make_safe(command_line) else {
            let rejection = validate(command_line).error.unwrap_or(Rejection::Empty);
            return Err(InvokeError::Rejected(rejection));
        };
        self.run_safe(&safe, envs).await
    }

    /// Run a command that already passed validation.
    pub async fn run_safe(
        &self,
        command: &SafeCommand,
        envs: &[(String, String)],
    ) -> Result<ToolOutput, InvokeError> {
        let timeout_secs = self.timeout.as_secs();
        tracing::info!(
            "Executing {} with {} argument(s)",
            command.program(),
            command.args().len()
        );

        let mut child = Command::new(command.program());
        child
            .args(command.args())
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            child.current_dir(cwd);
        }

        let output = match tokio::time::timeout(self.timeout, child.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                tracing::error!("Command execution failed: {}", source);
                return Err(InvokeError::Spawn {
                    program: command.program().to_string(),
                    source,
                });
            }
            Err(_) => {
                tracing::error!("Command timed out after {} seconds", timeout_secs);
                return Err(InvokeError::Timeout(timeout_secs));
            }
        };

        let result = ToolOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: sanitize_output(&output.stdout),
            stderr: sanitize_output(&output.stderr),
        };

        tracing::debug!(
            "Command completed: exit={}, stdout_len={}, stderr_len={}",
            result.exit_code,
            result.stdout.len(),
            result.stderr.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_output(b"ok\x07\n"), "ok\n");
        let binary = vec![0u8; 200];
        assert!(sanitize_output(&binary).starts_with("[Binary output detected"));
    }

    #[tokio::test]
    async fn test_rejects_before_spawning() {
        let invoker = ToolInvoker::new(Duration::from_secs(5));
        let err = invoker.run("echo hi; id", &[]).await.unwrap_err();
        assert!(matches!(err, InvokeError::Rejected(Rejection::InvalidCharacters(_))));

        let err = invoker.run("   ", &[]).await.unwrap_err();
        assert!(matches!(err, InvokeError::Rejected(Rejection::Empty)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_without_a_shell() {
        let invoker = ToolInvoker::new(Duration::from_secs(5));
        let output = invoker.run("echo hello world", &[]).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello world\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_passes_credentials_to_child_only() {
        let invoker = ToolInvoker::new(Duration::from_secs(5));
        let envs = vec![(
            "CPA_INVOKE_TEST_ONLY_CHILD".to_string(),
            "child-value".to_string(),
        )];
        let output = invoker.run("env", &envs).await.unwrap();
        assert!(output.stdout.contains("CPA_INVOKE_TEST_ONLY_CHILD=child-value"));
        assert!(std::env::var("CPA_INVOKE_TEST_ONLY_CHILD").is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let invoker = ToolInvoker::new(Duration::from_secs(5));
        let err = invoker
            .run("cpa-definitely-not-installed-tool", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Spawn { .. }));
    }
}
