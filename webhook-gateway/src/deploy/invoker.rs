//! Deploy executable runner.
//!
//! The configured executable is started with no arguments, no shell and a
//! null stdin. Nothing from the inbound request ever reaches the command
//! line or the environment of the child.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::types::DeployOutcome;
use crate::Config;

/// Runs a deploy and reports how it went.
///
/// Implementations must not retry; every call corresponds to at most one run
/// of the deploy executable.
#[async_trait]
pub trait DeployInvoker: Send + Sync + 'static {
    async fn invoke(&self) -> DeployOutcome;
}

/// Invoker backed by the configured deploy script.
#[derive(Debug, Clone)]
pub struct ScriptInvoker {
    command_path: PathBuf,
    timeout: Duration,
}

impl ScriptInvoker {
    pub fn new(command_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command_path: command_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.deploy_script.clone(), config.deploy_timeout)
    }

    pub fn command_path(&self) -> &Path {
        &self.command_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl DeployInvoker for ScriptInvoker {
    async fn invoke(&self) -> DeployOutcome {
        invoke(&self.command_path, self.timeout).await
    }
}

/// Run `command_path` once and wait for it, at most `limit`.
///
/// On timeout the whole process group of the child is killed and the child
/// is reaped before `Timeout` is returned.
pub async fn invoke(command_path: &Path, limit: Duration) -> DeployOutcome {
    let start_time = Instant::now();

    info!(
        command = %command_path.display(),
        timeout_secs = limit.as_secs(),
        "deploy_started"
    );

    let mut cmd = Command::new(command_path);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so a timeout can take down everything the script
    // started, not just the script itself.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(
                command = %command_path.display(),
                error = %e,
                "deploy_spawn_failed"
            );
            return DeployOutcome::InvocationError {
                message: e.to_string(),
            };
        }
    };

    let pid = child.id();
    let stdout = read_stream(child.stdout.take());
    let stderr = read_stream(child.stderr.take());

    let completed = timeout(limit, async {
        let (status, stdout, stderr) = tokio::join!(child.wait(), stdout, stderr);
        status.map(|status| (status, stdout, stderr))
    })
    .await;

    let duration_ms = start_time.elapsed().as_millis() as u64;

    match completed {
        Ok(Ok((status, stdout, stderr))) => {
            if status.success() {
                info!(
                    duration_ms = duration_ms,
                    stdout_len = stdout.len(),
                    "deploy_succeeded"
                );
                DeployOutcome::Success { stdout }
            } else {
                error!(
                    exit_code = ?status.code(),
                    duration_ms = duration_ms,
                    stderr = %stderr,
                    "deploy_failed"
                );
                DeployOutcome::Failure {
                    code: status.code(),
                    stderr,
                }
            }
        }
        Ok(Err(e)) => {
            error!(error = %e, duration_ms = duration_ms, "deploy_wait_failed");
            terminate(&mut child, pid).await;
            DeployOutcome::InvocationError {
                message: e.to_string(),
            }
        }
        Err(_elapsed) => {
            error!(
                timeout_secs = limit.as_secs(),
                duration_ms = duration_ms,
                pid = ?pid,
                "deploy_timed_out"
            );
            terminate(&mut child, pid).await;
            DeployOutcome::Timeout
        }
    }
}

/// Kill the child's process group and reap the child.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // SAFETY: kill(2) has no memory-safety preconditions; the negative pid
        // addresses the group created for this child at spawn.
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
        if rc != 0 {
            debug!(
                pid = pid,
                error = %std::io::Error::last_os_error(),
                "deploy_group_kill_failed"
            );
        }
    }

    #[cfg(not(unix))]
    let _ = pid;

    // Kills the child if still running, then waits for it. Fails only when
    // the child already exited and was reaped by the cancelled wait.
    if let Err(e) = child.kill().await {
        debug!(error = %e, "deploy_child_kill_skipped");
    }

    match child.try_wait() {
        Ok(Some(status)) => debug!(exit_status = %status, "deploy_child_reaped"),
        Ok(None) => warn!("deploy_child_still_running"),
        Err(e) => warn!(error = %e, "deploy_child_status_unknown"),
    }
}

/// Read a child stream to the end as lossy UTF-8. Read errors end the
/// capture early rather than failing the deploy.
async fn read_stream<R>(stream: Option<R>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            warn!(error = %e, captured_bytes = buf.len(), "deploy_output_read_failed");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_script;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_invoke_success_captures_stdout() {
        let dir = tempdir().unwrap();
        let script = write_script(&dir, "deploy.sh", "echo OK");

        let outcome = invoke(&script, Duration::from_secs(10)).await;

        assert_eq!(
            outcome,
            DeployOutcome::Success {
                stdout: "OK\n".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_invoke_non_zero_exit_captures_stderr() {
        let dir = tempdir().unwrap();
        let script = write_script(&dir, "deploy.sh", "echo partial\necho boom >&2\nexit 3");

        let outcome = invoke(&script, Duration::from_secs(10)).await;

        match outcome {
            DeployOutcome::Failure { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("Expected Failure, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_killed_by_signal_has_no_code() {
        let dir = tempdir().unwrap();
        let script = write_script(&dir, "deploy.sh", "kill -9 $$");

        let outcome = invoke(&script, Duration::from_secs(10)).await;

        assert!(matches!(
            outcome,
            DeployOutcome::Failure { code: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_invoke_missing_binary() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.sh");

        let outcome = invoke(&missing, Duration::from_secs(10)).await;

        match outcome {
            DeployOutcome::InvocationError { message } => assert!(!message.is_empty()),
            other => panic!("Expected InvocationError, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_permission_denied() {
        let dir = tempdir().unwrap();
        let script = write_script(&dir, "deploy.sh", "echo never");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();

        let outcome = invoke(&script, Duration::from_secs(10)).await;

        assert!(matches!(outcome, DeployOutcome::InvocationError { .. }));
    }

    #[tokio::test]
    async fn test_invoke_passes_no_arguments() {
        let dir = tempdir().unwrap();
        let script = write_script(&dir, "deploy.sh", "echo \"args=$#\"");

        let outcome = invoke(&script, Duration::from_secs(10)).await;

        assert_eq!(
            outcome,
            DeployOutcome::Success {
                stdout: "args=0\n".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_invoke_closes_stdin() {
        let dir = tempdir().unwrap();
        let script = write_script(&dir, "deploy.sh", "cat\necho done");

        let outcome = invoke(&script, Duration::from_secs(10)).await;

        assert_eq!(
            outcome,
            DeployOutcome::Success {
                stdout: "done\n".to_string()
            }
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_invoke_timeout_kills_process_group() {
        use crate::test_support::process_alive;

        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("script.pid");
        let sleep_pid_file = dir.path().join("sleep.pid");
        let script = write_script(
            &dir,
            "deploy.sh",
            &format!(
                "echo $$ > {}\nsleep 30 &\necho $! > {}\nwait",
                pid_file.display(),
                sleep_pid_file.display()
            ),
        );

        let started = Instant::now();
        let outcome = invoke(&script, Duration::from_millis(500)).await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, DeployOutcome::Timeout);
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);

        let script_pid: u32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let sleep_pid: u32 = fs::read_to_string(&sleep_pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        // The script is reaped by us; the orphaned sleep may need a moment.
        assert!(!process_alive(script_pid));
        for _ in 0..50 {
            if !process_alive(sleep_pid) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!process_alive(sleep_pid), "sleep {} survived", sleep_pid);
    }

    #[tokio::test]
    async fn test_script_invoker_from_config() {
        let dir = tempdir().unwrap();
        let script = write_script(&dir, "deploy.sh", "printf deployed");
        let config = Config {
            deploy_script: script.clone(),
            deploy_timeout: Duration::from_secs(5),
            ..Config::default()
        };

        let invoker = ScriptInvoker::from_config(&config);
        assert_eq!(invoker.command_path(), script.as_path());
        assert_eq!(invoker.timeout(), Duration::from_secs(5));

        assert_eq!(
            invoker.invoke().await,
            DeployOutcome::Success {
                stdout: "deployed".to_string()
            }
        );
    }
}
