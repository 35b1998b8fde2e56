use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{AgentConfig, AgentError, AgentOutput};

/// Utility for spawning agent processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process, capture both output streams and wait for it to exit.
    ///
    /// With a timeout configured the child is killed once the limit passes.
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        config: &AgentConfig,
    ) -> Result<AgentOutput, AgentError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            args = args.len(),
            working_dir = %config.working_dir.display(),
            timeout_secs = config.timeout.map(|t| t.as_secs()),
            "Spawning agent process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            .kill_on_drop(true);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AgentError::NotFound(binary.display().to_string()),
            _ => AgentError::SpawnFailed(e),
        })?;

        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::ExecutionFailed("stdout not captured".to_string()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::ExecutionFailed("stderr not captured".to_string()))?;

        let run = async {
            let (stdout, stderr) = tokio::try_join!(
                collect_lines(stdout_handle, "stdout"),
                collect_lines(stderr_handle, "stderr")
            )?;
            let status = child.wait().await?;
            Ok::<_, AgentError>((stdout, stderr, status))
        };

        let (stdout, stderr, status) = match config.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| AgentError::Timeout(limit))??,
            None => run.await?,
        };

        let duration = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        debug!(
            exit_code,
            duration_ms = duration.as_millis(),
            "Agent process completed"
        );

        Ok(AgentOutput::new(stdout, stderr, exit_code, duration))
    }
}

async fn collect_lines<R>(reader: R, stream: &'static str) -> Result<String, AgentError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                trace!(stream, line = %line, "agent output");
                if !collected.is_empty() {
                    collected.push('\n');
                }
                collected.push_str(&line);
            }
            Ok(None) => return Ok(collected),
            Err(e) => {
                return Err(AgentError::ExecutionFailed(format!(
                    "Failed to read {}: {}",
                    stream, e
                )))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> AgentConfig {
        AgentConfig::new(std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let output = ProcessSpawner::spawn(
            Path::new("sh"),
            &["-c", "echo first; echo second; echo oops >&2; exit 3"],
            &config(),
        )
        .await
        .unwrap();

        assert_eq!(output.stdout, "first\nsecond");
        assert_eq!(output.stderr, "oops");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_env_vars_are_passed() {
        let config = config().with_env("FIXLOOP_TEST_VAR".to_string(), "42".to_string());
        let output = ProcessSpawner::spawn(Path::new("sh"), &["-c", "echo $FIXLOOP_TEST_VAR"], &config)
            .await
            .unwrap();
        assert_eq!(output.stdout, "42");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let config = config().with_timeout(Duration::from_millis(100));
        let result = ProcessSpawner::spawn(Path::new("sh"), &["-c", "sleep 10"], &config).await;
        assert!(matches!(result, Err(AgentError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let result = ProcessSpawner::spawn(
            Path::new("fixloop-definitely-missing-binary"),
            &[],
            &config(),
        )
        .await;
        assert!(matches!(result, Err(AgentError::NotFound(_))));
    }
}
