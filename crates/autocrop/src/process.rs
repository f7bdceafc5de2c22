use std::path::Path;
use std::process::Stdio;
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use crate::error::CropError;

/// Captured result of an external tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Last few stderr lines, enough to explain a failure in a log entry
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Why a tool produced no output at all
#[derive(Debug)]
pub enum ToolFailure {
    /// The binary could not be started or waited on (not installed, not executable)
    Spawn(String),
    /// The configured timeout elapsed and the process was killed
    TimedOut(u64),
}

impl ToolFailure {
    /// Map to the caller's error kind; timeouts always surface as [`CropError::ToolTimeout`]
    pub fn into_crop_error(self, tool: &Path, stage_error: impl FnOnce(String) -> CropError) -> CropError {
        match self {
            ToolFailure::Spawn(reason) => stage_error(reason),
            ToolFailure::TimedOut(secs) => CropError::ToolTimeout {
                tool: tool.display().to_string(),
                secs,
            },
        }
    }
}

/// Runs ffmpeg/ffprobe as blocking-for-the-caller subprocesses.
///
/// Without a timeout a hung tool stalls the invocation indefinitely, which
/// is the historical behaviour.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    pub timeout_secs: Option<u64>,
}

impl ToolRunner {
    pub fn new(timeout_secs: Option<u64>) -> Self {
        ToolRunner { timeout_secs }
    }

    /// Spawn `bin` with `args`, capture stdout/stderr and wait for exit.
    ///
    /// A non-zero exit is returned as `Ok` with `success == false`; only
    /// spawn failures and timeouts are errors.
    pub async fn run(&self, bin: &Path, args: &[String]) -> Result<ToolOutput, ToolFailure> {
        debug!("Executing: {} {}", bin.display(), args.join(" "));

        let mut cmd = Command::new(bin);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ToolFailure::Spawn(format!(
                "failed to spawn {}: {}. Ensure it is installed and accessible.",
                bin.display(),
                e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolFailure::Spawn("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ToolFailure::Spawn("failed to capture stderr".to_string()))?;

        // Drain both pipes concurrently so a chatty stderr cannot block the child
        let stdout_handle = tokio::spawn(async move {
            let mut lines = Vec::new();
            let mut line_stream = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = line_stream.next_line().await {
                lines.push(line);
            }
            lines.join("\n")
        });
        let stderr_handle = tokio::spawn(async move {
            let mut lines = Vec::new();
            let mut line_stream = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = line_stream.next_line().await {
                lines.push(line);
            }
            lines.join("\n")
        });

        let status = match self.timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), child.wait()).await {
                Ok(result) => result
                    .map_err(|e| ToolFailure::Spawn(format!("failed to wait for {}: {}", bin.display(), e)))?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(ToolFailure::TimedOut(secs));
                }
            },
            None => child
                .wait()
                .await
                .map_err(|e| ToolFailure::Spawn(format!("failed to wait for {}: {}", bin.display(), e)))?,
        };

        let stdout = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();

        debug!(
            "{} exited with {:?} (stdout {} bytes, stderr {} bytes)",
            bin.display(),
            status.code(),
            stdout.len(),
            stderr.len()
        );

        Ok(ToolOutput {
            success: status.success(),
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_stderr_tail() {
        let output = ToolOutput {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "a\nb\nc\nd".to_string(),
        };
        assert_eq!(output.stderr_tail(2), "c\nd");
        assert_eq!(output.stderr_tail(10), "a\nb\nc\nd");
    }

    #[test]
    fn test_timeout_maps_to_tool_timeout() {
        let err = ToolFailure::TimedOut(30).into_crop_error(Path::new("ffmpeg"), |reason| {
            CropError::Transcode { path: PathBuf::from("/a.mkv"), reason }
        });
        assert!(matches!(err, CropError::ToolTimeout { secs: 30, .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let runner = ToolRunner::new(None);
        let result = runner
            .run(Path::new("/nonexistent/autocrop-test-binary"), &[])
            .await;
        assert!(matches!(result, Err(ToolFailure::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_exit_status_and_output() {
        let runner = ToolRunner::new(Some(10));
        let args = vec!["-c".to_string(), "echo out; echo err 1>&2; exit 3".to_string()];
        let output = match runner.run(Path::new("sh"), &args).await {
            Ok(o) => o,
            Err(_) => {
                println!("sh not available, skipping");
                return;
            }
        };
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_tool_is_killed() {
        let runner = ToolRunner::new(Some(1));
        let args = vec!["30".to_string()];
        match runner.run(Path::new("sleep"), &args).await {
            Err(ToolFailure::TimedOut(1)) => {}
            Err(ToolFailure::Spawn(_)) => println!("sleep not available, skipping"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
