use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};
use unq_core::{BridgeError, BridgeResult};

/// Captured outcome of an external process.
///
/// Output is reported verbatim. `return_code` is `None` when the process
/// was terminated by a signal.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    #[serde(rename = "output")]
    pub stdout: String,
    #[serde(rename = "error")]
    pub stderr: String,
    pub return_code: Option<i32>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.return_code == Some(0)
    }
}

/// One external program invocation: argv, environment and limits.
#[derive(Debug)]
pub(crate) struct Invocation<'a> {
    pub program: &'a str,
    pub args: Vec<String>,
    pub envs: Vec<(&'a str, &'a str)>,
    pub working_dir: &'a Path,
    /// Hard wall-clock deadline; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Remediation text used when the program is not installed.
    pub install_hint: &'a str,
}

impl Invocation<'_> {
    /// Spawn the program, wait for it and capture stdout/stderr.
    ///
    /// On timeout the child (and on Unix its whole process group) is killed
    /// and [`BridgeError::Timeout`] is returned.
    pub async fn run(self) -> BridgeResult<ExecutionResult> {
        debug!(
            program = self.program,
            args = ?self.args,
            dir = %self.working_dir.display(),
            timeout_secs = self.timeout.map(|t| t.as_secs()),
            "spawning process"
        );

        let mut cmd = Command::new(self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().copied())
            .current_dir(self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // A fresh process group lets a timeout take down grandchildren too.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .map_err(|e| BridgeError::from_spawn(e, self.program, self.install_hint))?;
        let pid = child.id();
        let start = Instant::now();

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(program = self.program, "process timed out, killing it");
                    kill_process_group(pid);
                    return Err(BridgeError::Timeout(limit));
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            return_code: output.status.code(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    // SAFETY: killpg only sends a signal; the group id is the child's pid
    // because it was spawned with process_group(0).
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, "killpg failed, process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {
    // The direct child is killed when its handle drops (kill_on_drop).
}

/// Platform shell invocation for a full command line.
pub(crate) fn shell_argv(line: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "windows") {
        ("cmd", vec!["/c".to_string(), line.to_string()])
    } else {
        ("sh", vec!["-c".to_string(), line.to_string()])
    }
}
