use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::url::{extract_public_url, read_persisted_url, write_persisted_url};

/// How long to wait for an exited client's status after its output closed.
const EXIT_STATUS_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Why the tunnel could not be brought up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TunnelFailure {
    /// The tunnel client binary is not installed.
    BinaryMissing { binary: String, hint: String },
    /// The client exited before printing a URL.
    Exited { code: Option<i32>, output: String },
    /// Spawning or reading the client failed for another reason.
    Io { message: String },
}

/// Lifecycle of the tunnel supervisor.
///
/// `NotStarted → Starting → {Detected, TimedOut, Failed}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TunnelState {
    NotStarted,
    Starting,
    Detected {
        url: String,
        detected_at: DateTime<Utc>,
    },
    TimedOut,
    Failed(TunnelFailure),
}

impl TunnelState {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Detected { url, .. } => Some(url),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TunnelSupervisor
// ---------------------------------------------------------------------------

/// Starts the tunnel client once and tracks whether a public URL appeared.
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone)]
pub struct TunnelSupervisor {
    program: String,
    args: Vec<String>,
    detect_window: Duration,
    url_file: PathBuf,
    state: Arc<RwLock<TunnelState>>,
}

impl TunnelSupervisor {
    /// Supervisor for `binary tunnel --url http://localhost:<port>`.
    pub fn new(binary: impl Into<String>, port: u16, url_file: impl Into<PathBuf>) -> Self {
        Self {
            program: binary.into(),
            args: vec![
                "tunnel".into(),
                "--url".into(),
                format!("http://localhost:{port}"),
            ],
            detect_window: Duration::from_secs(15),
            url_file: url_file.into(),
            state: Arc::new(RwLock::new(TunnelState::NotStarted)),
        }
    }

    /// Replace the client command line entirely.
    pub fn with_command(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    pub fn with_detect_window(mut self, window: Duration) -> Self {
        self.detect_window = window;
        self
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> TunnelState {
        self.state.read().clone()
    }

    /// URL detected in this run, falling back to the one persisted by an
    /// earlier run.
    pub fn public_url(&self) -> Option<String> {
        if let Some(url) = self.state.read().url() {
            return Some(url.to_string());
        }
        read_persisted_url(&self.url_file)
    }

    /// Human-readable command line, used in remediation messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the supervisor as an independent background task.
    pub fn spawn(&self) -> JoinHandle<TunnelState> {
        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.supervise().await })
    }

    /// Start the client and watch its output until a URL appears, the
    /// client exits, or the detection window closes. Returns the final state.
    pub async fn supervise(&self) -> TunnelState {
        self.set_state(TunnelState::Starting);
        info!(command = %self.command_line(), "starting tunnel");

        let final_state = match self.start_client() {
            Ok(child) => self.watch(child).await,
            Err(failure) => TunnelState::Failed(failure),
        };

        self.report(&final_state);
        self.set_state(final_state.clone());
        final_state
    }

    fn start_client(&self) -> Result<Child, TunnelFailure> {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        spawned.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TunnelFailure::BinaryMissing {
                    binary: self.program.clone(),
                    hint: format!("Install {} and make sure it is on PATH.", self.program),
                }
            } else {
                TunnelFailure::Io {
                    message: e.to_string(),
                }
            }
        })
    }

    async fn watch(&self, mut child: Child) -> TunnelState {
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain(BufReader::new(stdout).lines()));
        }
        let Some(stderr) = child.stderr.take() else {
            return TunnelState::Failed(TunnelFailure::Io {
                message: "tunnel stderr was not captured".into(),
            });
        };

        let mut lines = BufReader::new(stderr).lines();
        let mut seen = Vec::new();
        let detection =
            tokio::time::timeout(self.detect_window, scan_for_url(&mut lines, &mut seen)).await;

        match detection {
            Ok(Ok(Some(url))) => {
                if let Err(e) = write_persisted_url(&self.url_file, &url) {
                    warn!("{e:#}");
                }
                keep_draining(lines, child);
                TunnelState::Detected {
                    url,
                    detected_at: Utc::now(),
                }
            }
            Ok(Ok(None)) => {
                let code = match tokio::time::timeout(EXIT_STATUS_GRACE, child.wait()).await {
                    Ok(Ok(status)) => status.code(),
                    _ => None,
                };
                TunnelState::Failed(TunnelFailure::Exited {
                    code,
                    output: seen.join("\n"),
                })
            }
            Ok(Err(e)) => TunnelState::Failed(TunnelFailure::Io {
                message: e.to_string(),
            }),
            Err(_) => {
                keep_draining(lines, child);
                TunnelState::TimedOut
            }
        }
    }

    fn report(&self, state: &TunnelState) {
        match state {
            TunnelState::Detected { url, .. } => {
                info!("Tunnel started: {url}");
                info!("Test URL: {url}/api/status");
            }
            TunnelState::TimedOut => {
                warn!(
                    "Tunnel started but URL not detected within {}s. Check it manually with: {}",
                    self.detect_window.as_secs(),
                    self.command_line()
                );
            }
            TunnelState::Failed(TunnelFailure::BinaryMissing { binary, hint }) => {
                error!("{binary} not found. {hint}");
            }
            TunnelState::Failed(TunnelFailure::Exited { code, output }) => {
                error!(?code, "Tunnel process terminated: {output}");
            }
            TunnelState::Failed(TunnelFailure::Io { message }) => {
                error!("Failed to start tunnel: {message}");
            }
            TunnelState::NotStarted | TunnelState::Starting => {}
        }
    }

    fn set_state(&self, state: TunnelState) {
        *self.state.write() = state;
    }
}

/// Read lines until one carries the public URL. Every line read is kept in
/// `seen`. Returns `None` at end of stream.
async fn scan_for_url<R>(
    lines: &mut Lines<BufReader<R>>,
    seen: &mut Vec<String>,
) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        debug!(target: "unq_tunnel::output", "{line}");
        let url = extract_public_url(&line);
        seen.push(line);
        if url.is_some() {
            return Ok(url);
        }
    }
    Ok(None)
}

/// Leave the client running in the background. Its output is consumed so it
/// never blocks on a full pipe, and it is reaped when it exits.
fn keep_draining(lines: Lines<BufReader<ChildStderr>>, mut child: Child) {
    debug!(pid = ?child.id(), "tunnel client left running in background");
    tokio::spawn(async move {
        drain(lines).await;
        match child.wait().await {
            Ok(status) => warn!(code = ?status.code(), "tunnel client exited"),
            Err(e) => warn!("failed to wait for tunnel client: {e}"),
        }
    });
}

async fn drain<R>(mut lines: Lines<BufReader<R>>)
where
    R: AsyncRead + Unpin,
{
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "unq_tunnel::output", "{line}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
