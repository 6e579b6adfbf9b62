use std::path::PathBuf;

use tracing::debug;
use unq_core::{BridgeError, BridgeResult};

use crate::process::{ExecutionResult, Invocation};
use crate::slots::ProcessSlots;

/// Git subcommands a caller may run.
pub const ALLOWED_SUBCOMMANDS: &[&str] = &[
    "status", "add", "commit", "push", "pull", "log", "diff", "init",
];

/// Options that make git execute another program or write arbitrary files.
const BLOCKED_OPTIONS: &[&str] = &["--upload-pack", "--receive-pack", "--exec", "--output"];

const GIT_HINT: &str = "Install git or set git_bin in the config.";

/// Runs allow-listed git subcommands in the base directory.
///
/// The command line is split into words and passed as argv; no shell is
/// involved. The first word must be an allow-listed subcommand.
#[derive(Debug, Clone)]
pub struct GitGateway {
    working_dir: PathBuf,
    slots: ProcessSlots,
    git_bin: String,
}

impl GitGateway {
    pub fn new(working_dir: impl Into<PathBuf>, slots: ProcessSlots) -> Self {
        Self {
            working_dir: working_dir.into(),
            slots,
            git_bin: "git".into(),
        }
    }

    pub fn with_git_bin(mut self, bin: impl Into<String>) -> Self {
        self.git_bin = bin.into();
        self
    }

    /// Validate and run `command_line` (everything after `git`).
    pub async fn run(&self, command_line: &str) -> BridgeResult<ExecutionResult> {
        let args = parse_command(command_line)?;
        let _permit = self.slots.acquire().await?;
        debug!(args = ?args, "running git");

        Invocation {
            program: &self.git_bin,
            args,
            // Never block on a credential prompt nobody can answer.
            envs: vec![("GIT_TERMINAL_PROMPT", "0")],
            working_dir: &self.working_dir,
            timeout: None,
            install_hint: GIT_HINT,
        }
        .run()
        .await
    }
}

/// Split a git command line into argv and check it against the allow-list.
pub fn parse_command(command_line: &str) -> BridgeResult<Vec<String>> {
    let args = shell_words::split(command_line)
        .map_err(|e| BridgeError::Forbidden(format!("Malformed git command: {e}")))?;

    let Some(subcommand) = args.first() else {
        return Err(BridgeError::Forbidden("Git command not allowed: empty".into()));
    };
    if !ALLOWED_SUBCOMMANDS.contains(&subcommand.as_str()) {
        return Err(BridgeError::Forbidden(format!(
            "Git command not allowed: {subcommand}"
        )));
    }

    if let Some(bad) = args
        .iter()
        .find(|arg| BLOCKED_OPTIONS.iter().any(|opt| arg.starts_with(opt)))
    {
        return Err(BridgeError::Forbidden(format!("Git option not allowed: {bad}")));
    }

    Ok(args)
}
