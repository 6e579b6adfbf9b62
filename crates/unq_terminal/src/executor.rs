use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, warn};
use unq_core::{BridgeError, BridgeResult};

use crate::process::{ExecutionResult, Invocation, shell_argv};
use crate::slots::ProcessSlots;

/// Default wall-clock limit for a single execution.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Languages the runner accepts, each bound to one execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// Inline: the code is handed to `python -c`.
    Python,
    /// File-based: the code is written to `<filename>.js` and run with node.
    Node,
    /// Shell line: the code is interpreted by the platform shell.
    Bash,
}

impl FromStr for Language {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "node" | "javascript" | "js" => Ok(Self::Node),
            "bash" | "sh" | "shell" => Ok(Self::Bash),
            _ => Err(BridgeError::UnsupportedLanguage(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

/// Runs caller-supplied code in the base directory under a hard timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    working_dir: PathBuf,
    slots: ProcessSlots,
    timeout: Duration,
    python_bin: String,
    node_bin: String,
}

impl ProcessRunner {
    pub fn new(working_dir: impl Into<PathBuf>, slots: ProcessSlots) -> Self {
        Self {
            working_dir: working_dir.into(),
            slots,
            timeout: DEFAULT_TIMEOUT,
            python_bin: "python3".into(),
            node_bin: "node".into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_python_bin(mut self, bin: impl Into<String>) -> Self {
        self.python_bin = bin.into();
        self
    }

    pub fn with_node_bin(mut self, bin: impl Into<String>) -> Self {
        self.node_bin = bin.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Parse `language` and execute `code` with it.
    ///
    /// `filename` names the script file for file-based languages and is
    /// ignored otherwise.
    pub async fn execute(
        &self,
        code: &str,
        language: &str,
        filename: &str,
    ) -> BridgeResult<ExecutionResult> {
        let language = language.parse::<Language>()?;
        self.execute_language(code, language, filename).await
    }

    pub async fn execute_language(
        &self,
        code: &str,
        language: Language,
        filename: &str,
    ) -> BridgeResult<ExecutionResult> {
        let _permit = self.slots.acquire().await?;
        debug!(?language, timeout_secs = self.timeout.as_secs(), "executing code");

        match language {
            Language::Python => {
                self.invoke(&self.python_bin, vec!["-c".into(), code.into()], PYTHON_HINT)
                    .await
            }
            Language::Node => self.run_script_file(code, filename, "js").await,
            Language::Bash => {
                let (program, args) = shell_argv(code);
                self.invoke(program, args, "").await
            }
        }
    }

    /// Write `code` to `<filename>.<ext>` in the working directory, run it,
    /// and remove the file afterwards whatever the outcome.
    async fn run_script_file(
        &self,
        code: &str,
        filename: &str,
        ext: &str,
    ) -> BridgeResult<ExecutionResult> {
        let script = self.script_path(filename, ext)?;
        tokio::fs::write(&script, code).await?;

        let result = self
            .invoke(
                &self.node_bin,
                vec![script.to_string_lossy().into_owned()],
                NODE_HINT,
            )
            .await;

        if let Err(e) = tokio::fs::remove_file(&script).await {
            warn!(script = %script.display(), error = %e, "failed to remove script file");
        }
        result
    }

    fn script_path(&self, filename: &str, ext: &str) -> BridgeResult<PathBuf> {
        let name = if filename.is_empty() { "temp" } else { filename };
        // The script must land directly in the working directory.
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name)
            || name.contains(['/', '\\'])
        {
            return Err(BridgeError::Forbidden(format!(
                "Script filename must be a plain file name: {filename}"
            )));
        }
        Ok(self.working_dir.join(format!("{name}.{ext}")))
    }

    async fn invoke(
        &self,
        program: &str,
        args: Vec<String>,
        hint: &str,
    ) -> BridgeResult<ExecutionResult> {
        Invocation {
            program,
            args,
            envs: Vec::new(),
            working_dir: &self.working_dir,
            timeout: Some(self.timeout),
            install_hint: hint,
        }
        .run()
        .await
    }
}

const PYTHON_HINT: &str = "Install Python 3 or set python_bin in the config.";
const NODE_HINT: &str = "Install Node.js or set node_bin in the config.";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
