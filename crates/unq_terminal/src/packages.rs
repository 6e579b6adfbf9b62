use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};
use unq_core::{BridgeError, BridgeResult};

use crate::process::{ExecutionResult, Invocation};
use crate::slots::ProcessSlots;

/// Supported package manager backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Pip,
    Npm,
}

impl FromStr for PackageManager {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pip" => Ok(Self::Pip),
            "npm" => Ok(Self::Npm),
            _ => Err(BridgeError::UnsupportedManager(s.to_string())),
        }
    }
}

/// Installs packages through pip or npm and relays their raw output.
///
/// Installs have no timeout; a slow registry simply keeps the slot busy.
#[derive(Debug, Clone)]
pub struct PackageInstaller {
    working_dir: PathBuf,
    slots: ProcessSlots,
    python_bin: String,
    npm_bin: String,
}

impl PackageInstaller {
    pub fn new(working_dir: impl Into<PathBuf>, slots: ProcessSlots) -> Self {
        Self {
            working_dir: working_dir.into(),
            slots,
            python_bin: "python3".into(),
            npm_bin: "npm".into(),
        }
    }

    pub fn with_python_bin(mut self, bin: impl Into<String>) -> Self {
        self.python_bin = bin.into();
        self
    }

    pub fn with_npm_bin(mut self, bin: impl Into<String>) -> Self {
        self.npm_bin = bin.into();
        self
    }

    /// Install `package` with the manager named by `manager`.
    pub async fn install(&self, package: &str, manager: &str) -> BridgeResult<ExecutionResult> {
        let manager = manager.parse::<PackageManager>()?;
        let (program, args, hint) = self.command_for(manager, package);

        let _permit = self.slots.acquire().await?;
        info!(package, ?manager, "installing package");

        let result = Invocation {
            program,
            args,
            envs: Vec::new(),
            working_dir: &self.working_dir,
            timeout: None,
            install_hint: hint,
        }
        .run()
        .await?;

        if !result.success() {
            warn!(package, code = ?result.return_code, "package install failed");
        }
        Ok(result)
    }

    fn command_for(
        &self,
        manager: PackageManager,
        package: &str,
    ) -> (&str, Vec<String>, &'static str) {
        match manager {
            PackageManager::Pip => (
                &self.python_bin,
                vec!["-m".into(), "pip".into(), "install".into(), package.into()],
                "Install Python 3 with pip or set python_bin in the config.",
            ),
            PackageManager::Npm => (
                &self.npm_bin,
                vec!["install".into(), package.into()],
                "Install Node.js with npm or set npm_bin in the config.",
            ),
        }
    }
}
