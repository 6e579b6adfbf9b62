use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used by every bridge component.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failure taxonomy shared by all bridge components.
///
/// Each component translates its own failures into one of these variants so
/// that the HTTP layer can map them to a status code without inspecting
/// message text.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Path escapes the base directory: {0}")]
    OutsideBase(String),

    #[error("Target already exists: {0}")]
    Conflict(String),

    #[error("Execution timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Unsupported package manager: {0}")]
    UnsupportedManager(String),

    #[error("{tool} not found. {hint}")]
    ExternalToolMissing { tool: String, hint: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`BridgeError`], used for logging and wire mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Timeout,
    UnsupportedOperation,
    ExternalToolMissing,
    GenericFailure,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) | Self::OutsideBase(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::UnsupportedLanguage(_) | Self::UnsupportedManager(_) => {
                ErrorKind::UnsupportedOperation
            }
            Self::ExternalToolMissing { .. } => ErrorKind::ExternalToolMissing,
            Self::Io(_) | Self::Other(_) => ErrorKind::GenericFailure,
        }
    }

    /// Build a [`BridgeError::NotFound`] from anything path-like.
    pub fn not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::NotFound(path.as_ref().display().to_string())
    }

    /// Translate a spawn failure into `ExternalToolMissing` when the binary
    /// is absent, otherwise keep the I/O error as-is.
    pub fn from_spawn(err: std::io::Error, tool: &str, hint: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::ExternalToolMissing {
                tool: tool.to_string(),
                hint: hint.to_string(),
            }
        } else {
            Self::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(BridgeError::not_found("a.txt").kind(), ErrorKind::NotFound);
        assert_eq!(
            BridgeError::OutsideBase("../x".into()).kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            BridgeError::UnsupportedLanguage("cobol".into()).kind(),
            ErrorKind::UnsupportedOperation
        );
        assert_eq!(
            BridgeError::from(anyhow::anyhow!("boom")).kind(),
            ErrorKind::GenericFailure
        );
    }

    #[test]
    fn io_message_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let err = BridgeError::from(io);
        assert_eq!(err.to_string(), "Permission denied");
    }

    #[test]
    fn spawn_not_found_becomes_tool_missing() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = BridgeError::from_spawn(io, "cloudflared", "Install cloudflared first.");
        assert_eq!(err.kind(), ErrorKind::ExternalToolMissing);
        assert!(err.to_string().contains("cloudflared not found"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = BridgeError::from_spawn(io, "git", "");
        assert_eq!(err.kind(), ErrorKind::GenericFailure);
    }

    #[test]
    fn timeout_message_names_duration() {
        let err = BridgeError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Execution timed out after 30s");
    }
}
