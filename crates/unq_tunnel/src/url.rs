use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

/// Hostname suffix the tunnel client prints once a quick tunnel is up.
const TUNNEL_HOST_SUFFIX: &str = "trycloudflare.com";

static TUNNEL_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://[\w-]+\.trycloudflare\.com").expect("valid regex"));

/// Extract the public tunnel URL from one line of tunnel output.
pub fn extract_public_url(line: &str) -> Option<String> {
    if !line.contains(TUNNEL_HOST_SUFFIX) {
        return None;
    }
    TUNNEL_URL.find(line).map(|m| m.as_str().to_string())
}

/// Overwrite the persisted URL file with `url`.
pub fn write_persisted_url(path: &Path, url: &str) -> Result<()> {
    std::fs::write(path, url)
        .with_context(|| format!("Failed to persist tunnel URL to {}", path.display()))
}

/// Read the last persisted URL, if any. Missing or empty files yield `None`.
pub fn read_persisted_url(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let url = content.trim();
    (!url.is_empty()).then(|| url.to_string())
}
