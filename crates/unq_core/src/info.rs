//! Tool identity reported by the status endpoint and the startup banner.

pub const TOOL_NAME: &str = "UnQPerp";
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = "Sandeep Gaddam";
pub const GITHUB_URL: &str = "https://github.com/UnQOfficial/UnQPerp";

/// Every route exposed by the bridge, as `(method, path, summary)`.
pub const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/api/status", "Server status & tool info"),
    ("GET", "/api/files", "List files and directories"),
    ("GET", "/api/files/<path>", "Read file content"),
    ("POST", "/api/files/<path>", "Create new file"),
    ("PUT", "/api/files/<path>", "Update existing file"),
    ("DELETE", "/api/files/<path>", "Delete file/directory"),
    ("POST", "/api/rename", "Rename files/directories"),
    ("POST", "/api/execute", "Execute code (Python/Node/Bash)"),
    ("POST", "/api/install", "Install packages (pip/npm)"),
    ("POST", "/api/git", "Git operations"),
    ("POST", "/api/search", "Search codebase"),
    ("GET", "/api/tree", "Directory tree view"),
];
