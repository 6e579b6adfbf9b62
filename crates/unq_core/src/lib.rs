pub mod config;
pub mod error;
pub mod info;
pub mod logging;

pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use info::{AUTHOR, ENDPOINTS, GITHUB_URL, TOOL_NAME, TOOL_VERSION};
