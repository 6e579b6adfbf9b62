use std::path::PathBuf;

use clap::Parser;
use unq_core::BridgeConfig;

#[derive(Parser, Debug)]
#[command(
    name = "unqperp",
    version,
    about = "Expose a local codebase to a remote agent over HTTP, with an optional public tunnel."
)]
pub(crate) struct Cli {
    /// Config file to load instead of ~/.unqperp/config.json
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Directory all file operations are confined to (default: current directory)
    #[arg(long = "base-dir")]
    pub(crate) base_dir: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    pub(crate) host: Option<String>,

    /// Bind port; the tunnel points at the same port
    #[arg(long, short = 'p')]
    pub(crate) port: Option<u16>,

    /// Do not start the public tunnel
    #[arg(long = "no-tunnel")]
    pub(crate) no_tunnel: bool,

    /// Default log filter when RUST_LOG is unset, e.g. debug
    #[arg(long = "log-level")]
    pub(crate) log_level: Option<String>,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded file.
    pub(crate) fn apply(&self, config: &mut BridgeConfig) {
        if let Some(dir) = &self.base_dir {
            config.base_dir = Some(dir.clone());
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.no_tunnel {
            config.tunnel_enabled = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::parse_from([
            "unqperp",
            "--base-dir",
            "/srv/code",
            "--port",
            "8080",
            "--no-tunnel",
        ]);
        let mut config = BridgeConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.base_dir, Some(PathBuf::from("/srv/code")));
        assert_eq!(config.port, 8080);
        assert!(!config.tunnel_enabled);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn no_flags_keep_defaults() {
        let cli = Cli::parse_from(["unqperp"]);
        let mut config = BridgeConfig::default();
        cli.apply(&mut config);
        assert!(config.tunnel_enabled);
        assert_eq!(config.port, 5000);
        assert_eq!(config.base_dir, None);
    }
}
