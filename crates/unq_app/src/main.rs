mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use unq_core::{AUTHOR, BridgeConfig, ENDPOINTS, GITHUB_URL, TOOL_NAME, TOOL_VERSION, logging};
use unq_server::AppState;
use unq_tunnel::TunnelSupervisor;

use crate::cli::Cli;

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Effective config plus what startup should report once logging is up.
struct LoadedConfig {
    config: BridgeConfig,
    path: PathBuf,
    /// The file exists but could not be used; defaults were taken instead.
    problem: Option<anyhow::Error>,
    first_run: bool,
}

fn load_config(cli: &Cli) -> Result<LoadedConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => BridgeConfig::config_path()?,
    };
    let first_run = !path.exists();
    let (mut config, problem) = match BridgeConfig::load(&path) {
        Ok(config) => (config, None),
        Err(e) => (BridgeConfig::default(), Some(e)),
    };
    cli.apply(&mut config);
    Ok(LoadedConfig {
        config,
        path,
        problem,
        first_run,
    })
}

fn report_config(loaded: &LoadedConfig) {
    if let Some(e) = &loaded.problem {
        warn!("{e:#}; using defaults");
    } else if loaded.first_run {
        match BridgeConfig::default().save_to_file(&loaded.path) {
            Ok(()) => info!("Wrote default config to {}", loaded.path.display()),
            Err(e) => warn!("Could not write default config: {e:#}"),
        }
    }
}

fn banner(config: &BridgeConfig, base_dir: &Path) -> String {
    let mut out = format!(
        "\n{TOOL_NAME} v{TOOL_VERSION} - AI CodeBase Bridge Server\n\
         Created by: {AUTHOR}\n\
         GitHub: {GITHUB_URL}\n\n\
         Base Directory: {}\n\
         Server starting at: http://localhost:{}\n\n\
         Available Endpoints:\n",
        base_dir.display(),
        config.port,
    );
    for (method, path, summary) in ENDPOINTS {
        out.push_str(&format!("   {method:<6} {path:<20} - {summary}\n"));
    }
    out
}

fn start_tunnel(config: &BridgeConfig, base_dir: &Path) -> TunnelSupervisor {
    let supervisor = TunnelSupervisor::new(
        &config.tunnel_bin,
        config.port,
        base_dir.join(&config.tunnel_url_file),
    )
    .with_detect_window(config.tunnel_detect_window());
    // Runs on its own; the listener never waits for it.
    supervisor.spawn();
    supervisor
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(&cli)?;
    let config = &loaded.config;

    let _log_guard = logging::init_logging(config).context("Failed to initialize logging")?;
    info!("Starting {TOOL_NAME} v{TOOL_VERSION}");
    report_config(&loaded);

    let base_dir = config.resolve_base_dir()?;
    let mut state = AppState::from_config(config, &base_dir)
        .with_context(|| format!("Cannot serve {}", base_dir.display()))?;

    if config.tunnel_enabled {
        state = state.with_tunnel(start_tunnel(config, &base_dir));
    } else {
        info!("Tunnel disabled");
    }

    println!("{}", banner(config, &base_dir));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    if let Err(e) = unq_server::serve(listener, state).await {
        warn!("Server stopped: {e:#}");
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_lists_every_endpoint() {
        let text = banner(&BridgeConfig::default(), Path::new("/srv/code"));
        assert!(text.contains("Base Directory: /srv/code"));
        assert!(text.contains("http://localhost:5000"));
        for (_, path, summary) in ENDPOINTS {
            assert!(text.contains(path));
            assert!(text.contains(summary));
        }
    }

    #[test]
    fn corrupt_config_is_kept_for_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ broken").unwrap();

        let cli = Cli::parse_from(["unqperp", "--config", path.to_str().unwrap(), "-p", "6000"]);
        let loaded = load_config(&cli).unwrap();

        assert!(loaded.problem.is_some());
        assert!(!loaded.first_run);
        assert_eq!(loaded.config.port, 6000);
        assert_eq!(loaded.config.tunnel_bin, "cloudflared");
    }

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh").join("config.json");

        let cli = Cli::parse_from(["unqperp", "--config", path.to_str().unwrap(), "--no-tunnel"]);
        let loaded = load_config(&cli).unwrap();
        assert!(loaded.first_run);
        assert!(loaded.problem.is_none());

        report_config(&loaded);
        let saved = BridgeConfig::load(&path).unwrap();
        assert!(saved.tunnel_enabled);
    }
}
