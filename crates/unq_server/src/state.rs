use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use unq_core::{BridgeConfig, BridgeResult};
use unq_fs::{FileStore, PathResolver, TreeWalker};
use unq_terminal::{GitGateway, PackageInstaller, ProcessRunner, ProcessSlots};
use unq_tunnel::{TunnelState, TunnelSupervisor, read_persisted_url};

/// Components shared by every request handler.
///
/// Built once at startup from the configuration; the base directory never
/// changes afterwards.
#[derive(Debug)]
pub struct AppState {
    pub files: FileStore,
    pub runner: ProcessRunner,
    pub installer: PackageInstaller,
    pub git: GitGateway,
    pub tree: TreeWalker,
    pub search_include_hidden: bool,
    pub rename_overwrite: bool,
    tunnel: Option<TunnelSupervisor>,
    tunnel_url_file: PathBuf,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire up every component against `base_dir`.
    ///
    /// All process-spawning components share one pool of process slots.
    pub fn from_config(config: &BridgeConfig, base_dir: &Path) -> BridgeResult<Self> {
        let resolver = PathResolver::new(base_dir)?;
        let base = resolver.base().to_path_buf();
        let slots = ProcessSlots::new(config.max_concurrent_processes);
        debug!(process_slots = slots.capacity(), base_dir = %base.display(), "wiring components");

        Ok(Self {
            runner: ProcessRunner::new(&base, slots.clone())
                .with_timeout(config.exec_timeout())
                .with_python_bin(&config.python_bin)
                .with_node_bin(&config.node_bin),
            installer: PackageInstaller::new(&base, slots.clone())
                .with_python_bin(&config.python_bin)
                .with_npm_bin(&config.npm_bin),
            git: GitGateway::new(&base, slots).with_git_bin(&config.git_bin),
            tree: TreeWalker::new(config.tree_max_depth),
            search_include_hidden: config.search_include_hidden,
            rename_overwrite: config.rename_overwrite,
            tunnel: None,
            tunnel_url_file: base.join(&config.tunnel_url_file),
            files: FileStore::new(resolver),
        })
    }

    /// Attach the running tunnel supervisor so status queries see its state.
    pub fn with_tunnel(mut self, tunnel: TunnelSupervisor) -> Self {
        self.tunnel = Some(tunnel);
        self
    }

    pub fn base_dir(&self) -> &Path {
        self.files.resolver().base()
    }

    /// Public URL from this run's tunnel, or the last persisted one.
    pub fn tunnel_url(&self) -> Option<String> {
        match &self.tunnel {
            Some(tunnel) => tunnel.public_url(),
            None => read_persisted_url(&self.tunnel_url_file),
        }
    }

    /// `None` when the tunnel is disabled.
    pub fn tunnel_state(&self) -> Option<TunnelState> {
        self.tunnel.as_ref().map(TunnelSupervisor::state)
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(self)
    }
}
