//! Public tunnel bootstrap.
//!
//! Starts an external tunnel client pointed at the local listener, watches
//! its log stream for the public URL and records the outcome. Nothing here
//! ever blocks or fails the HTTP service.

pub mod supervisor;
pub mod url;

pub use supervisor::{TunnelFailure, TunnelState, TunnelSupervisor};
pub use url::{extract_public_url, read_persisted_url, write_persisted_url};
