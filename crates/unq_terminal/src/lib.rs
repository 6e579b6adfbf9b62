// External process execution: code runner, package installs, git

pub mod executor;
pub mod git;
pub mod packages;
pub mod process;
pub mod slots;

pub use executor::{Language, ProcessRunner};
pub use git::{ALLOWED_SUBCOMMANDS, GitGateway};
pub use packages::{PackageInstaller, PackageManager};
pub use process::ExecutionResult;
pub use slots::ProcessSlots;
