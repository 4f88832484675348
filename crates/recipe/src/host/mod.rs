mod memory;
mod system;

pub use memory::MemoryHost;
pub use system::SystemHost;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// A path the host should own, with its owner, group and permission bits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    pub path: PathBuf,
    pub user: String,
    pub group: String,
    pub mode: u32,
}

impl PathSpec {
    pub fn new(path: impl Into<PathBuf>, user: &str, group: &str, mode: u32) -> Self {
        Self {
            path: path.into(),
            user: user.to_string(),
            group: group.to_string(),
            mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<String>,
}

impl PackageSpec {
    /// The argument handed to the package manager: `name` or `name-version`
    pub fn target(&self) -> String {
        match &self.version {
            Some(version) => format!("{}-{}", self.name, version),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOp {
    Enable,
    Disable,
    Start,
    Stop,
    Restart,
}

impl ServiceOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceOp::Enable => "enable",
            ServiceOp::Disable => "disable",
            ServiceOp::Start => "start",
            ServiceOp::Stop => "stop",
            ServiceOp::Restart => "restart",
        }
    }
}

impl fmt::Display for ServiceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceState {
    pub enabled: bool,
    pub active: bool,
}

/// Ownership and permission bits of an existing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub user: String,
    pub group: String,
    pub mode: u32,
}

/// HostRuntime is everything the lifecycle actions need from the machine
/// they provision. Every operation is idempotent.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    async fn user_exists(&self, user: &str) -> Result<bool>;

    /// Create a non-interactive system user
    async fn create_system_user(&self, user: &str) -> Result<()>;

    /// Install the package, or upgrade it when already installed
    async fn ensure_package(&self, package: &PackageSpec) -> Result<()>;

    /// Ensure a directory exists with the given ownership and mode.
    /// Returns true if it had to be created.
    async fn ensure_directory(&self, spec: &PathSpec) -> Result<bool>;

    /// Ensure a file has exactly `content` with the given ownership and mode.
    /// Returns true if the content changed.
    async fn write_file(&self, spec: &PathSpec, content: &str) -> Result<bool>;

    async fn service(&self, name: &str, op: ServiceOp) -> Result<()>;

    async fn service_state(&self, name: &str) -> Result<ServiceState>;

    /// None when the file does not exist
    async fn file_info(&self, path: &Path) -> Result<Option<FileInfo>>;
}
