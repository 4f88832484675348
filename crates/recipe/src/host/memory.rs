use super::{FileInfo, HostRuntime, PackageSpec, PathSpec, ServiceOp, ServiceState};
use crate::error::{RecipeError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredFile {
    content: String,
    info: FileInfo,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashSet<String>,
    packages: HashMap<String, Option<String>>,
    dirs: HashMap<PathBuf, FileInfo>,
    files: HashMap<PathBuf, StoredFile>,
    services: HashMap<String, ServiceState>,
    calls: Vec<String>,
    fail_user_create: bool,
    fail_package: bool,
    fail_service: bool,
    write_failures: u32,
}

/// MemoryHost keeps the whole host in memory and records every change it is
/// asked to make. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryHost {
    inner: Mutex<Inner>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.inner.get_mut().users.insert(user.to_string());
        self
    }

    pub fn failing_user_create(mut self) -> Self {
        self.inner.get_mut().fail_user_create = true;
        self
    }

    pub fn failing_package(mut self) -> Self {
        self.inner.get_mut().fail_package = true;
        self
    }

    pub fn failing_service(mut self) -> Self {
        self.inner.get_mut().fail_service = true;
        self
    }

    /// The next `times` file writes fail
    pub fn failing_writes(mut self, times: u32) -> Self {
        self.inner.get_mut().write_failures = times;
        self
    }

    /// Every change requested so far, in order, e.g. `"service restart rb-reputation"`
    pub async fn calls(&self) -> Vec<String> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn has_user(&self, user: &str) -> bool {
        self.inner.lock().await.users.contains(user)
    }

    pub async fn package_version(&self, name: &str) -> Option<Option<String>> {
        self.inner.lock().await.packages.get(name).cloned()
    }

    pub async fn directory(&self, path: &Path) -> Option<FileInfo> {
        self.inner.lock().await.dirs.get(path).cloned()
    }

    pub async fn file_content(&self, path: &Path) -> Option<String> {
        self.inner
            .lock()
            .await
            .files
            .get(path)
            .map(|f| f.content.clone())
    }

    pub async fn file_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.inner.lock().await.files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

fn simulated(command: &str) -> RecipeError {
    RecipeError::CommandFailed {
        command: command.to_string(),
        detail: "simulated failure".to_string(),
    }
}

#[async_trait]
impl HostRuntime for MemoryHost {
    async fn user_exists(&self, user: &str) -> Result<bool> {
        Ok(self.inner.lock().await.users.contains(user))
    }

    async fn create_system_user(&self, user: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.fail_user_create {
            return Err(simulated("useradd"));
        }
        inner.users.insert(user.to_string());
        inner.calls.push(format!("useradd {}", user));
        Ok(())
    }

    async fn ensure_package(&self, package: &PackageSpec) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.fail_package {
            return Err(simulated("dnf"));
        }
        let verb = if inner.packages.contains_key(&package.name) {
            "upgrade"
        } else {
            "install"
        };
        inner
            .packages
            .insert(package.name.clone(), package.version.clone());
        inner.calls.push(format!("dnf {} {}", verb, package.target()));
        Ok(())
    }

    async fn ensure_directory(&self, spec: &PathSpec) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let info = FileInfo {
            user: spec.user.clone(),
            group: spec.group.clone(),
            mode: spec.mode,
        };
        let created = inner.dirs.insert(spec.path.clone(), info).is_none();
        if created {
            inner
                .calls
                .push(format!("mkdir {} {:o}", spec.path.display(), spec.mode));
        }
        Ok(created)
    }

    async fn write_file(&self, spec: &PathSpec, content: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.write_failures > 0 {
            inner.write_failures -= 1;
            return Err(RecipeError::io(
                &spec.path,
                std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            ));
        }

        let info = FileInfo {
            user: spec.user.clone(),
            group: spec.group.clone(),
            mode: spec.mode,
        };
        let changed = inner
            .files
            .get(&spec.path)
            .map(|f| f.content != content || f.info != info)
            .unwrap_or(true);

        inner.files.insert(
            spec.path.clone(),
            StoredFile {
                content: content.to_string(),
                info,
            },
        );
        if changed {
            inner.calls.push(format!("render {}", spec.path.display()));
        }
        Ok(changed)
    }

    async fn service(&self, name: &str, op: ServiceOp) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.fail_service {
            return Err(simulated("systemctl"));
        }
        let state = inner.services.entry(name.to_string()).or_default();
        match op {
            ServiceOp::Enable => state.enabled = true,
            ServiceOp::Disable => state.enabled = false,
            ServiceOp::Start | ServiceOp::Restart => state.active = true,
            ServiceOp::Stop => state.active = false,
        }
        inner.calls.push(format!("service {} {}", op, name));
        Ok(())
    }

    async fn service_state(&self, name: &str) -> Result<ServiceState> {
        Ok(self
            .inner
            .lock()
            .await
            .services
            .get(name)
            .copied()
            .unwrap_or_default())
    }

    async fn file_info(&self, path: &Path) -> Result<Option<FileInfo>> {
        Ok(self
            .inner
            .lock()
            .await
            .files
            .get(path)
            .map(|f| f.info.clone()))
    }
}
