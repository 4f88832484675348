use super::{FileInfo, HostRuntime, PackageSpec, PathSpec, ServiceOp, ServiceState};
use crate::error::{RecipeError, Result};
use async_trait::async_trait;
use nix::unistd::{chown, Gid, Group, Uid, User};
use std::io::ErrorKind;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

/// SystemHost provisions the machine it runs on through the usual system tools
/// (`getent`, `useradd`, `rpm`, `dnf`, `systemctl`) and the filesystem.
#[derive(Debug, Default, Clone)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }
}

async fn output(program: &str, args: &[&str]) -> Result<Output> {
    debug!("Running {} {}", program, args.join(" "));

    Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| RecipeError::io(program, e))
}

/// Run a command and fail unless it exits successfully
async fn run(program: &str, args: &[&str]) -> Result<()> {
    let out = output(program, args).await?;
    if out.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    let detail = if stderr.is_empty() {
        out.status.to_string()
    } else {
        stderr
    };

    Err(RecipeError::CommandFailed {
        command: format!("{} {}", program, args.join(" ")),
        detail,
    })
}

fn lookup_owner(user: &str, group: &str) -> Result<(Uid, Gid)> {
    let uid = User::from_name(user)?
        .ok_or_else(|| RecipeError::UnknownPrincipal(user.to_string()))?
        .uid;
    let gid = Group::from_name(group)?
        .ok_or_else(|| RecipeError::UnknownPrincipal(group.to_string()))?
        .gid;
    Ok((uid, gid))
}

/// Bring owner, group and mode in line with `spec`.
/// Returns true if anything had to be corrected.
async fn apply_ownership(spec: &PathSpec) -> Result<bool> {
    let (uid, gid) = lookup_owner(&spec.user, &spec.group)?;
    let meta = tokio::fs::metadata(&spec.path)
        .await
        .map_err(|e| RecipeError::io(&spec.path, e))?;

    let mut corrected = false;
    if meta.uid() != uid.as_raw() || meta.gid() != gid.as_raw() {
        chown(spec.path.as_path(), Some(uid), Some(gid))?;
        corrected = true;
    }
    if meta.permissions().mode() & 0o7777 != spec.mode {
        tokio::fs::set_permissions(&spec.path, std::fs::Permissions::from_mode(spec.mode))
            .await
            .map_err(|e| RecipeError::io(&spec.path, e))?;
        corrected = true;
    }
    Ok(corrected)
}

#[async_trait]
impl HostRuntime for SystemHost {
    async fn user_exists(&self, user: &str) -> Result<bool> {
        Ok(output("getent", &["passwd", user]).await?.status.success())
    }

    async fn create_system_user(&self, user: &str) -> Result<()> {
        run("/usr/sbin/useradd", &[user, "-s", "/sbin/nologin"]).await?;
        info!("Created system user {}", user);
        Ok(())
    }

    async fn ensure_package(&self, package: &PackageSpec) -> Result<()> {
        let target = package.target();
        let installed = output("rpm", &["-q", package.name.as_str()]).await?.status.success();

        if installed {
            run("dnf", &["-y", "upgrade", target.as_str()]).await?;
            info!("Package {} is up to date", target);
        } else {
            run("dnf", &["-y", "install", target.as_str()]).await?;
            info!("Package {} installed", target);
        }

        Ok(())
    }

    async fn ensure_directory(&self, spec: &PathSpec) -> Result<bool> {
        let created = match tokio::fs::metadata(&spec.path).await {
            Ok(meta) if meta.is_dir() => false,
            Ok(_) => {
                return Err(RecipeError::io(
                    &spec.path,
                    std::io::Error::new(ErrorKind::AlreadyExists, "exists and is not a directory"),
                ))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&spec.path)
                    .await
                    .map_err(|e| RecipeError::io(&spec.path, e))?;
                true
            }
            Err(e) => return Err(RecipeError::io(&spec.path, e)),
        };

        apply_ownership(spec).await?;

        if created {
            info!("Created directory {} ({:o})", spec.path.display(), spec.mode);
        }
        Ok(created)
    }

    async fn write_file(&self, spec: &PathSpec, content: &str) -> Result<bool> {
        let current = match tokio::fs::read(&spec.path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(RecipeError::io(&spec.path, e)),
        };

        let changed = current.as_deref() != Some(content.as_bytes());
        if changed {
            let file_name = spec
                .path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let tmp = spec.path.with_file_name(format!(".{}.tmp", file_name));

            tokio::fs::write(&tmp, content)
                .await
                .map_err(|e| RecipeError::io(&tmp, e))?;
            tokio::fs::rename(&tmp, &spec.path)
                .await
                .map_err(|e| RecipeError::io(&spec.path, e))?;

            info!("Rendered {}", spec.path.display());
        }

        // Owner or mode drift counts as a change too, so it also triggers the restart
        let corrected = apply_ownership(spec).await?;
        if corrected && !changed {
            info!("Corrected owner or mode of {}", spec.path.display());
        }
        Ok(changed || corrected)
    }

    async fn service(&self, name: &str, op: ServiceOp) -> Result<()> {
        run("systemctl", &[op.as_str(), name]).await?;
        info!("Service {}: {}", name, op);
        Ok(())
    }

    async fn service_state(&self, name: &str) -> Result<ServiceState> {
        let enabled = output("systemctl", &["is-enabled", "--quiet", name])
            .await?
            .status
            .success();
        let active = output("systemctl", &["is-active", "--quiet", name])
            .await?
            .status
            .success();

        Ok(ServiceState { enabled, active })
    }

    async fn file_info(&self, path: &Path) -> Result<Option<FileInfo>> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RecipeError::io(path, e)),
        };

        let user = User::from_uid(Uid::from_raw(meta.uid()))?
            .map(|u| u.name)
            .unwrap_or_else(|| meta.uid().to_string());
        let group = Group::from_gid(Gid::from_raw(meta.gid()))?
            .map(|g| g.name)
            .unwrap_or_else(|| meta.gid().to_string());

        Ok(Some(FileInfo {
            user,
            group,
            mode: meta.permissions().mode() & 0o7777,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_owner() -> (String, String) {
        let user = User::from_uid(Uid::current()).unwrap().unwrap().name;
        let group = Group::from_gid(Gid::current()).unwrap().unwrap().name;
        (user, group)
    }

    #[tokio::test]
    async fn test_write_file_reports_mode_correction() {
        let dir = tempfile::tempdir().unwrap();
        let (user, group) = current_owner();
        let host = SystemHost::new();

        let spec = PathSpec::new(dir.path().join("weights.yml"), &user, &group, 0o644);
        assert!(host.write_file(&spec, "a: 1\n").await.unwrap());
        assert!(!host.write_file(&spec, "a: 1\n").await.unwrap());

        let tightened = PathSpec::new(dir.path().join("weights.yml"), &user, &group, 0o600);
        assert!(host.write_file(&tightened, "a: 1\n").await.unwrap());
        assert!(!host.write_file(&tightened, "a: 1\n").await.unwrap());

        let info = host.file_info(&tightened.path).await.unwrap().unwrap();
        assert_eq!(info.mode, 0o600);
        assert_eq!(info.user, user);
    }
}
