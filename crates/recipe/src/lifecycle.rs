use crate::config::RecipeConfig;
use crate::error::Result;
use crate::host::{FileInfo, HostRuntime, PackageSpec, PathSpec, ServiceOp, ServiceState};
use crate::registry::ConsulAgent;
use crate::service::ServiceRegistration;
use crate::state::RegistrationState;
use crate::templates::{render_all, TemplateVars, CONFIG_FILE_MODE};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CONFIG_DIR_MODE: u32 = 0o700;
pub const LOG_DIR_MODE: u32 = 0o770;

/// Times a failed file render is retried
pub const RENDER_RETRIES: u32 = 2;
pub const RENDER_RETRY_DELAY: Duration = Duration::from_secs(2);

/// What an `add` run changed on the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub user_created: bool,
    pub created_dirs: Vec<PathBuf>,
    pub changed_files: Vec<PathBuf>,
    pub restarted: bool,
}

/// Install, configure, enable and start the service
pub async fn add<H: HostRuntime + ?Sized>(host: &H, config: &RecipeConfig) -> Result<AddReport> {
    let mut report = AddReport::default();
    let service = config.service_name.as_str();

    if host.user_exists(&config.user).await? {
        debug!("User {} already exists", config.user);
    } else {
        match host.create_system_user(&config.user).await {
            Ok(()) => report.user_created = true,
            Err(e) => warn!("Failed to create user {} (ignored): {}", config.user, e),
        }
    }

    host.ensure_package(&PackageSpec {
        name: service.to_string(),
        version: config.package_version.clone(),
    })
    .await?;

    let dirs = [
        PathSpec::new(&config.config_dir, &config.user, &config.group, CONFIG_DIR_MODE),
        PathSpec::new(&config.log_dir, &config.user, &config.group, LOG_DIR_MODE),
    ];
    for dir in &dirs {
        if host.ensure_directory(dir).await? {
            report.created_dirs.push(dir.path.clone());
        }
    }

    let vars = TemplateVars {
        memory: config.memory,
        aerospike_ips: &config.aerospike_ips,
    };
    for rendered in render_all(&config.config_dir, &vars) {
        let spec = PathSpec::new(&rendered.path, &config.user, &config.group, CONFIG_FILE_MODE);
        if render_with_retries(host, &spec, &rendered.content).await? {
            report.changed_files.push(rendered.path);
        }
    }

    for op in [ServiceOp::Enable, ServiceOp::Start] {
        if let Err(e) = host.service(service, op).await {
            warn!("Failed to {} service {} (ignored): {}", op, service, e);
        }
    }

    // Delayed notifications: one restart no matter how many files changed
    if !report.changed_files.is_empty() {
        info!(
            "{} config files changed, restarting {}",
            report.changed_files.len(),
            service
        );
        match host.service(service, ServiceOp::Restart).await {
            Ok(()) => report.restarted = true,
            Err(e) => warn!("Failed to restart service {} (ignored): {}", service, e),
        }
    }

    Ok(report)
}

async fn render_with_retries<H: HostRuntime + ?Sized>(
    host: &H,
    spec: &PathSpec,
    content: &str,
) -> Result<bool> {
    let mut retries = 0;
    loop {
        match host.write_file(spec, content).await {
            Ok(changed) => return Ok(changed),
            Err(e) if retries < RENDER_RETRIES => {
                retries += 1;
                warn!(
                    "Failed to render {} (retry {}/{}): {}",
                    spec.path.display(),
                    retries,
                    RENDER_RETRIES,
                    e
                );
                tokio::time::sleep(RENDER_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Disable and stop the service
pub async fn remove<H: HostRuntime + ?Sized>(host: &H, service: &str) -> Result<()> {
    host.service(service, ServiceOp::Disable).await?;
    host.service(service, ServiceOp::Stop).await?;
    Ok(())
}

/// Register the instance unless `state` says it already is.
///
/// Returns the state the caller should persist; it only changes when the agent
/// confirmed the registration.
pub async fn register(
    agent: &ConsulAgent,
    state: RegistrationState,
    registration: &ServiceRegistration,
) -> Result<RegistrationState> {
    if state.registered {
        debug!("{} already registered, skipping", registration.id);
        return Ok(state);
    }

    agent.register(registration).await?;
    Ok(RegistrationState::registered())
}

/// Deregister the instance unless `state` says it is not registered
pub async fn deregister(
    agent: &ConsulAgent,
    state: RegistrationState,
    service_id: &str,
) -> Result<RegistrationState> {
    if !state.registered {
        debug!("{} not registered, skipping", service_id);
        return Ok(state);
    }

    agent.deregister(service_id).await?;
    Ok(RegistrationState::unregistered())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub service: ServiceState,
    pub files: Vec<(PathBuf, Option<FileInfo>)>,
    pub registered: bool,
    /// Whether the agent lists the instance; None when the agent could not be asked
    pub agent_listed: Option<bool>,
}

pub async fn status<H: HostRuntime + ?Sized>(
    host: &H,
    agent: &ConsulAgent,
    config: &RecipeConfig,
    state: RegistrationState,
    service_id: &str,
) -> Result<StatusReport> {
    let service = host.service_state(&config.service_name).await?;

    let vars = TemplateVars {
        memory: config.memory,
        aerospike_ips: &config.aerospike_ips,
    };
    let mut files = Vec::new();
    for rendered in render_all(&config.config_dir, &vars) {
        let info = host.file_info(&rendered.path).await?;
        files.push((rendered.path, info));
    }

    let agent_listed = match agent.services().await {
        Ok(services) => Some(services.contains_key(service_id)),
        Err(e) => {
            warn!("Could not query agent services: {}", e);
            None
        }
    };

    Ok(StatusReport {
        service,
        files,
        registered: state.registered,
        agent_listed,
    })
}
