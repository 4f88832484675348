use crate::config::RecipeConfig;
use crate::error::{RecipeError, Result};
use crate::facts::HostFacts;
use crate::host::HostRuntime;
use crate::lifecycle::{self, AddReport, StatusReport};
use crate::registry::ConsulAgent;
use crate::service::ServiceRegistration;
use crate::state::StateStore;
use std::fmt;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
    Register,
    Deregister,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Add => "add",
            Action::Remove => "remove",
            Action::Register => "register",
            Action::Deregister => "deregister",
        };
        f.write_str(name)
    }
}

/// Result of running an action through [`Recipe::run`]. The error, if any,
/// has already been logged.
#[derive(Debug)]
pub struct ActionOutcome {
    pub action: Action,
    pub error: Option<RecipeError>,
}

impl ActionOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Recipe wires the lifecycle actions to a host, the discovery agent and the
/// persisted registration state.
pub struct Recipe<H> {
    host: H,
    agent: ConsulAgent,
    store: StateStore,
    config: RecipeConfig,
    facts: HostFacts,
}

impl<H: HostRuntime> Recipe<H> {
    pub fn new(host: H, config: RecipeConfig, facts: HostFacts) -> Result<Self> {
        config.validate()?;

        let agent = ConsulAgent::new(&config.agent.url, config.agent.timeout())?
            .with_retry(config.agent.retry_policy());
        let store = StateStore::new(&config.state_file);
        let facts = facts.with_overrides(
            config.host.hostname.as_deref(),
            config.host.ipaddress.as_deref(),
        );

        Ok(Self {
            host,
            agent,
            store,
            config,
            facts,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn config(&self) -> &RecipeConfig {
        &self.config
    }

    pub fn registration(&self) -> ServiceRegistration {
        ServiceRegistration::new(
            &self.config.service_name,
            &self.facts.hostname,
            &self.facts.ipaddress,
        )
    }

    pub async fn add(&self) -> Result<AddReport> {
        lifecycle::add(&self.host, &self.config).await
    }

    pub async fn remove(&self) -> Result<()> {
        lifecycle::remove(&self.host, &self.config.service_name).await
    }

    pub async fn register(&self) -> Result<()> {
        let state = self.store.load().await?;
        let next = lifecycle::register(&self.agent, state, &self.registration()).await?;
        if next != state {
            self.store.save(next).await?;
        }
        Ok(())
    }

    pub async fn deregister(&self) -> Result<()> {
        let state = self.store.load().await?;
        let next = lifecycle::deregister(&self.agent, state, &self.registration().id).await?;
        if next != state {
            self.store.save(next).await?;
        }
        Ok(())
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let state = self.store.load().await?;
        lifecycle::status(
            &self.host,
            &self.agent,
            &self.config,
            state,
            &self.registration().id,
        )
        .await
    }

    /// Run an action without ever failing the caller: errors are logged and
    /// handed back in the outcome.
    pub async fn run(&self, action: Action) -> ActionOutcome {
        let service = &self.config.service_name;

        let result = match action {
            Action::Add => self.add().await.map(|report| {
                info!(
                    "{}: {} files changed, restarted: {}",
                    service,
                    report.changed_files.len(),
                    report.restarted
                );
            }),
            Action::Remove => self.remove().await,
            Action::Register => self.register().await,
            Action::Deregister => self.deregister().await,
        };

        if let Err(e) = &result {
            error!("{} {} failed: {}", service, action, e);
        }
        info!("{} {} has been processed", service, action);

        ActionOutcome {
            action,
            error: result.err(),
        }
    }
}
