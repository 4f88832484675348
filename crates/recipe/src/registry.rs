use crate::error::{RecipeError, Result};
use crate::service::ServiceRegistration;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_AGENT_URL: &str = "http://localhost:8500";

/// How many times an agent call is attempted before giving up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::from_secs(2),
        }
    }
}

/// A service entry as listed by `/v1/agent/services`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentService {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

/// ConsulAgent talks to the discovery agent running on the local host
pub struct ConsulAgent {
    base_url: Url,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl ConsulAgent {
    /// Create a client for the agent at `base_url` (e.g. "http://localhost:8500")
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // Url::join replaces the last path segment unless the base ends with a slash
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Register a service instance with the agent
    ///
    /// Succeeds only when the agent answers with a 2xx status.
    pub async fn register(&self, service: &ServiceRegistration) -> Result<()> {
        let url = self.base_url.join("v1/agent/service/register")?;

        info!("Registering service {} as {} at {}", service.name, service.id, url);

        self.put(url, Some(service)).await?;

        info!("Service {} registered successfully", service.id);

        Ok(())
    }

    /// Deregister a service instance by id
    pub async fn deregister(&self, service_id: &str) -> Result<()> {
        let url = self
            .base_url
            .join(&format!("v1/agent/service/deregister/{}", service_id))?;

        info!("Deregistering service {} at {}", service_id, url);

        self.put(url, None).await?;

        info!("Service {} deregistered successfully", service_id);

        Ok(())
    }

    /// Get all services registered with the local agent, keyed by id
    pub async fn services(&self) -> Result<HashMap<String, AgentService>> {
        let url = self.base_url.join("v1/agent/services")?;

        debug!("Listing agent services at {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let response = check_status(url, response).await?;
        let services: HashMap<String, AgentService> = response.json().await?;

        debug!("Agent lists {} services", services.len());

        Ok(services)
    }

    async fn put(&self, url: Url, body: Option<&ServiceRegistration>) -> Result<()> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut request = self.client.put(url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            let result = match request.send().await {
                Ok(response) => check_status(url.clone(), response).await.map(|_| ()),
                Err(e) => Err(RecipeError::from(e)),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempts < max_attempts => {
                    warn!(
                        "Agent call to {} failed (attempt {}/{}): {}",
                        url, attempts, max_attempts, e
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn check_status(url: Url, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(RecipeError::AgentStatus {
        status: status.as_u16(),
        url: url.to_string(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let agent = ConsulAgent::new("http://localhost:8500/consul", Duration::from_secs(1)).unwrap();

        assert_eq!(agent.base_url().as_str(), "http://localhost:8500/consul/");
        assert_eq!(
            agent.base_url().join("v1/agent/services").unwrap().as_str(),
            "http://localhost:8500/consul/v1/agent/services"
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = ConsulAgent::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(RecipeError::InvalidUrl(_))));
    }
}
