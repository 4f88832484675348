pub mod report;

use recipe::RecipeConfig;

/// Values given on the command line that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub memory: Option<u32>,
    pub aerospike_ips: Vec<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut RecipeConfig) {
        if let Some(memory) = self.memory {
            config.memory = memory;
        }
        if !self.aerospike_ips.is_empty() {
            config.aerospike_ips = self.aerospike_ips.clone();
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
