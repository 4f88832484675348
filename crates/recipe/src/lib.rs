pub mod config;
pub mod error;
pub mod facts;
pub mod host;
pub mod lifecycle;
pub mod recipe;
pub mod registry;
pub mod service;
pub mod state;
pub mod templates;

pub use config::RecipeConfig;
pub use error::{RecipeError, Result};
pub use facts::HostFacts;
pub use host::{HostRuntime, MemoryHost, SystemHost};
pub use recipe::{Action, ActionOutcome, Recipe};
pub use registry::{ConsulAgent, RetryPolicy};
pub use service::{ServiceRegistration, SERVICE_NAME, SERVICE_PORT};
pub use state::{RegistrationState, StateStore};
