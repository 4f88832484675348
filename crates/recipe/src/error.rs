use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("agent returned {status} for {url}: {body}")]
    AgentStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("invalid agent url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("command `{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("unknown user or group: {0}")]
    UnknownPrincipal(String),

    #[error("system error: {0}")]
    SystemError(#[from] nix::errno::Errno),
}

impl RecipeError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        RecipeError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecipeError>;
