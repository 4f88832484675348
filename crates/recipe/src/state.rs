use crate::error::{RecipeError, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether this host's service instance is currently registered with the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationState {
    pub registered: bool,
}

impl RegistrationState {
    pub fn registered() -> Self {
        Self { registered: true }
    }

    pub fn unregistered() -> Self {
        Self { registered: false }
    }
}

/// StateStore persists the registration flag as a small JSON file on the host
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state. A missing file means "never registered".
    pub async fn load(&self) -> Result<RegistrationState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let state: RegistrationState = serde_json::from_slice(&bytes)?;
                debug!("Loaded registration state {:?} from {}", state, self.path.display());
                Ok(state)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No registration state at {}, assuming unregistered", self.path.display());
                Ok(RegistrationState::default())
            }
            Err(e) => Err(RecipeError::io(&self.path, e)),
        }
    }

    /// Persist the state, replacing the previous file atomically
    pub async fn save(&self, state: RegistrationState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| RecipeError::io(parent, e))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&state)?;

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| RecipeError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| RecipeError::io(&self.path, e))?;

        debug!("Saved registration state {:?} to {}", state, self.path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_unregistered() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let state = store.load().await.unwrap();
        assert!(!state.registered);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/state.json"));

        store.save(RegistrationState::registered()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), RegistrationState::registered());

        store.save(RegistrationState::unregistered()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), RegistrationState::unregistered());

        assert!(!dir.path().join("nested/state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();

        let result = StateStore::new(path).load().await;
        assert!(matches!(result, Err(RecipeError::SerializationError(_))));
    }
}
