//! # File Store
//!
//! Persists the client state in a single YAML file, `client_state.yaml`, in
//! the client data directory.
//!
//! ```yaml
//! auth_token: "eyJhbGciOi..."
//! theme: dark
//! updated_at: "2025-01-21T19:35:00Z"
//! ```
//!
//! Writes go to a temp file first and are then renamed over the original.

use anyhow::Result;
use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::Theme;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{CredentialStorage, PreferenceStorage};

pub const STATE_FILE_NAME: &str = "client_state.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// YAML-file implementation of the credential and preference storage
pub struct FileStore {
    base_directory: PathBuf,
    // Serializes read-modify-write cycles on the state file
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
            info!("Created client data directory: {:?}", base_path);
        }

        Ok(Self {
            base_directory: base_path,
            lock: Mutex::new(()),
        })
    }

    fn state_path(&self) -> PathBuf {
        self.base_directory.join(STATE_FILE_NAME)
    }

    fn load_state(&self) -> Result<ClientState> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(ClientState::default());
        }

        let yaml_content = fs::read_to_string(&path)?;
        if yaml_content.trim().is_empty() {
            return Ok(ClientState::default());
        }
        let state: ClientState = serde_yaml::from_str(&yaml_content)?;
        debug!("Loaded client state from {:?}", path);
        Ok(state)
    }

    fn save_state(&self, state: &ClientState) -> Result<()> {
        let path = self.state_path();
        let yaml_content = serde_yaml::to_string(state)?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, yaml_content)?;
        restrict_permissions(&temp_path)?;
        fs::rename(&temp_path, &path)?;

        debug!("Saved client state to {:?}", path);
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut ClientState),
    {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut state = self.load_state()?;
        apply(&mut state);
        state.updated_at = Some(Utc::now().to_rfc3339());
        self.save_state(&state)
    }
}

// The state file holds a bearer credential
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

impl CredentialStorage for FileStore {
    fn load_token(&self) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.load_state()?.auth_token)
    }

    fn save_token(&self, token: &str) -> Result<()> {
        self.update(|state| state.auth_token = Some(token.to_string()))
    }

    fn clear_token(&self) -> Result<()> {
        self.update(|state| state.auth_token = None)
    }
}

impl PreferenceStorage for FileStore {
    fn load_theme(&self) -> Result<Option<Theme>> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.load_state()?.theme)
    }

    fn save_theme(&self, theme: Theme) -> Result<()> {
        self.update(|state| state.theme = Some(theme))
    }
}
