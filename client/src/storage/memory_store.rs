//! In-memory storage for tests and for runs that should not touch the disk.

use anyhow::Result;
use shared::Theme;
use std::sync::Mutex;

use super::file_store::ClientState;
use super::traits::{CredentialStorage, PreferenceStorage};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<ClientState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            state: Mutex::new(ClientState {
                auth_token: Some(token.to_string()),
                ..Default::default()
            }),
        }
    }

    pub fn with_theme(theme: Theme) -> Self {
        Self {
            state: Mutex::new(ClientState {
                theme: Some(theme),
                ..Default::default()
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ClientState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }
}

impl CredentialStorage for MemoryStore {
    fn load_token(&self) -> Result<Option<String>> {
        Ok(self.with_state(|state| state.auth_token.clone()))
    }

    fn save_token(&self, token: &str) -> Result<()> {
        self.with_state(|state| state.auth_token = Some(token.to_string()));
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        self.with_state(|state| state.auth_token = None);
        Ok(())
    }
}

impl PreferenceStorage for MemoryStore {
    fn load_theme(&self) -> Result<Option<Theme>> {
        Ok(self.with_state(|state| state.theme))
    }

    fn save_theme(&self, theme: Theme) -> Result<()> {
        self.with_state(|state| state.theme = Some(theme));
        Ok(())
    }
}
