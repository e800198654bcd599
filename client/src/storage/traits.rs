//! # Storage Traits
//!
//! Abstractions over the small amount of state the client persists between
//! runs, so that the session and UI containers can be tested against an
//! in-memory implementation.

use anyhow::Result;
use shared::Theme;

/// Persisted bearer credential
pub trait CredentialStorage: Send + Sync {
    /// Load the saved token, if any
    fn load_token(&self) -> Result<Option<String>>;

    /// Replace the saved token
    fn save_token(&self, token: &str) -> Result<()>;

    /// Forget the saved token. Clearing an absent token is not an error.
    fn clear_token(&self) -> Result<()>;
}

/// Persisted user preferences
pub trait PreferenceStorage: Send + Sync {
    /// Load the saved theme, `None` when the user never chose one
    fn load_theme(&self) -> Result<Option<Theme>>;

    fn save_theme(&self, theme: Theme) -> Result<()>;
}
