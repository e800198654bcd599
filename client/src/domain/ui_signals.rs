//! UI signal state: sidebar flag, color theme and the notification queue.
//!
//! The theme is restored from the saved preference, then the OS preference,
//! then light. Every theme change is saved right away and published on a
//! watch channel that presentation code subscribes to.

use anyhow::Result;
use log::{debug, warn};
use shared::{NewNotification, Theme};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::notifications::NotificationQueue;
use crate::storage::PreferenceStorage;

pub struct UiSignals {
    sidebar_open: AtomicBool,
    theme: watch::Sender<Theme>,
    preferences: Arc<dyn PreferenceStorage>,
    notifications: NotificationQueue,
}

impl UiSignals {
    pub fn new(preferences: Arc<dyn PreferenceStorage>, system_theme: Option<Theme>, notification_duration_ms: i64) -> Self {
        let saved = match preferences.load_theme() {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to load theme preference: {}", e);
                None
            }
        };
        let theme = saved.or(system_theme).unwrap_or_default();
        debug!("Starting with {} theme", theme);

        let (sender, _) = watch::channel(theme);
        Self {
            sidebar_open: AtomicBool::new(false),
            theme: sender,
            preferences,
            notifications: NotificationQueue::new(notification_duration_ms),
        }
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open.load(Ordering::SeqCst)
    }

    pub fn set_sidebar_open(&self, open: bool) {
        self.sidebar_open.store(open, Ordering::SeqCst);
    }

    /// Flip the sidebar and return the new state
    pub fn toggle_sidebar(&self) -> bool {
        !self.sidebar_open.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn theme(&self) -> Theme {
        *self.theme.borrow()
    }

    /// Apply and publish `theme`, then save it. The new theme stays applied
    /// even if saving fails.
    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.theme.send_replace(theme);
        self.preferences.save_theme(theme)?;
        debug!("Theme set to {}", theme);
        Ok(())
    }

    pub fn toggle_theme(&self) -> Result<Theme> {
        let theme = self.theme().toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    /// Receiver that observes every theme change
    pub fn subscribe_theme(&self) -> watch::Receiver<Theme> {
        self.theme.subscribe()
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn notify(&self, notification: NewNotification) -> String {
        self.notifications.add(notification)
    }
}

/// Terminal color preference from `COLORFGBG` (`"15;0"` is light text on a dark background)
pub fn detect_system_theme() -> Option<Theme> {
    std::env::var("COLORFGBG").ok().and_then(|value| theme_from_colorfgbg(&value))
}

fn theme_from_colorfgbg(value: &str) -> Option<Theme> {
    let background: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
    // Colors 0-6 and 8 are the dark half of the 16-color palette
    match background {
        0..=6 | 8 => Some(Theme::Dark),
        7 | 9..=15 => Some(Theme::Light),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use anyhow::anyhow;

    struct BrokenPreferences;

    impl PreferenceStorage for BrokenPreferences {
        fn load_theme(&self) -> Result<Option<Theme>> {
            Err(anyhow!("disk on fire"))
        }

        fn save_theme(&self, _theme: Theme) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[test]
    fn test_theme_restore_order() {
        let saved = UiSignals::new(Arc::new(MemoryStore::with_theme(Theme::Light)), Some(Theme::Dark), 5000);
        assert_eq!(saved.theme(), Theme::Light);

        let system = UiSignals::new(Arc::new(MemoryStore::new()), Some(Theme::Dark), 5000);
        assert_eq!(system.theme(), Theme::Dark);

        let fallback = UiSignals::new(Arc::new(MemoryStore::new()), None, 5000);
        assert_eq!(fallback.theme(), Theme::Light);

        let broken = UiSignals::new(Arc::new(BrokenPreferences), Some(Theme::Dark), 5000);
        assert_eq!(broken.theme(), Theme::Dark);
    }

    #[test]
    fn test_theme_changes_are_saved_and_published() {
        let store = Arc::new(MemoryStore::new());
        let ui = UiSignals::new(store.clone(), None, 5000);
        let mut receiver = ui.subscribe_theme();

        assert_eq!(ui.toggle_theme().unwrap(), Theme::Dark);
        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow_and_update(), Theme::Dark);
        assert_eq!(store.load_theme().unwrap(), Some(Theme::Dark));

        ui.set_theme(Theme::Light).unwrap();
        assert_eq!(*receiver.borrow_and_update(), Theme::Light);
        assert_eq!(store.load_theme().unwrap(), Some(Theme::Light));
    }

    #[test]
    fn test_failed_save_still_applies_theme() {
        let ui = UiSignals::new(Arc::new(BrokenPreferences), None, 5000);
        assert!(ui.set_theme(Theme::Dark).is_err());
        assert_eq!(ui.theme(), Theme::Dark);
    }

    #[test]
    fn test_sidebar_toggle() {
        let ui = UiSignals::new(Arc::new(MemoryStore::new()), None, 5000);
        assert!(!ui.sidebar_open());
        assert!(ui.toggle_sidebar());
        assert!(ui.sidebar_open());
        assert!(!ui.toggle_sidebar());

        ui.set_sidebar_open(true);
        ui.set_sidebar_open(true);
        assert!(ui.sidebar_open());
    }

    #[test]
    fn test_colorfgbg_parsing() {
        assert_eq!(theme_from_colorfgbg("15;0"), Some(Theme::Dark));
        assert_eq!(theme_from_colorfgbg("0;15"), Some(Theme::Light));
        assert_eq!(theme_from_colorfgbg("0;default;7"), Some(Theme::Light));
        assert_eq!(theme_from_colorfgbg("garbage"), None);
    }
}
