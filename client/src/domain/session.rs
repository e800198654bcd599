//! # Session State
//!
//! Holds the authenticated user, the session status and the last
//! authentication error. All transitions go through [`SessionStore`].
//!
//! ## States
//!
//! - **Anonymous**: initial state, and the state after logout or a failed login
//! - **Checking**: a persisted credential is being validated at startup
//! - **Authenticating**: a login or registration is in flight
//! - **Authenticated**: a user is signed in
//!
//! ## Ordering
//!
//! Every user action takes a new generation number. A gateway response is
//! applied only if no newer action started while it was in flight, so the
//! most recent action always wins: a logout issued during a slow login leaves
//! the session anonymous once the login response arrives, and the login
//! call reports [`GatewayError::Superseded`].
//!
//! ## Expiry
//!
//! The gateway runs [`SessionStore::expiry_hook`] whenever the backend answers
//! 401. An authenticated session is then reset to anonymous, as if the user
//! had logged out.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shared::{LoginCredentials, RegisterData, User};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{GatewayError, GatewayResult};
use crate::io::{Gateway, UnauthorizedHook};
use crate::storage::CredentialStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Anonymous,
    Checking,
    Authenticating,
    Authenticated,
}

/// Point-in-time copy of the session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<User>,
    pub status: SessionStatus,
    /// Last login or registration failure, kept until cleared or superseded
    pub error: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, SessionStatus::Checking | SessionStatus::Authenticating)
    }
}

#[derive(Default)]
struct SessionState {
    session: Session,
    generation: u64,
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reset an authenticated session after its credential was rejected
fn expire_session(state: &Mutex<SessionState>, credentials: &dyn CredentialStorage) {
    {
        let mut state = lock_state(state);
        if !state.session.is_authenticated() {
            return;
        }
        state.generation += 1;
        state.session = Session::default();
    }
    warn!("Credential rejected by the backend, signing out");
    if let Err(e) = credentials.clear_token() {
        warn!("Failed to clear credential token: {}", e);
    }
}

pub struct SessionStore {
    gateway: Arc<dyn Gateway>,
    credentials: Arc<dyn CredentialStorage>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn Gateway>, credentials: Arc<dyn CredentialStorage>) -> Self {
        Self {
            gateway,
            credentials,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    /// Start a new action; older in-flight actions become stale
    fn begin(&self, status: Option<SessionStatus>) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        if let Some(status) = status {
            state.session.status = status;
            state.session.error = None;
        }
        state.generation
    }

    /// Apply `update` if `generation` is still the latest action
    fn commit<F>(&self, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(
                "Discarding stale session response (generation {} < {})",
                generation, state.generation
            );
            return false;
        }
        update(&mut state.session);
        true
    }

    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().session.is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.lock().session.user.clone()
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> GatewayResult<User> {
        let generation = self.begin(Some(SessionStatus::Authenticating));
        let result = self.gateway.login(credentials).await;
        self.finish_authentication(generation, result, "Login failed")
    }

    pub async fn register(&self, data: &RegisterData) -> GatewayResult<User> {
        let generation = self.begin(Some(SessionStatus::Authenticating));
        let result = self.gateway.register(data).await;
        self.finish_authentication(generation, result, "Registration failed")
    }

    fn finish_authentication(
        &self,
        generation: u64,
        result: GatewayResult<shared::AuthResponse>,
        fallback: &str,
    ) -> GatewayResult<User> {
        match result {
            Ok(response) => {
                let user = response.user.clone();
                let applied = self.commit(generation, |session| {
                    session.user = Some(response.user);
                    session.status = SessionStatus::Authenticated;
                    session.error = None;
                });
                if !applied {
                    return Err(GatewayError::superseded());
                }
                if let Err(e) = self.credentials.save_token(&response.token) {
                    warn!("Failed to persist credential token: {}", e);
                }
                info!("Signed in as {}", user.email);
                Ok(user)
            }
            Err(error) => {
                let message = error.to_string();
                let message = if message.is_empty() { fallback.to_string() } else { message };
                self.commit(generation, |session| {
                    session.user = None;
                    session.status = SessionStatus::Anonymous;
                    session.error = Some(message);
                });
                Err(error)
            }
        }
    }

    /// End the session. The server call is best effort; the local session is
    /// always reset unless a newer action started in the meantime.
    pub async fn logout(&self) {
        let generation = self.begin(None);

        if let Err(e) = self.gateway.logout().await {
            warn!("Server-side logout failed: {}", e);
        }

        let applied = self.commit(generation, |session| *session = Session::default());
        if applied {
            if let Err(e) = self.credentials.clear_token() {
                warn!("Failed to clear credential token: {}", e);
            }
            info!("Signed out");
        }
    }

    /// Validate a persisted credential at startup. Returns whether a user is
    /// signed in. Failures leave the session anonymous without an error.
    pub async fn initialize_auth(&self) -> bool {
        let token = match self.credentials.load_token() {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to load credential token: {}", e);
                None
            }
        };

        let generation = self.begin(Some(SessionStatus::Checking));
        if token.is_none() {
            self.commit(generation, |session| *session = Session::default());
            return false;
        }

        match self.gateway.current_user().await {
            Ok(user) => self.commit(generation, |session| {
                session.user = Some(user);
                session.status = SessionStatus::Authenticated;
                session.error = None;
            }),
            Err(error) => {
                debug!("Persisted credential rejected: {}", error);
                let applied = self.commit(generation, |session| *session = Session::default());
                // A network failure keeps the token for the next start
                if applied && matches!(error, GatewayError::Auth { .. }) {
                    if let Err(e) = self.credentials.clear_token() {
                        warn!("Failed to clear credential token: {}", e);
                    }
                }
                false
            }
        }
    }

    /// Sign out locally because the backend no longer accepts the credential.
    /// Does nothing unless a user is signed in.
    pub fn expire(&self) {
        expire_session(&self.state, self.credentials.as_ref());
    }

    /// Hook to install on the gateway so a 401 from any call ends the session
    pub fn expiry_hook(&self) -> UnauthorizedHook {
        let state = Arc::downgrade(&self.state);
        let credentials = self.credentials.clone();
        Arc::new(move || {
            if let Some(state) = state.upgrade() {
                expire_session(&state, credentials.as_ref());
            }
        })
    }

    pub fn clear_error(&self) {
        self.lock().session.error = None;
    }

    /// Replace the signed-in user, e.g. after a profile refresh
    pub fn set_user(&self, user: Option<User>) {
        let mut state = self.lock();
        state.session.status = if user.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        };
        state.session.user = user;
    }
}
