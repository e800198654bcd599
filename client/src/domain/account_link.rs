//! # Account Link Flow
//!
//! Drives the bank-link handshake: fetch a short-lived link token, open the
//! external widget with it, then exchange the widget's public token for
//! durable access. Results are reported through notifications and the
//! account queries are invalidated so the new accounts show up on the next
//! read.
//!
//! ```text
//! idle -> token_requested -> widget_open -> exchanging -> idle
//!                                       \-> idle (widget closed or failed)
//! ```
//!
//! The widget itself is an external collaborator behind [`LinkWidget`]. A
//! widget that reports through callbacks instead of a return value can call
//! [`AccountLinkFlow::handle_success`] and [`AccountLinkFlow::handle_exit`]
//! directly.
//!
//! Disconnecting an account is a two-step flow: [`AccountLinkFlow::request_disconnect`]
//! produces a [`PendingDisconnect`] to confirm, and only
//! [`AccountLinkFlow::confirm_disconnect`] reaches the gateway. Dropping the
//! pending value cancels.

use async_trait::async_trait;
use log::{debug, info, warn};
use shared::{
    Account, CleanupSummary, DisconnectOptions, DisconnectResponse, LinkError, LinkMetadata,
    LinkTokenResponse, NewNotification,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::notifications::NotificationQueue;
use crate::error::{link_error_message, GatewayError, GatewayResult};
use crate::io::{scopes, Gateway, QueryCache, QueryKey};

/// Summary line for the informational notification after a disconnect
pub fn cleanup_summary_message(summary: &CleanupSummary) -> String {
    let mut message = format!(
        "Removed {} transaction(s) and {} category assignment(s).",
        summary.transactions_removed, summary.classifications_removed
    );
    if summary.account_deactivated {
        message.push_str(" The account was deactivated.");
    }
    if summary.plaid_ids_cleared {
        message.push_str(" Bank link credentials were cleared.");
    }
    message
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    TokenRequested,
    WidgetOpen,
    Exchanging,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Linked { accounts: Vec<Account> },
    /// The user closed the widget
    Cancelled,
    Failed { error: GatewayError },
    /// No link token yet, or another link is in progress
    NotReady,
}

/// What the widget reports when it closes
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    Success {
        public_token: String,
        metadata: LinkMetadata,
    },
    Exit {
        error: Option<LinkError>,
        metadata: LinkMetadata,
    },
}

/// The external bank-link widget
#[async_trait]
pub trait LinkWidget: Send + Sync {
    /// Open the widget with `link_token` and wait until the user finishes or leaves it
    async fn open(&self, link_token: &str) -> WidgetEvent;
}

/// An account waiting for the user to confirm the disconnect
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDisconnect {
    account: Account,
}

impl PendingDisconnect {
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Options preselected in the confirmation step
    pub fn default_options(&self) -> DisconnectOptions {
        DisconnectOptions::default()
    }
}

pub struct AccountLinkFlow {
    gateway: Arc<dyn Gateway>,
    cache: Arc<QueryCache>,
    notifications: NotificationQueue,
    link_token_stale_time: Duration,
    state: Mutex<LinkState>,
}

impl AccountLinkFlow {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        cache: Arc<QueryCache>,
        notifications: NotificationQueue,
        link_token_stale_time: Duration,
    ) -> Self {
        Self {
            gateway,
            cache,
            notifications,
            link_token_stale_time,
            state: Mutex::new(LinkState::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> LinkState {
        *self.lock()
    }

    fn set_state(&self, state: LinkState) {
        debug!("Link flow: {:?}", state);
        *self.lock() = state;
    }

    /// Move from idle to `next`; fails if a link is already in progress
    fn start(&self, next: LinkState) -> bool {
        let mut state = self.lock();
        if *state != LinkState::Idle {
            return false;
        }
        *state = next;
        true
    }

    fn link_token_key() -> QueryKey {
        QueryKey::new(scopes::LINK_TOKEN)
    }

    /// Fetch a link token, reusing a cached one while it is fresh
    pub async fn request_link_token(&self) -> GatewayResult<String> {
        let gateway = self.gateway.clone();
        let response: LinkTokenResponse = self
            .cache
            .get_or_fetch(Self::link_token_key(), self.link_token_stale_time, || async move {
                gateway.create_link_token().await
            })
            .await?;
        Ok(response.link_token)
    }

    /// Fetch a link token, open the widget and finish the handshake
    pub async fn run(&self, widget: &dyn LinkWidget) -> LinkOutcome {
        if !self.start(LinkState::TokenRequested) {
            return self.not_ready();
        }
        let _reset = ResetOnDrop(self);

        let link_token = match self.request_link_token().await {
            Ok(token) => token,
            Err(error) => {
                warn!("Failed to create link token: {}", error);
                self.set_state(LinkState::Idle);
                self.notifications
                    .add(NewNotification::error("Connection Unavailable", error.to_string()));
                return LinkOutcome::Failed { error };
            }
        };

        self.open_widget(widget, &link_token).await
    }

    /// Open the widget with an already fetched link token
    pub async fn launch(&self, widget: &dyn LinkWidget) -> LinkOutcome {
        let cached: Option<LinkTokenResponse> = self.cache.get(&Self::link_token_key(), self.link_token_stale_time);
        let link_token = match cached {
            Some(response) => response.link_token,
            None => return self.not_ready(),
        };
        if !self.start(LinkState::TokenRequested) {
            return self.not_ready();
        }
        let _reset = ResetOnDrop(self);
        self.open_widget(widget, &link_token).await
    }

    fn not_ready(&self) -> LinkOutcome {
        self.notifications.add(NewNotification::warning(
            "Not Ready",
            "Please wait while we prepare the connection...",
        ));
        LinkOutcome::NotReady
    }

    async fn open_widget(&self, widget: &dyn LinkWidget, link_token: &str) -> LinkOutcome {
        self.set_state(LinkState::WidgetOpen);
        match widget.open(link_token).await {
            WidgetEvent::Success { public_token, metadata } => self.handle_success(&public_token, &metadata).await,
            WidgetEvent::Exit { error, metadata } => self.handle_exit(error, &metadata),
        }
    }

    /// Widget success callback: exchange the public token
    pub async fn handle_success(&self, public_token: &str, metadata: &LinkMetadata) -> LinkOutcome {
        self.set_state(LinkState::Exchanging);
        if let Some(institution) = &metadata.institution {
            info!("Exchanging public token for {}", institution.name);
        }

        let outcome = match self.gateway.exchange_public_token(public_token).await {
            Ok(response) => {
                for scope in [scopes::ACCOUNTS, scopes::TRANSACTIONS, scopes::LINK_STATUS] {
                    self.cache.invalidate(scope);
                }
                self.notifications.add(NewNotification::success(
                    "Bank Connected!",
                    format!("Successfully connected {} account(s).", response.accounts.len()),
                ));
                LinkOutcome::Linked {
                    accounts: response.accounts,
                }
            }
            Err(error) => {
                warn!("Public token exchange failed: {}", error);
                self.notifications.add(NewNotification::error(
                    "Connection Failed",
                    message_or(&error, "Failed to connect bank account."),
                ));
                LinkOutcome::Failed { error }
            }
        };

        self.set_state(LinkState::Idle);
        outcome
    }

    /// Widget exit callback. Leaving without an error is a silent cancel.
    pub fn handle_exit(&self, error: Option<LinkError>, metadata: &LinkMetadata) -> LinkOutcome {
        self.set_state(LinkState::Idle);

        match error {
            None => {
                debug!("Link widget closed (session {:?})", metadata.link_session_id);
                LinkOutcome::Cancelled
            }
            Some(link_error) => {
                warn!("Link widget exited with {}", link_error.error_code);
                self.notifications.add(NewNotification::error(
                    "Connection Cancelled",
                    link_error_message(&link_error),
                ));
                LinkOutcome::Failed {
                    error: GatewayError::ExternalWidget(link_error),
                }
            }
        }
    }

    pub fn request_disconnect(&self, account: Account) -> PendingDisconnect {
        PendingDisconnect { account }
    }

    pub async fn confirm_disconnect(
        &self,
        pending: PendingDisconnect,
        options: DisconnectOptions,
    ) -> GatewayResult<DisconnectResponse> {
        let account_id = pending.account.id;
        info!("Disconnecting account {} with {:?}", account_id, options);

        match self.gateway.disconnect_account(account_id, &options).await {
            Ok(response) => {
                for scope in [
                    scopes::ACCOUNTS,
                    scopes::TRANSACTIONS,
                    scopes::CATEGORIES,
                    scopes::LINK_STATUS,
                ] {
                    self.cache.invalidate(scope);
                }
                self.notifications.add(NewNotification::success(
                    "Account Disconnected",
                    "Account has been disconnected.",
                ));
                self.notifications.add(NewNotification::info(
                    "Cleanup Summary",
                    cleanup_summary_message(&response.cleanup_summary),
                ));
                Ok(response)
            }
            Err(error) => {
                warn!("Disconnect of account {} failed: {}", account_id, error);
                self.notifications.add(NewNotification::error(
                    "Disconnect Failed",
                    message_or(&error, "Failed to disconnect account."),
                ));
                Err(error)
            }
        }
    }
}

/// Returns the flow to idle when a started handshake ends, including when
/// the caller drops it while the widget is open
struct ResetOnDrop<'a>(&'a AccountLinkFlow);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        if *state != LinkState::Idle {
            debug!("Link flow abandoned in {:?}", *state);
            *state = LinkState::Idle;
        }
    }
}

pub(crate) fn message_or(error: &GatewayError, fallback: &str) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::test_utils::{account, MockGateway};
    use shared::{AccountType, ExchangeResponse, LinkInstitution, NotificationKind};

    const STALE: Duration = Duration::from_secs(300);

    struct ScriptedWidget {
        event: WidgetEvent,
        opened_with: Mutex<Vec<String>>,
    }

    impl ScriptedWidget {
        fn new(event: WidgetEvent) -> Self {
            Self {
                event,
                opened_with: Mutex::new(Vec::new()),
            }
        }

        fn succeeding() -> Self {
            Self::new(WidgetEvent::Success {
                public_token: "public-sandbox-123".to_string(),
                metadata: LinkMetadata {
                    institution: Some(LinkInstitution {
                        name: "First Platypus Bank".to_string(),
                        institution_id: "ins_109508".to_string(),
                    }),
                    ..Default::default()
                },
            })
        }

        fn exiting(error: Option<LinkError>) -> Self {
            Self::new(WidgetEvent::Exit {
                error,
                metadata: LinkMetadata::default(),
            })
        }

        fn opened_with(&self) -> Vec<String> {
            self.opened_with.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LinkWidget for ScriptedWidget {
        async fn open(&self, link_token: &str) -> WidgetEvent {
            self.opened_with.lock().unwrap().push(link_token.to_string());
            self.event.clone()
        }
    }

    fn link_error(code: &str, display_message: Option<&str>) -> LinkError {
        LinkError {
            error_type: "ITEM_ERROR".to_string(),
            error_code: code.to_string(),
            error_message: None,
            display_message: display_message.map(str::to_string),
        }
    }

    struct Fixture {
        gateway: Arc<MockGateway>,
        cache: Arc<QueryCache>,
        notifications: NotificationQueue,
        flow: AccountLinkFlow,
    }

    fn fixture() -> Fixture {
        let gateway = Arc::new(MockGateway::new());
        gateway.respond("create_link_token", LinkTokenResponse {
            link_token: "link-sandbox-abc".to_string(),
        });
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
        let notifications = NotificationQueue::default();
        let flow = AccountLinkFlow::new(gateway.clone(), cache.clone(), notifications.clone(), STALE);
        Fixture {
            gateway,
            cache,
            notifications,
            flow,
        }
    }

    async fn warm(cache: &QueryCache, scope: &'static str) {
        cache
            .get_or_fetch(QueryKey::new(scope), Duration::from_secs(60), || async { Ok(1u32) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_successful_link() {
        let f = fixture();
        f.gateway.respond("exchange_public_token", ExchangeResponse {
            message: "ok".to_string(),
            accounts: vec![
                account(1, AccountType::Checking, 100.0, 100.0),
                account(2, AccountType::Savings, 500.0, 500.0),
            ],
        });
        warm(&f.cache, scopes::ACCOUNTS).await;
        warm(&f.cache, scopes::CATEGORIES).await;

        let widget = ScriptedWidget::succeeding();
        let outcome = f.flow.run(&widget).await;

        match outcome {
            LinkOutcome::Linked { accounts } => assert_eq!(accounts.len(), 2),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(widget.opened_with(), vec!["link-sandbox-abc"]);
        assert_eq!(f.gateway.call_args("exchange_public_token"), vec!["public-sandbox-123"]);
        assert!(!f.cache.contains(&QueryKey::new(scopes::ACCOUNTS)));
        assert!(f.cache.contains(&QueryKey::new(scopes::CATEGORIES)));
        assert_eq!(f.flow.state(), LinkState::Idle);

        let notifications = f.notifications.list();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Success);
        assert_eq!(notifications[0].title, "Bank Connected!");
        assert_eq!(notifications[0].message, "Successfully connected 2 account(s).");
    }

    #[tokio::test]
    async fn test_closing_widget_is_silent() {
        let f = fixture();
        let outcome = f.flow.run(&ScriptedWidget::exiting(None)).await;

        assert_eq!(outcome, LinkOutcome::Cancelled);
        assert!(f.notifications.is_empty());
        assert_eq!(f.gateway.call_count("exchange_public_token"), 0);
        assert_eq!(f.flow.state(), LinkState::Idle);
    }

    #[tokio::test]
    async fn test_widget_error_is_mapped() {
        let f = fixture();
        let error = link_error("ITEM_LOCKED", None);
        let outcome = f.flow.run(&ScriptedWidget::exiting(Some(error.clone()))).await;

        assert_eq!(outcome, LinkOutcome::Failed { error: GatewayError::ExternalWidget(error) });
        let notifications = f.notifications.list();
        assert_eq!(notifications[0].kind, NotificationKind::Error);
        assert_eq!(notifications[0].title, "Connection Cancelled");
        assert_eq!(
            notifications[0].message,
            "Your account is temporarily locked. Please contact your bank."
        );
    }

    #[tokio::test]
    async fn test_exchange_failure_resets_to_idle() {
        let f = fixture();
        f.gateway.fail(
            "exchange_public_token",
            GatewayError::validation(422, "Invalid public token"),
        );
        warm(&f.cache, scopes::ACCOUNTS).await;

        let outcome = f.flow.run(&ScriptedWidget::succeeding()).await;

        assert!(matches!(outcome, LinkOutcome::Failed { .. }));
        assert_eq!(f.flow.state(), LinkState::Idle);
        assert!(f.cache.contains(&QueryKey::new(scopes::ACCOUNTS)));
        let notifications = f.notifications.list();
        assert_eq!(notifications[0].title, "Connection Failed");
        assert_eq!(notifications[0].message, "Invalid public token");
    }

    #[tokio::test]
    async fn test_link_token_is_reused_while_fresh() {
        let f = fixture();
        f.flow.run(&ScriptedWidget::exiting(None)).await;
        f.flow.run(&ScriptedWidget::exiting(None)).await;

        assert_eq!(f.gateway.call_count("create_link_token"), 1);
    }

    #[tokio::test]
    async fn test_launch_before_token_is_ready() {
        let f = fixture();
        let widget = ScriptedWidget::exiting(None);

        assert_eq!(f.flow.launch(&widget).await, LinkOutcome::NotReady);
        assert!(widget.opened_with().is_empty());
        let notifications = f.notifications.list();
        assert_eq!(notifications[0].kind, NotificationKind::Warning);
        assert_eq!(notifications[0].title, "Not Ready");

        f.flow.request_link_token().await.unwrap();
        assert_eq!(f.flow.launch(&widget).await, LinkOutcome::Cancelled);
        assert_eq!(widget.opened_with(), vec!["link-sandbox-abc"]);
    }

    struct StuckWidget;

    #[async_trait]
    impl LinkWidget for StuckWidget {
        async fn open(&self, _link_token: &str) -> WidgetEvent {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_abandoned_handshake_returns_to_idle() {
        let f = fixture();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), f.flow.run(&StuckWidget)).await;
        assert!(abandoned.is_err());
        assert_eq!(f.flow.state(), LinkState::Idle);

        let widget = ScriptedWidget::exiting(None);
        assert_eq!(f.flow.run(&widget).await, LinkOutcome::Cancelled);
        assert_eq!(widget.opened_with(), vec!["link-sandbox-abc"]);
        assert!(f.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_token_failure_is_reported() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail("create_link_token", GatewayError::network("Server error (503)"));
        let notifications = NotificationQueue::default();
        let flow = AccountLinkFlow::new(
            gateway,
            Arc::new(QueryCache::new(STALE)),
            notifications.clone(),
            STALE,
        );

        let widget = ScriptedWidget::succeeding();
        let outcome = flow.run(&widget).await;

        assert!(matches!(outcome, LinkOutcome::Failed { .. }));
        assert!(widget.opened_with().is_empty());
        assert_eq!(notifications.list()[0].title, "Connection Unavailable");
        assert_eq!(flow.state(), LinkState::Idle);
    }

    #[tokio::test]
    async fn test_pending_disconnect_defaults() {
        let f = fixture();
        let pending = f.flow.request_disconnect(account(9, AccountType::Checking, 0.0, 0.0));

        assert_eq!(pending.account().id, 9);
        let options = pending.default_options();
        assert!(!options.remove_transactions);
        assert!(!options.remove_account);
        assert!(options.keep_categories);

        drop(pending);
        assert_eq!(f.gateway.call_count("disconnect_account"), 0);
    }

    #[tokio::test]
    async fn test_disconnect_with_transaction_removal() {
        let f = fixture();
        f.gateway.respond("disconnect_account", DisconnectResponse {
            message: "Account disconnected".to_string(),
            account: None,
            cleanup_summary: CleanupSummary {
                transactions_removed: 42,
                classifications_removed: 0,
                account_deactivated: false,
                plaid_ids_cleared: true,
            },
        });
        warm(&f.cache, scopes::ACCOUNTS).await;
        warm(&f.cache, scopes::TRANSACTIONS).await;

        let pending = f.flow.request_disconnect(account(5, AccountType::Checking, 10.0, 10.0));
        let options = DisconnectOptions {
            remove_transactions: true,
            keep_categories: true,
            remove_account: false,
        };
        let response = f.flow.confirm_disconnect(pending, options).await.unwrap();

        let summary = &response.cleanup_summary;
        assert!(summary.transactions_removed > 0);
        assert_eq!(summary.classifications_removed, 0);
        assert!(!summary.account_deactivated);

        assert_eq!(
            f.gateway.call_args("disconnect_account"),
            vec![r#"5 {"remove_transactions":true,"remove_account":false,"keep_categories":true}"#]
        );
        assert!(!f.cache.contains(&QueryKey::new(scopes::ACCOUNTS)));
        assert!(!f.cache.contains(&QueryKey::new(scopes::TRANSACTIONS)));

        let notifications = f.notifications.list();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].title, "Account Disconnected");
        assert_eq!(notifications[1].kind, NotificationKind::Info);
        assert_eq!(
            notifications[1].message,
            "Removed 42 transaction(s) and 0 category assignment(s). Bank link credentials were cleared."
        );
    }

    #[tokio::test]
    async fn test_disconnect_failure_keeps_cache() {
        let f = fixture();
        f.gateway.fail("disconnect_account", GatewayError::validation(404, "Account not found"));
        warm(&f.cache, scopes::ACCOUNTS).await;

        let pending = f.flow.request_disconnect(account(5, AccountType::Checking, 10.0, 10.0));
        let result = f.flow.confirm_disconnect(pending, DisconnectOptions::default()).await;

        assert!(result.is_err());
        assert!(f.cache.contains(&QueryKey::new(scopes::ACCOUNTS)));
        let notifications = f.notifications.list();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Disconnect Failed");
        assert_eq!(notifications[0].message, "Account not found");
    }

    #[test]
    fn test_cleanup_summary_message() {
        let summary = CleanupSummary {
            transactions_removed: 3,
            classifications_removed: 2,
            account_deactivated: true,
            plaid_ids_cleared: false,
        };
        assert_eq!(
            cleanup_summary_message(&summary),
            "Removed 3 transaction(s) and 2 category assignment(s). The account was deactivated."
        );
    }
}
