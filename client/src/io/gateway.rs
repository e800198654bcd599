//! # Gateway Trait
//!
//! The boundary to the backend REST API. The domain layer only ever talks to
//! this trait, so services can be exercised against a scripted implementation
//! in tests and against [`super::http_gateway::HttpGateway`] in production.
//!
//! Calls fall into two classes: *queries* (reads, plus the link token) are
//! retried on transient failure by the implementation; *mutations* are not.

use async_trait::async_trait;
use shared::{
    Account, AccountsResponse, AuthResponse, CategoriesResponse, Category, CategoryInput,
    DisconnectOptions, DisconnectResponse, ExchangeResponse, LinkStatus, LinkTokenResponse,
    LoginCredentials, MessageResponse, RegisterData, SyncResponse, TransactionFilters,
    TransactionsResponse, User,
};

use std::sync::Arc;

use crate::error::GatewayResult;

/// Run after the backend rejects the credential with a 401
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Install the hook run on every 401, replacing any previous one
    fn on_unauthorized(&self, hook: UnauthorizedHook);

    // Authentication

    async fn login(&self, credentials: &LoginCredentials) -> GatewayResult<AuthResponse>;

    async fn register(&self, data: &RegisterData) -> GatewayResult<AuthResponse>;

    /// Invalidate the server-side session
    async fn logout(&self) -> GatewayResult<()>;

    /// Validate the current credential and return its user
    async fn current_user(&self) -> GatewayResult<User>;

    // Accounts

    async fn list_accounts(&self) -> GatewayResult<AccountsResponse>;

    async fn get_account(&self, account_id: i64) -> GatewayResult<Account>;

    async fn sync_account(&self, account_id: i64) -> GatewayResult<SyncResponse>;

    // Transactions

    async fn list_transactions(&self, filters: &TransactionFilters) -> GatewayResult<TransactionsResponse>;

    /// Re-synchronize transactions, for one account or all of them
    async fn sync_transactions(&self, account_id: Option<i64>) -> GatewayResult<SyncResponse>;

    async fn categorize_transaction(
        &self,
        transaction_id: i64,
        category_id: i64,
        confidence_score: f64,
    ) -> GatewayResult<MessageResponse>;

    // Categories

    async fn list_categories(&self) -> GatewayResult<CategoriesResponse>;

    async fn create_category(&self, input: &CategoryInput) -> GatewayResult<Category>;

    async fn update_category(&self, category_id: i64, input: &CategoryInput) -> GatewayResult<Category>;

    async fn delete_category(&self, category_id: i64) -> GatewayResult<MessageResponse>;

    // Bank link

    /// Short-lived token used to initialize the bank-link widget
    async fn create_link_token(&self) -> GatewayResult<LinkTokenResponse>;

    /// Exchange the widget's one-time public token for durable access
    async fn exchange_public_token(&self, public_token: &str) -> GatewayResult<ExchangeResponse>;

    async fn sync_all_linked_accounts(&self) -> GatewayResult<SyncResponse>;

    async fn sync_linked_account(&self, account_id: i64) -> GatewayResult<SyncResponse>;

    async fn disconnect_account(
        &self,
        account_id: i64,
        options: &DisconnectOptions,
    ) -> GatewayResult<DisconnectResponse>;

    async fn link_status(&self) -> GatewayResult<LinkStatus>;
}
