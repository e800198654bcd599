//! HTTP implementation of the [`Gateway`] trait.
//!
//! Attaches the persisted bearer credential to every request, retries
//! query-type calls on transient failures with exponential backoff, and
//! clears the credential when the backend answers 401.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use shared::{
    Account, AccountResponse, AccountsResponse, AuthResponse, CategoriesResponse, Category,
    CategorizeRequest, CategoryInput, CategoryRequest, CategoryResponse, DisconnectOptions,
    DisconnectResponse, ExchangeResponse, ExchangeTokenRequest, LinkStatus, LinkTokenResponse,
    LoginCredentials, MessageResponse, RegisterData, RegisterRequest, SyncResponse,
    TransactionFilters, TransactionsResponse, User, UserResponse,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::gateway::{Gateway, UnauthorizedHook};
use crate::config::ClientConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::storage::CredentialStorage;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Retry behaviour for query-type calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub query_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero based): `min(base * 2^attempt, 30s)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Query,
    Mutation,
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStorage>,
    retry: RetryPolicy,
    unauthorized: Mutex<Option<UnauthorizedHook>>,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialStorage>) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credentials,
            retry: RetryPolicy {
                query_retries: config.query_retries,
                base_delay: config.retry_base_delay(),
            },
            unauthorized: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn token(&self) -> Option<String> {
        match self.credentials.load_token() {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to read stored credential: {}", e);
                None
            }
        }
    }

    async fn query<T, F>(&self, build: F) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        self.send(CallKind::Query, build).await
    }

    async fn mutation<T, F>(&self, build: F) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        self.send(CallKind::Mutation, build).await
    }

    async fn send<T, F>(&self, kind: CallKind, build: F) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let retries = match kind {
            CallKind::Query => self.retry.query_retries,
            CallKind::Mutation => 0,
        };

        let mut attempt = 0;
        loop {
            match self.send_once(build(&self.client)).await {
                Err(e) if e.is_transient() && attempt < retries => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Request failed ({}), retrying in {:?} (attempt {}/{})",
                        e,
                        delay,
                        attempt + 1,
                        retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let request = match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url());

        if status.is_success() {
            let bytes = response.bytes().await?;
            // Some endpoints answer with an empty body
            let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
            return serde_json::from_slice(body)
                .map_err(|e| GatewayError::network(format!("Failed to parse response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        let error = GatewayError::from_response(status.as_u16(), &body);
        if error.is_auth() {
            warn!("Backend rejected the credential, clearing it");
            if let Err(e) = self.credentials.clear_token() {
                error!("Failed to clear stored credential: {}", e);
            }
            let hook = self
                .unauthorized
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            if let Some(hook) = hook {
                hook();
            }
        }
        Err(error)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    fn on_unauthorized(&self, hook: UnauthorizedHook) {
        *self.unauthorized.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(hook);
    }

    async fn login(&self, credentials: &LoginCredentials) -> GatewayResult<AuthResponse> {
        let url = self.url("auth/login");
        self.mutation(|c| c.post(&url).json(credentials)).await
    }

    async fn register(&self, data: &RegisterData) -> GatewayResult<AuthResponse> {
        let url = self.url("auth/register");
        let body = RegisterRequest { user: data.clone() };
        self.mutation(|c| c.post(&url).json(&body)).await
    }

    async fn logout(&self) -> GatewayResult<()> {
        let url = self.url("auth/sessions");
        self.mutation::<IgnoredAny, _>(|c| c.delete(&url)).await?;
        Ok(())
    }

    async fn current_user(&self) -> GatewayResult<User> {
        let url = self.url("auth/me");
        let response: UserResponse = self.query(|c| c.get(&url)).await?;
        Ok(response.user)
    }

    async fn list_accounts(&self) -> GatewayResult<AccountsResponse> {
        let url = self.url("accounts");
        self.query(|c| c.get(&url)).await
    }

    async fn get_account(&self, account_id: i64) -> GatewayResult<Account> {
        let url = self.url(&format!("accounts/{}", account_id));
        let response: AccountResponse = self.query(|c| c.get(&url)).await?;
        Ok(response.account)
    }

    async fn sync_account(&self, account_id: i64) -> GatewayResult<SyncResponse> {
        let url = self.url(&format!("accounts/{}/sync", account_id));
        self.mutation(|c| c.post(&url)).await
    }

    async fn list_transactions(&self, filters: &TransactionFilters) -> GatewayResult<TransactionsResponse> {
        let url = self.url("transactions");
        self.query(|c| c.get(&url).query(filters)).await
    }

    async fn sync_transactions(&self, account_id: Option<i64>) -> GatewayResult<SyncResponse> {
        let url = self.url("transactions/sync");
        let body = serde_json::json!({ "account_id": account_id });
        self.mutation(|c| match account_id {
            Some(_) => c.post(&url).json(&body),
            None => c.post(&url),
        })
        .await
    }

    async fn categorize_transaction(
        &self,
        transaction_id: i64,
        category_id: i64,
        confidence_score: f64,
    ) -> GatewayResult<MessageResponse> {
        let url = self.url(&format!("transactions/{}/categorize", transaction_id));
        let body = CategorizeRequest { category_id, confidence_score };
        self.mutation(|c| c.put(&url).json(&body)).await
    }

    async fn list_categories(&self) -> GatewayResult<CategoriesResponse> {
        let url = self.url("categories");
        self.query(|c| c.get(&url)).await
    }

    async fn create_category(&self, input: &CategoryInput) -> GatewayResult<Category> {
        let url = self.url("categories");
        let body = CategoryRequest { category: input.clone() };
        let response: CategoryResponse = self.mutation(|c| c.post(&url).json(&body)).await?;
        Ok(response.category)
    }

    async fn update_category(&self, category_id: i64, input: &CategoryInput) -> GatewayResult<Category> {
        let url = self.url(&format!("categories/{}", category_id));
        let body = CategoryRequest { category: input.clone() };
        let response: CategoryResponse = self.mutation(|c| c.put(&url).json(&body)).await?;
        Ok(response.category)
    }

    async fn delete_category(&self, category_id: i64) -> GatewayResult<MessageResponse> {
        let url = self.url(&format!("categories/{}", category_id));
        self.mutation(|c| c.delete(&url)).await
    }

    async fn create_link_token(&self) -> GatewayResult<LinkTokenResponse> {
        let url = self.url("plaid/link_token");
        // Fetched like a query: cached and retried
        self.query(|c| c.post(&url)).await
    }

    async fn exchange_public_token(&self, public_token: &str) -> GatewayResult<ExchangeResponse> {
        let url = self.url("plaid/exchange_token");
        let body = ExchangeTokenRequest { public_token: public_token.to_string() };
        self.mutation(|c| c.post(&url).json(&body)).await
    }

    async fn sync_all_linked_accounts(&self) -> GatewayResult<SyncResponse> {
        let url = self.url("plaid/sync_all_accounts");
        self.mutation(|c| c.post(&url)).await
    }

    async fn sync_linked_account(&self, account_id: i64) -> GatewayResult<SyncResponse> {
        let url = self.url(&format!("plaid/sync/{}", account_id));
        self.mutation(|c| c.post(&url)).await
    }

    async fn disconnect_account(
        &self,
        account_id: i64,
        options: &DisconnectOptions,
    ) -> GatewayResult<DisconnectResponse> {
        let url = self.url(&format!("plaid/accounts/{}", account_id));
        self.mutation(|c| c.delete(&url).json(options)).await
    }

    async fn link_status(&self) -> GatewayResult<LinkStatus> {
        let url = self.url("plaid/status");
        self.query(|c| c.get(&url)).await
    }
}
