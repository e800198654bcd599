//! Scripted gateway and fixture builders shared by the unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared::{
    Account, AccountRef, AccountType, AccountsResponse, AuthResponse, CategoriesResponse, Category,
    CategoryInput, CategoryRef, DisconnectOptions, DisconnectResponse, ExchangeResponse, LinkStatus,
    LinkTokenResponse, LoginCredentials, MessageResponse, RegisterData, SyncResponse, Transaction,
    TransactionFilters, TransactionsResponse, User,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::error::{GatewayError, GatewayResult};
use crate::io::gateway::{Gateway, UnauthorizedHook};

/// Gateway whose answers are queued per method name.
///
/// The last queued answer of a method is repeated for further calls. A method
/// without any answer fails with a network error.
#[derive(Default)]
pub struct MockGateway {
    responses: Mutex<HashMap<&'static str, VecDeque<GatewayResult<Value>>>>,
    calls: Mutex<Vec<(&'static str, String)>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
    unauthorized: Mutex<Option<UnauthorizedHook>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond<T: Serialize>(&self, method: &'static str, value: T) -> &Self {
        let value = serde_json::to_value(value).expect("fixture must serialize");
        self.push(method, Ok(value))
    }

    pub fn fail(&self, method: &'static str, error: GatewayError) -> &Self {
        self.push(method, Err(error))
    }

    fn push(&self, method: &'static str, answer: GatewayResult<Value>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .push_back(answer);
        self
    }

    /// Block calls to `method` until the returned handle is notified, once per call
    pub fn hold(&self, method: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(method, gate.clone());
        gate
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(m, _)| *m == method).count()
    }

    /// Arguments of every call to `method`, in call order
    pub fn call_args(&self, method: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| *m == method)
            .map(|(_, args)| args.clone())
            .collect()
    }

    async fn answer<T: DeserializeOwned>(&self, method: &'static str, args: String) -> GatewayResult<T> {
        self.calls.lock().unwrap().push((method, args));

        let gate = self.gates.lock().unwrap().get(method).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let answer = {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(method) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match answer {
            Some(Ok(value)) => serde_json::from_value(value)
                .map_err(|e| GatewayError::network(format!("Bad fixture for {}: {}", method, e))),
            Some(Err(error)) => {
                if error.is_auth() {
                    let hook = self.unauthorized.lock().unwrap().clone();
                    if let Some(hook) = hook {
                        hook();
                    }
                }
                Err(error)
            }
            None => Err(GatewayError::network(format!("No scripted response for {}", method))),
        }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    fn on_unauthorized(&self, hook: UnauthorizedHook) {
        *self.unauthorized.lock().unwrap() = Some(hook);
    }

    async fn login(&self, credentials: &LoginCredentials) -> GatewayResult<AuthResponse> {
        self.answer("login", credentials.email.clone()).await
    }

    async fn register(&self, data: &RegisterData) -> GatewayResult<AuthResponse> {
        self.answer("register", data.email.clone()).await
    }

    async fn logout(&self) -> GatewayResult<()> {
        self.answer("logout", String::new()).await
    }

    async fn current_user(&self) -> GatewayResult<User> {
        self.answer("current_user", String::new()).await
    }

    async fn list_accounts(&self) -> GatewayResult<AccountsResponse> {
        self.answer("list_accounts", String::new()).await
    }

    async fn get_account(&self, account_id: i64) -> GatewayResult<Account> {
        self.answer("get_account", account_id.to_string()).await
    }

    async fn sync_account(&self, account_id: i64) -> GatewayResult<SyncResponse> {
        self.answer("sync_account", account_id.to_string()).await
    }

    async fn list_transactions(&self, filters: &TransactionFilters) -> GatewayResult<TransactionsResponse> {
        let args = serde_json::to_string(filters).unwrap_or_default();
        self.answer("list_transactions", args).await
    }

    async fn sync_transactions(&self, account_id: Option<i64>) -> GatewayResult<SyncResponse> {
        self.answer("sync_transactions", format!("{:?}", account_id)).await
    }

    async fn categorize_transaction(
        &self,
        transaction_id: i64,
        category_id: i64,
        confidence_score: f64,
    ) -> GatewayResult<MessageResponse> {
        let args = format!("{} {} {}", transaction_id, category_id, confidence_score);
        self.answer("categorize_transaction", args).await
    }

    async fn list_categories(&self) -> GatewayResult<CategoriesResponse> {
        self.answer("list_categories", String::new()).await
    }

    async fn create_category(&self, input: &CategoryInput) -> GatewayResult<Category> {
        let args = serde_json::to_string(input).unwrap_or_default();
        self.answer("create_category", args).await
    }

    async fn update_category(&self, category_id: i64, input: &CategoryInput) -> GatewayResult<Category> {
        let args = format!("{} {}", category_id, serde_json::to_string(input).unwrap_or_default());
        self.answer("update_category", args).await
    }

    async fn delete_category(&self, category_id: i64) -> GatewayResult<MessageResponse> {
        self.answer("delete_category", category_id.to_string()).await
    }

    async fn create_link_token(&self) -> GatewayResult<LinkTokenResponse> {
        self.answer("create_link_token", String::new()).await
    }

    async fn exchange_public_token(&self, public_token: &str) -> GatewayResult<ExchangeResponse> {
        self.answer("exchange_public_token", public_token.to_string()).await
    }

    async fn sync_all_linked_accounts(&self) -> GatewayResult<SyncResponse> {
        self.answer("sync_all_linked_accounts", String::new()).await
    }

    async fn sync_linked_account(&self, account_id: i64) -> GatewayResult<SyncResponse> {
        self.answer("sync_linked_account", account_id.to_string()).await
    }

    async fn disconnect_account(
        &self,
        account_id: i64,
        options: &DisconnectOptions,
    ) -> GatewayResult<DisconnectResponse> {
        let args = format!("{} {}", account_id, serde_json::to_string(options).unwrap_or_default());
        self.answer("disconnect_account", args).await
    }

    async fn link_status(&self) -> GatewayResult<LinkStatus> {
        self.answer("link_status", String::new()).await
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn user(id: i64, email: &str) -> User {
    User {
        id,
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        admin: false,
        created_at: None,
        updated_at: None,
    }
}

pub fn auth_response(token: &str, user: User) -> AuthResponse {
    AuthResponse {
        message: "Login successful".to_string(),
        token: token.to_string(),
        user,
    }
}

pub fn account(id: i64, account_type: AccountType, current: f64, available: f64) -> Account {
    Account {
        id,
        name: format!("Account {}", id),
        display_name: format!("Account {}", id),
        institution_name: "Test Bank".to_string(),
        account_type,
        balance_current: current,
        balance_available: available,
        currency: "USD".to_string(),
        active: true,
        plaid_account_id: Some(format!("plaid-{}", id)),
        last_sync_at: None,
        formatted_balance: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn accounts_response(accounts: Vec<Account>) -> AccountsResponse {
    AccountsResponse {
        summary: shared::AccountsSummary {
            total_balance: accounts.iter().map(|a| a.balance_current).sum(),
            total_available: accounts.iter().map(|a| a.balance_available).sum(),
            account_count: accounts.len() as u32,
        },
        accounts,
    }
}

pub fn category(id: i64, name: &str, budget_limit: Option<f64>) -> Category {
    Category {
        id,
        name: name.to_string(),
        color: "#3b82f6".to_string(),
        description: None,
        budget_limit,
        parent_category_id: None,
        full_name: name.to_string(),
        child_categories: Vec::new(),
        transaction_count: None,
        total_spent: None,
        budget_utilization: None,
        created_at: None,
        updated_at: None,
    }
}

fn transaction(id: i64, amount: f64, on: NaiveDate, is_expense: bool, category: Option<(i64, &str)>) -> Transaction {
    Transaction {
        id,
        amount,
        amount_display: Some(amount.abs()),
        formatted_amount: None,
        description: format!("Transaction {}", id),
        merchant_name: None,
        date: on,
        currency: "USD".to_string(),
        pending: false,
        is_expense,
        is_income: !is_expense,
        plaid_transaction_id: None,
        category: None,
        subcategory: None,
        account: AccountRef {
            id: 1,
            name: "Checking".to_string(),
            display_name: "Checking".to_string(),
            account_type: AccountType::Checking,
        },
        primary_category: category.map(|(id, name)| CategoryRef {
            id,
            name: name.to_string(),
            color: "#3b82f6".to_string(),
            full_name: name.to_string(),
        }),
        created_at: None,
        updated_at: None,
    }
}

pub fn expense(id: i64, amount: f64, on: NaiveDate, category: Option<(i64, &str)>) -> Transaction {
    transaction(id, amount, on, true, category)
}

pub fn income(id: i64, amount: f64, on: NaiveDate) -> Transaction {
    transaction(id, amount, on, false, None)
}

pub fn transactions_response(transactions: Vec<Transaction>) -> TransactionsResponse {
    TransactionsResponse {
        pagination: shared::Pagination {
            current_page: 1,
            per_page: transactions.len() as u32,
            total_count: transactions.len() as u32,
            total_pages: 1,
        },
        summary: Default::default(),
        transactions,
    }
}
