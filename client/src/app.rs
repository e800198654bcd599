//! # Finance Client
//!
//! The explicit context object that wires configuration, storage, the
//! gateway, the query cache and every state container together. Each
//! instance is fully isolated; nothing here is process-global.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use shared::{Category, Theme, Transaction, TransactionFilters};
use std::path::Path;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::domain::dashboard::{self, CategoryBudget, DashboardSummary};
use crate::domain::ui_signals::detect_system_theme;
use crate::domain::{AccountLinkFlow, AccountService, CategoryService, SessionStore, TransactionService, UiSignals};
use crate::error::GatewayResult;
use crate::io::{Gateway, HttpGateway, QueryCache};
use crate::storage::{CredentialStorage, FileStore, PreferenceStorage};

/// Page size used when collecting a whole month of transactions
const MONTH_PAGE_SIZE: u32 = 250;

pub struct FinanceClient {
    config: ClientConfig,
    cache: Arc<QueryCache>,
    session: SessionStore,
    ui: UiSignals,
    link: AccountLinkFlow,
    accounts: AccountService,
    transactions: TransactionService,
    categories: CategoryService,
}

impl FinanceClient {
    pub fn new(
        config: ClientConfig,
        gateway: Arc<dyn Gateway>,
        credentials: Arc<dyn CredentialStorage>,
        preferences: Arc<dyn PreferenceStorage>,
        system_theme: Option<Theme>,
    ) -> Self {
        let cache = Arc::new(QueryCache::new(config.query_stale_time()));
        let ui = UiSignals::new(preferences, system_theme, config.notification_duration_ms);
        let notifications = ui.notifications().clone();
        let session = SessionStore::new(gateway.clone(), credentials);
        gateway.on_unauthorized(session.expiry_hook());

        Self {
            session,
            link: AccountLinkFlow::new(
                gateway.clone(),
                cache.clone(),
                notifications.clone(),
                config.link_token_stale_time(),
            ),
            accounts: AccountService::new(gateway.clone(), cache.clone(), notifications.clone()),
            transactions: TransactionService::new(gateway.clone(), cache.clone(), notifications.clone()),
            categories: CategoryService::new(gateway, cache.clone(), notifications),
            ui,
            cache,
            config,
        }
    }

    /// Build a client backed by the data directory and the HTTP gateway
    pub fn open(data_dir: &Path) -> Result<Self> {
        let config = ClientConfig::load_or_create(data_dir)?;
        let store = Arc::new(FileStore::new(data_dir)?);
        let gateway = Arc::new(HttpGateway::new(&config, store.clone())?);
        info!("Using API at {}", config.api_base_url);

        Ok(Self::new(config, gateway, store.clone(), store, detect_system_theme()))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn ui(&self) -> &UiSignals {
        &self.ui
    }

    pub fn link(&self) -> &AccountLinkFlow {
        &self.link
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn transactions(&self) -> &TransactionService {
        &self.transactions
    }

    pub fn categories(&self) -> &CategoryService {
        &self.categories
    }

    /// Drop every cached query
    pub fn refresh(&self) {
        self.cache.invalidate_all();
    }

    /// Every transaction dated in the month containing `month`, across all pages
    pub async fn month_transactions(&self, month: NaiveDate) -> GatewayResult<Vec<Transaction>> {
        let first = month.with_day(1).unwrap_or(month);
        let last = first
            .with_day(dashboard::days_in_month(first))
            .unwrap_or(first);

        let mut collected = Vec::new();
        let mut page = 1;
        loop {
            let filters = TransactionFilters {
                page: Some(page),
                per_page: Some(MONTH_PAGE_SIZE),
                start_date: Some(first),
                end_date: Some(last),
                ..Default::default()
            };
            let response = self.transactions.transactions(&filters).await?;
            let fetched = response.transactions.len();
            collected.extend(response.transactions);

            if fetched == 0 || page >= response.pagination.total_pages {
                break;
            }
            page += 1;
        }

        debug!("Collected {} transactions for {}", collected.len(), first);
        Ok(collected)
    }

    /// Dashboard figures for the month containing `month`. Accounts and
    /// transactions are fetched concurrently.
    pub async fn dashboard(&self, month: NaiveDate) -> GatewayResult<DashboardSummary> {
        let (accounts, transactions) = tokio::try_join!(self.accounts.accounts(), self.month_transactions(month))?;
        Ok(DashboardSummary::compute(&accounts.accounts, &transactions, month))
    }

    /// Budget progress of every category with a budget limit
    pub async fn budgets(&self, month: NaiveDate) -> GatewayResult<Vec<CategoryBudget>> {
        let (categories, transactions) =
            tokio::try_join!(self.categories.categories(), self.month_transactions(month))?;

        Ok(flatten(&categories.categories)
            .into_iter()
            .filter(|category| category.budget_limit.is_some())
            .map(|category| dashboard::category_budget_progress(category, &transactions, month))
            .collect())
    }
}

/// Categories and their descendants, depth first
fn flatten(categories: &[Category]) -> Vec<&Category> {
    let mut flat = Vec::new();
    for category in categories {
        flat.push(category);
        flat.extend(flatten(&category.child_categories));
    }
    flat
}
