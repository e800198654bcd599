use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default duration for a notification before it expires on its own
pub const DEFAULT_NOTIFICATION_DURATION_MS: i64 = 5000;

/// Authenticated user as returned by the auth endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Role flag
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Kind of bank account as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
    Investment,
    /// Anything the client does not model explicitly (loans, depository, ...)
    #[serde(other)]
    Other,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountType::Checking => "Checking",
            AccountType::Savings => "Savings",
            AccountType::Credit => "Credit",
            AccountType::Investment => "Investment",
            AccountType::Other => "Other",
        };
        write!(f, "{}", label)
    }
}

/// A linked bank account.
///
/// `balance_available` falls back to `balance_current` when the backend does
/// not report a separate available balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AccountRecord")]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub institution_name: String,
    pub account_type: AccountType,
    pub balance_current: f64,
    pub balance_available: f64,
    pub currency: String,
    pub active: bool,
    pub plaid_account_id: Option<String>,
    pub last_sync_at: Option<String>,
    pub formatted_balance: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Wire shape of an account before defaults are applied
#[derive(Deserialize)]
struct AccountRecord {
    id: i64,
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    institution_name: Option<String>,
    account_type: AccountType,
    balance_current: f64,
    #[serde(default)]
    balance_available: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    plaid_account_id: Option<String>,
    #[serde(default)]
    last_sync_at: Option<String>,
    #[serde(default)]
    formatted_balance: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

fn default_true() -> bool {
    true
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name.unwrap_or_else(|| record.name.clone()),
            name: record.name,
            institution_name: record.institution_name.unwrap_or_default(),
            account_type: record.account_type,
            balance_current: record.balance_current,
            balance_available: record.balance_available.unwrap_or(record.balance_current),
            currency: record.currency.unwrap_or_else(|| "USD".to_string()),
            active: record.active,
            plaid_account_id: record.plaid_account_id,
            last_sync_at: record.last_sync_at,
            formatted_balance: record.formatted_balance,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountsSummary {
    pub total_balance: f64,
    pub total_available: f64,
    pub account_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountsResponse {
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub summary: AccountsSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account: Account,
}

/// Denormalized account fields embedded in a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub account_type: AccountType,
}

/// Category reference embedded in a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
    pub color: String,
    /// Backend-supplied "Parent > Child" breadcrumb
    pub full_name: String,
}

/// A synchronized bank transaction.
///
/// `amount` is signed exactly as the backend delivers it. Direction is taken
/// from `is_expense` / `is_income`, never inferred from the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub amount: f64,
    #[serde(default)]
    pub amount_display: Option<f64>,
    #[serde(default)]
    pub formatted_amount: Option<String>,
    pub description: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    pub date: NaiveDate,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub is_expense: bool,
    #[serde(default)]
    pub is_income: bool,
    #[serde(default)]
    pub plaid_transaction_id: Option<String>,
    /// Provider category label
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub account: AccountRef,
    #[serde(default)]
    pub primary_category: Option<CategoryRef>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Transaction {
    /// Name shown in lists: merchant when known, otherwise the description
    pub fn display_name(&self) -> &str {
        self.merchant_name.as_deref().unwrap_or(&self.description)
    }

    pub fn is_categorized(&self) -> bool {
        self.primary_category.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total_count: u32,
    pub total_pages: u32,
}

/// Totals over a set of transactions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionsSummary {
    pub total_count: u32,
    pub total_expenses: f64,
    pub total_income: f64,
    pub net_amount: f64,
    pub pending_count: u32,
    pub uncategorized_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub summary: TransactionsSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expenses,
    Income,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSort {
    DateAsc,
    DateDesc,
    AmountAsc,
    AmountDesc,
}

/// Filter parameters for the transaction list endpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<TransactionSort>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizeRequest {
    pub category_id: i64,
    pub confidence_score: f64,
}

/// Spending category. Categories form a tree through `parent_category_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Monthly budget limit
    #[serde(default)]
    pub budget_limit: Option<f64>,
    #[serde(default)]
    pub parent_category_id: Option<i64>,
    /// Backend-supplied "Parent > Child" breadcrumb
    pub full_name: String,
    #[serde(default)]
    pub child_categories: Vec<Category>,
    #[serde(default)]
    pub transaction_count: Option<u32>,
    #[serde(default)]
    pub total_spent: Option<f64>,
    #[serde(default)]
    pub budget_utilization: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub category: Category,
}

/// Fields for creating or updating a category; absent fields are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_category_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRequest {
    pub category: CategoryInput,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub user: RegisterData,
}

/// Response of login and registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

/// Result of a re-synchronization request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncResponse {
    pub message: String,
    pub transactions_created: u32,
    pub transactions_updated: u32,
    pub last_sync_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkTokenResponse {
    pub link_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTokenRequest {
    pub public_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// Connection status of the bank-link provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub connected: bool,
    #[serde(default)]
    pub accounts_count: u32,
    #[serde(default)]
    pub last_sync: Option<String>,
}

/// Error reported by the bank-link widget when it exits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkError {
    #[serde(default)]
    pub error_type: String,
    pub error_code: String,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Message the provider suggests showing to the user
    #[serde(default)]
    pub display_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkInstitution {
    pub name: String,
    pub institution_id: String,
}

/// Metadata passed alongside widget callbacks
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkMetadata {
    pub link_session_id: Option<String>,
    pub institution: Option<LinkInstitution>,
    pub status: Option<String>,
}

/// What happens to an account's data when it is disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectOptions {
    /// Delete the historical transactions of the account
    pub remove_transactions: bool,
    /// Remove the account entirely instead of marking it inactive
    pub remove_account: bool,
    /// Keep category assignments when transactions are removed
    pub keep_categories: bool,
}

impl Default for DisconnectOptions {
    fn default() -> Self {
        Self {
            remove_transactions: false,
            remove_account: false,
            keep_categories: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSummary {
    pub transactions_removed: u32,
    pub classifications_removed: u32,
    pub account_deactivated: bool,
    pub plaid_ids_cleared: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub account: Option<Account>,
    #[serde(default)]
    pub cleanup_summary: CleanupSummary,
}

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

/// A transient message shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Opaque random token
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Zero or negative persists until dismissed
    pub duration_ms: i64,
}

impl Notification {
    pub fn is_persistent(&self) -> bool {
        self.duration_ms <= 0
    }
}

/// A notification before it is queued and assigned an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// `None` uses the default duration
    pub duration_ms: Option<i64>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            duration_ms: None,
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Keep the notification until it is dismissed explicitly
    pub fn persistent(self) -> Self {
        self.with_duration(0)
    }

    pub fn effective_duration_ms(&self) -> i64 {
        self.duration_ms.unwrap_or(DEFAULT_NOTIFICATION_DURATION_MS)
    }
}

/// Color scheme of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Unknown theme: {}", other)),
        }
    }
}
