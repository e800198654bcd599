//! # Domain Module
//!
//! Contains the client-side logic of the finance tracker.
//!
//! This module turns gateway responses into the state and figures the user
//! sees. It operates independently of any presentation layer: everything here
//! is driven through plain method calls, and all backend access goes through
//! the [`crate::io::Gateway`] trait.
//!
//! ## Module Organization
//!
//! - **formatting**: currency, number, date and text display helpers
//! - **dashboard**: pure aggregation of accounts and transactions
//! - **session**: authentication state and its transitions
//! - **notifications**: the self-expiring notification queue
//! - **ui_signals**: sidebar flag, theme and the notification queue
//! - **account_link**: bank-link handshake and account disconnect
//! - **account_service**, **transaction_service**, **category_service**:
//!   cached reads and mutations of the backend entities
//!
//! ## Consistency Model
//!
//! Reads go through the query cache. Successful mutations never patch cached
//! data; they invalidate the affected scopes so the next read refetches, and
//! they report their result as a notification.

pub mod account_link;
pub mod account_service;
pub mod category_service;
pub mod dashboard;
pub mod formatting;
pub mod notifications;
pub mod session;
pub mod transaction_service;
pub mod ui_signals;

pub use account_link::{AccountLinkFlow, LinkOutcome, LinkState, LinkWidget, PendingDisconnect, WidgetEvent};
pub use account_service::AccountService;
pub use category_service::CategoryService;
pub use dashboard::DashboardSummary;
pub use notifications::NotificationQueue;
pub use session::{Session, SessionStatus, SessionStore};
pub use transaction_service::TransactionService;
pub use ui_signals::UiSignals;
