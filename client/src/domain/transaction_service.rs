//! Transaction reads, categorization and re-synchronization.
//!
//! Transaction lists are cached per filter set. Any mutation drops every
//! cached list, since a single categorization can move a transaction in or
//! out of many filtered views.

use log::{info, warn};
use shared::{MessageResponse, NewNotification, SyncResponse, TransactionFilters, TransactionsResponse};
use std::sync::Arc;

use super::account_link::message_or;
use super::notifications::NotificationQueue;
use crate::error::GatewayResult;
use crate::io::{scopes, Gateway, QueryCache, QueryKey};

/// Confidence recorded for a manual categorization
pub const MANUAL_CONFIDENCE: f64 = 1.0;

pub struct TransactionService {
    gateway: Arc<dyn Gateway>,
    cache: Arc<QueryCache>,
    notifications: NotificationQueue,
}

impl TransactionService {
    pub fn new(gateway: Arc<dyn Gateway>, cache: Arc<QueryCache>, notifications: NotificationQueue) -> Self {
        Self {
            gateway,
            cache,
            notifications,
        }
    }

    pub async fn transactions(&self, filters: &TransactionFilters) -> GatewayResult<TransactionsResponse> {
        let gateway = self.gateway.clone();
        let owned = filters.clone();
        self.cache
            .get_or_fetch(
                QueryKey::with_params(scopes::TRANSACTIONS, filters),
                self.cache.default_stale_time(),
                || async move { gateway.list_transactions(&owned).await },
            )
            .await
    }

    /// Assign a category to a transaction. `confidence` defaults to [`MANUAL_CONFIDENCE`].
    pub async fn categorize(
        &self,
        transaction_id: i64,
        category_id: i64,
        confidence: Option<f64>,
    ) -> GatewayResult<MessageResponse> {
        let confidence = confidence.unwrap_or(MANUAL_CONFIDENCE);
        match self
            .gateway
            .categorize_transaction(transaction_id, category_id, confidence)
            .await
        {
            Ok(response) => {
                info!("Transaction {} categorized as {}", transaction_id, category_id);
                self.cache.invalidate(scopes::TRANSACTIONS);
                self.cache.invalidate(scopes::CATEGORIES);
                self.notifications.add(NewNotification::success(
                    "Transaction Categorized",
                    "The category has been updated.",
                ));
                Ok(response)
            }
            Err(error) => {
                warn!("Categorizing transaction {} failed: {}", transaction_id, error);
                self.notifications.add(NewNotification::error(
                    "Categorization Failed",
                    message_or(&error, "Failed to categorize transaction."),
                ));
                Err(error)
            }
        }
    }

    /// Re-synchronize transactions for one account, or for all of them
    pub async fn sync_transactions(&self, account_id: Option<i64>) -> GatewayResult<SyncResponse> {
        match self.gateway.sync_transactions(account_id).await {
            Ok(response) => {
                self.cache.invalidate(scopes::TRANSACTIONS);
                self.cache.invalidate(scopes::ACCOUNTS);
                self.notifications.add(NewNotification::success(
                    "Sync Complete",
                    format!(
                        "{} new and {} updated transaction(s).",
                        response.transactions_created, response.transactions_updated
                    ),
                ));
                Ok(response)
            }
            Err(error) => {
                warn!("Transaction sync failed: {}", error);
                self.notifications.add(NewNotification::error(
                    "Sync Failed",
                    message_or(&error, "Failed to sync transactions."),
                ));
                Err(error)
            }
        }
    }
}
