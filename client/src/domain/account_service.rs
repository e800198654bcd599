//! Account reads and re-synchronization.
use log::{info, warn};
use shared::{Account, AccountsResponse, LinkStatus, NewNotification, SyncResponse};
use std::sync::Arc;

use super::account_link::message_or;
use super::notifications::NotificationQueue;
use crate::error::GatewayResult;
use crate::io::{scopes, Gateway, QueryCache, QueryKey};

pub struct AccountService {
    gateway: Arc<dyn Gateway>,
    cache: Arc<QueryCache>,
    notifications: NotificationQueue,
}

impl AccountService {
    pub fn new(gateway: Arc<dyn Gateway>, cache: Arc<QueryCache>, notifications: NotificationQueue) -> Self {
        Self {
            gateway,
            cache,
            notifications,
        }
    }

    pub async fn accounts(&self) -> GatewayResult<AccountsResponse> {
        let gateway = self.gateway.clone();
        self.cache
            .get_or_fetch(QueryKey::new(scopes::ACCOUNTS), self.cache.default_stale_time(), || async move {
                gateway.list_accounts().await
            })
            .await
    }

    pub async fn account(&self, account_id: i64) -> GatewayResult<Account> {
        let gateway = self.gateway.clone();
        self.cache
            .get_or_fetch(
                QueryKey::with_params(scopes::ACCOUNTS, &account_id),
                self.cache.default_stale_time(),
                || async move { gateway.get_account(account_id).await },
            )
            .await
    }

    pub async fn link_status(&self) -> GatewayResult<LinkStatus> {
        let gateway = self.gateway.clone();
        self.cache
            .get_or_fetch(QueryKey::new(scopes::LINK_STATUS), self.cache.default_stale_time(), || async move {
                gateway.link_status().await
            })
            .await
    }

    fn invalidate_synced(&self) {
        for scope in [scopes::ACCOUNTS, scopes::TRANSACTIONS, scopes::LINK_STATUS] {
            self.cache.invalidate(scope);
        }
    }

    /// Re-synchronize every linked account with the bank
    pub async fn sync_all(&self) -> GatewayResult<SyncResponse> {
        match self.gateway.sync_all_linked_accounts().await {
            Ok(response) => {
                info!("All linked accounts synchronized");
                self.invalidate_synced();
                self.notifications.add(NewNotification::success(
                    "Sync Complete",
                    "All accounts have been synchronized.",
                ));
                Ok(response)
            }
            Err(error) => {
                warn!("Sync of all accounts failed: {}", error);
                self.notifications.add(NewNotification::error(
                    "Sync Failed",
                    message_or(&error, "Failed to sync accounts."),
                ));
                Err(error)
            }
        }
    }

    /// Re-synchronize one linked account with the bank
    pub async fn sync_account(&self, account_id: i64) -> GatewayResult<SyncResponse> {
        match self.gateway.sync_linked_account(account_id).await {
            Ok(response) => {
                info!("Account {} synchronized", account_id);
                self.invalidate_synced();
                self.notifications.add(NewNotification::success(
                    "Account Synced",
                    "Account has been synchronized.",
                ));
                Ok(response)
            }
            Err(error) => {
                warn!("Sync of account {} failed: {}", account_id, error);
                self.notifications.add(NewNotification::error(
                    "Sync Failed",
                    message_or(&error, "Failed to sync account."),
                ));
                Err(error)
            }
        }
    }

    /// Ask the backend to refresh the stored transactions of one account
    pub async fn refresh_account(&self, account_id: i64) -> GatewayResult<SyncResponse> {
        match self.gateway.sync_account(account_id).await {
            Ok(response) => {
                self.invalidate_synced();
                self.notifications.add(NewNotification::success(
                    "Account Refreshed",
                    format!(
                        "{} new and {} updated transaction(s).",
                        response.transactions_created, response.transactions_updated
                    ),
                ));
                Ok(response)
            }
            Err(error) => {
                warn!("Refresh of account {} failed: {}", account_id, error);
                self.notifications.add(NewNotification::error(
                    "Sync Failed",
                    message_or(&error, "Failed to sync account."),
                ));
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::io::test_utils::{account, accounts_response, MockGateway};
    use shared::{AccountType, NotificationKind};
    use std::time::Duration;

    fn service() -> (Arc<MockGateway>, Arc<QueryCache>, NotificationQueue, AccountService) {
        let gateway = Arc::new(MockGateway::new());
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
        let notifications = NotificationQueue::default();
        let service = AccountService::new(gateway.clone(), cache.clone(), notifications.clone());
        (gateway, cache, notifications, service)
    }

    #[tokio::test]
    async fn test_accounts_are_cached_until_sync() {
        let (gateway, _cache, notifications, service) = service();
        gateway
            .respond("list_accounts", accounts_response(vec![account(1, AccountType::Checking, 10.0, 10.0)]))
            .respond("sync_all_linked_accounts", SyncResponse::default());

        service.accounts().await.unwrap();
        service.accounts().await.unwrap();
        assert_eq!(gateway.call_count("list_accounts"), 1);

        service.sync_all().await.unwrap();
        service.accounts().await.unwrap();
        assert_eq!(gateway.call_count("list_accounts"), 2);

        let list = notifications.list();
        assert_eq!(list[0].title, "Sync Complete");
        assert_eq!(list[0].message, "All accounts have been synchronized.");
    }

    #[tokio::test]
    async fn test_single_account_queries_are_keyed_by_id() {
        let (gateway, _cache, _notifications, service) = service();
        gateway.respond("get_account", account(4, AccountType::Savings, 1.0, 1.0));

        service.account(4).await.unwrap();
        service.account(4).await.unwrap();
        service.account(5).await.unwrap();
        assert_eq!(gateway.call_args("get_account"), vec!["4", "5"]);
    }

    #[tokio::test]
    async fn test_sync_account_failure_notifies() {
        let (gateway, cache, notifications, service) = service();
        gateway
            .respond("list_accounts", accounts_response(vec![]))
            .fail("sync_linked_account", GatewayError::network("Server error (502)"));
        service.accounts().await.unwrap();

        assert!(service.sync_account(3).await.is_err());

        assert!(cache.contains(&QueryKey::new(scopes::ACCOUNTS)));
        let list = notifications.list();
        assert_eq!(list[0].kind, NotificationKind::Error);
        assert_eq!(list[0].title, "Sync Failed");
        assert_eq!(list[0].message, "Server error (502)");
    }

    #[tokio::test]
    async fn test_sync_account_success() {
        let (gateway, _cache, notifications, service) = service();
        gateway.respond("sync_linked_account", SyncResponse::default());

        service.sync_account(3).await.unwrap();
        assert_eq!(gateway.call_args("sync_linked_account"), vec!["3"]);
        assert_eq!(notifications.list()[0].title, "Account Synced");
    }

    #[tokio::test]
    async fn test_refresh_account_reports_counts() {
        let (gateway, _cache, notifications, service) = service();
        gateway.respond("sync_account", SyncResponse {
            message: "ok".to_string(),
            transactions_created: 4,
            transactions_updated: 1,
            last_sync_at: None,
        });

        let response = service.refresh_account(8).await.unwrap();
        assert_eq!(response.transactions_created, 4);
        assert_eq!(notifications.list()[0].message, "4 new and 1 updated transaction(s).");
    }

    #[tokio::test]
    async fn test_link_status_is_cached() {
        let (gateway, _cache, _notifications, service) = service();
        gateway.respond("link_status", LinkStatus {
            connected: true,
            accounts_count: 2,
            last_sync: None,
        });

        assert!(service.link_status().await.unwrap().connected);
        service.link_status().await.unwrap();
        assert_eq!(gateway.call_count("link_status"), 1);
    }
}
