//! Category reads and edits.
use log::{info, warn};
use shared::{CategoriesResponse, Category, CategoryInput, MessageResponse, NewNotification};
use std::sync::Arc;

use super::account_link::message_or;
use super::notifications::NotificationQueue;
use crate::error::GatewayResult;
use crate::io::{scopes, Gateway, QueryCache, QueryKey};

pub struct CategoryService {
    gateway: Arc<dyn Gateway>,
    cache: Arc<QueryCache>,
    notifications: NotificationQueue,
}

impl CategoryService {
    pub fn new(gateway: Arc<dyn Gateway>, cache: Arc<QueryCache>, notifications: NotificationQueue) -> Self {
        Self {
            gateway,
            cache,
            notifications,
        }
    }

    pub async fn categories(&self) -> GatewayResult<CategoriesResponse> {
        let gateway = self.gateway.clone();
        self.cache
            .get_or_fetch(QueryKey::new(scopes::CATEGORIES), self.cache.default_stale_time(), || async move {
                gateway.list_categories().await
            })
            .await
    }

    /// Report a mutation result. Transactions embed category names, so both scopes are dropped.
    fn finish<T>(&self, result: GatewayResult<T>, success: (&str, String), failure: (&str, &str)) -> GatewayResult<T> {
        match result {
            Ok(value) => {
                self.cache.invalidate(scopes::CATEGORIES);
                self.cache.invalidate(scopes::TRANSACTIONS);
                self.notifications.add(NewNotification::success(success.0, success.1));
                Ok(value)
            }
            Err(error) => {
                warn!("{}: {}", failure.0, error);
                self.notifications.add(NewNotification::error(failure.0, message_or(&error, failure.1)));
                Err(error)
            }
        }
    }

    pub async fn create(&self, input: &CategoryInput) -> GatewayResult<Category> {
        let result = self.gateway.create_category(input).await;
        if let Ok(category) = &result {
            info!("Created category {} ({})", category.name, category.id);
        }
        let name = input.name.clone().unwrap_or_default();
        self.finish(
            result,
            ("Category Created", format!("\"{}\" has been created.", name)),
            ("Create Failed", "Failed to create category."),
        )
    }

    pub async fn update(&self, category_id: i64, input: &CategoryInput) -> GatewayResult<Category> {
        let result = self.gateway.update_category(category_id, input).await;
        let name = match &result {
            Ok(category) => category.name.clone(),
            Err(_) => String::new(),
        };
        self.finish(
            result,
            ("Category Updated", format!("\"{}\" has been updated.", name)),
            ("Update Failed", "Failed to update category."),
        )
    }

    pub async fn delete(&self, category_id: i64) -> GatewayResult<MessageResponse> {
        let result = self.gateway.delete_category(category_id).await;
        self.finish(
            result,
            ("Category Deleted", "The category has been deleted.".to_string()),
            ("Delete Failed", "Failed to delete category."),
        )
    }
}
