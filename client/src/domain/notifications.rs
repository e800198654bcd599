//! # Notification Queue
//!
//! An ordered queue of transient notifications. Insertion order is display
//! order. A notification with a positive duration is removed by its own
//! expiry timer unless it is dismissed first; a duration of zero or less keeps
//! it until it is dismissed.
//!
//! Expiry timers are owned by the queue. Each one is a spawned sleep holding
//! only a weak reference back to the queue, and every timer still pending is
//! aborted when its notification is removed, when the queue is cleared, or
//! when the last handle to the queue is dropped.

use log::{debug, warn};
use shared::{NewNotification, Notification, DEFAULT_NOTIFICATION_DURATION_MS};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Default)]
struct QueueState {
    notifications: Vec<Notification>,
    timers: HashMap<String, JoinHandle<()>>,
}

struct QueueInner {
    state: Mutex<QueueState>,
    default_duration_ms: i64,
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Called by an expiry timer; the timer's own handle is dropped, not aborted
    fn expire(&self, id: &str) {
        let mut state = self.lock();
        state.timers.remove(id);
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != id);
        if state.notifications.len() != before {
            debug!("Notification {} expired", id);
        }
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}

/// Cloning yields another handle to the same queue
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<QueueInner>,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_DURATION_MS)
    }
}

impl NotificationQueue {
    /// `default_duration_ms` applies to notifications raised without a duration
    pub fn new(default_duration_ms: i64) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                default_duration_ms,
            }),
        }
    }

    /// Append a notification and return its id.
    ///
    /// The expiry timer is spawned on the current tokio runtime. Outside a
    /// runtime the notification is kept until it is dismissed.
    pub fn add(&self, new: NewNotification) -> String {
        let duration_ms = new.duration_ms.unwrap_or(self.inner.default_duration_ms);
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            title: new.title,
            message: new.message,
            duration_ms,
        };
        let id = notification.id.clone();

        let mut state = self.inner.lock();
        debug!("Adding {:?} notification {}: {}", notification.kind, id, notification.title);
        state.notifications.push(notification);

        if duration_ms > 0 {
            match Handle::try_current() {
                Ok(runtime) => {
                    let queue: Weak<QueueInner> = Arc::downgrade(&self.inner);
                    let timer_id = id.clone();
                    let timer = runtime.spawn(async move {
                        tokio::time::sleep(Duration::from_millis(duration_ms as u64)).await;
                        if let Some(queue) = queue.upgrade() {
                            queue.expire(&timer_id);
                        }
                    });
                    state.timers.insert(id.clone(), timer);
                }
                Err(_) => warn!("No async runtime; notification {} will not expire", id),
            }
        }

        id
    }

    /// Remove a notification. Unknown ids are ignored; returns whether anything was removed.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.inner.lock();
        if let Some(timer) = state.timers.remove(id) {
            timer.abort();
        }
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != id);
        state.notifications.len() != before
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        state.notifications.clear();
    }

    /// Current notifications in display order
    pub fn list(&self) -> Vec<Notification> {
        self.inner.lock().notifications.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn pending_timers(&self) -> usize {
        self.inner.lock().timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::NotificationKind;
    use tokio::time::sleep;

    fn titles(queue: &NotificationQueue) -> Vec<String> {
        queue.list().into_iter().map(|n| n.title).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_keep_insertion_order() {
        let queue = NotificationQueue::default();
        queue.add(NewNotification::info("first", ""));
        queue.add(NewNotification::error("second", ""));
        queue.add(NewNotification::success("third", ""));

        assert_eq!(titles(&queue), vec!["first", "second", "third"]);
        assert_eq!(queue.list()[1].kind, NotificationKind::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_duration_expires() {
        let queue = NotificationQueue::default();
        let id = queue.add(NewNotification::success("Saved", "Category saved"));
        assert_eq!(queue.list()[0].duration_ms, DEFAULT_NOTIFICATION_DURATION_MS);

        sleep(Duration::from_millis(4999)).await;
        assert_eq!(queue.len(), 1);

        sleep(Duration::from_millis(2)).await;
        assert!(queue.is_empty());
        assert_eq!(queue.pending_timers(), 0);
        assert!(!queue.remove(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_never_expires() {
        let queue = NotificationQueue::default();
        queue.add(NewNotification::warning("Sticky", "").persistent());
        queue.add(NewNotification::warning("Negative", "").with_duration(-1));

        sleep(Duration::from_secs(3600)).await;
        assert_eq!(titles(&queue), vec!["Sticky", "Negative"]);
        assert_eq!(queue.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_removal_before_expiry_is_final() {
        let queue = NotificationQueue::default();
        let id = queue.add(NewNotification::info("Short", "").with_duration(5000));

        sleep(Duration::from_millis(1000)).await;
        assert!(queue.remove(&id));
        assert!(!queue.remove(&id));

        let kept = queue.add(NewNotification::info("Kept", "").persistent());
        sleep(Duration::from_secs(10)).await;

        let remaining = queue.list();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_default_duration() {
        let queue = NotificationQueue::new(1000);
        queue.add(NewNotification::info("Quick", ""));
        queue.add(NewNotification::info("Explicit", "").with_duration(3000));

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(titles(&queue), vec!["Explicit"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_all_timers() {
        let queue = NotificationQueue::default();
        for i in 0..3 {
            queue.add(NewNotification::info(format!("n{}", i), ""));
        }
        assert_eq!(queue.pending_timers(), 3);

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.pending_timers(), 0);

        sleep(Duration::from_secs(10)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_the_queue() {
        let queue = NotificationQueue::default();
        let other = queue.clone();
        let id = other.add(NewNotification::info("Shared", ""));

        assert_eq!(queue.list()[0].id, id);
        drop(other);

        sleep(Duration::from_millis(5001)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_queue_with_pending_timers() {
        let queue = NotificationQueue::default();
        queue.add(NewNotification::info("Orphan", ""));
        drop(queue);

        sleep(Duration::from_secs(10)).await;
    }

    #[test]
    fn test_add_outside_runtime_keeps_notification() {
        let queue = NotificationQueue::default();
        queue.add(NewNotification::error("No runtime", ""));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_unique() {
        let queue = NotificationQueue::default();
        let a = queue.add(NewNotification::info("a", ""));
        let b = queue.add(NewNotification::info("a", ""));
        assert_ne!(a, b);
    }
}
