use std::sync::LazyLock;

use crate::models::{NewNotification, Notification, NotificationKind, now_timestamp};
use crate::storage::SharedStorage;
use crate::store::{EntityStore, Insertion};

pub const NOTIFICATIONS_STORAGE_KEY: &str = "lifeflow-notifications";

pub type NotificationStore = EntityStore<Notification>;

/// Stamped once per process so every copy of the seed is identical.
static WELCOME_TIMESTAMP: LazyLock<String> = LazyLock::new(now_timestamp);

fn initial_notifications() -> Vec<Notification> {
    vec![Notification {
        id: 1,
        title: "LifeFlowへようこそ".to_string(),
        message: "タスクと予定を管理して、生活をスムーズに。".to_string(),
        timestamp: WELCOME_TIMESTAMP.clone(),
        read: false,
        kind: NotificationKind::System,
    }]
}

impl EntityStore<Notification> {
    /// Notifications are kept newest first.
    pub fn open(storage: SharedStorage) -> Self {
        EntityStore::new(storage, NOTIFICATIONS_STORAGE_KEY, initial_notifications, Insertion::Prepend)
    }

    pub fn open_detached() -> Self {
        EntityStore::detached(NOTIFICATIONS_STORAGE_KEY, initial_notifications, Insertion::Prepend)
    }

    pub fn notify(&self, notification: NewNotification) -> Notification {
        self.add(notification)
    }

    pub fn mark_as_read(&self, id: i64) -> Vec<Notification> {
        self.update(|n| n.id == id, |n| Notification { read: true, ..n })
    }

    pub fn mark_all_as_read(&self) -> Vec<Notification> {
        self.update(|_| true, |n| Notification { read: true, ..n })
    }

    pub fn delete_notification(&self, id: i64) -> Vec<Notification> {
        self.remove(&id)
    }

    pub fn unread_count(&self) -> usize {
        self.load().iter().filter(|n| !n.read).count()
    }
}
