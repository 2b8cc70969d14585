use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

use crate::models::Notification;
use crate::notifications::NotificationStore;

/// Interval at which the notification list is refreshed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSnapshot {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

impl NotificationSnapshot {
    fn load(store: &NotificationStore) -> Self {
        let notifications = store.load();
        let unread = notifications.iter().filter(|n| !n.read).count();
        Self { notifications, unread }
    }
}

/// Reloads notifications on a background thread, once immediately and then
/// every `interval`, until stopped or dropped.
pub struct NotificationPoller {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl NotificationPoller {
    pub fn spawn<F>(store: NotificationStore, interval: Duration, mut on_refresh: F) -> std::io::Result<Self>
    where
        F: FnMut(NotificationSnapshot) + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("notification-poller".to_string())
            .spawn(move || {
                loop {
                    let snapshot = NotificationSnapshot::load(&store);
                    debug!(unread = snapshot.unread, "polled notifications");
                    on_refresh(snapshot);

                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop polling and wait for the background thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The thread may already be gone; either way it will not poll again.
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("notification poller thread panicked");
            }
        }
    }
}

impl Drop for NotificationPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewNotification;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn delivers_initial_snapshot_and_stops() {
        let store = NotificationStore::open(Arc::new(MemoryStorage::new()));
        let (tx, rx) = mpsc::channel();
        let poller = NotificationPoller::spawn(store.clone(), Duration::from_secs(3600), move |snapshot| {
            let _ = tx.send(snapshot);
        })
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.unread, 1);

        poller.stop();
        // Sender was moved into the stopped thread's closure and dropped with it.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn picks_up_changes_on_next_poll() {
        let store = NotificationStore::open(Arc::new(MemoryStorage::new()));
        let (tx, rx) = mpsc::channel();
        let poller = NotificationPoller::spawn(store.clone(), Duration::from_millis(20), move |snapshot| {
            let _ = tx.send(snapshot.unread);
        })
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
        store.notify(NewNotification::system("Sync", "Sync complete"));

        let mut latest = 1;
        for _ in 0..100 {
            latest = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if latest == 2 {
                break;
            }
        }
        assert_eq!(latest, 2);
        drop(poller);
    }
}
