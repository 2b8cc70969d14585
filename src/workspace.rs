use std::sync::Arc;
use tracing::info;

use crate::events::EventStore;
use crate::notifications::NotificationStore;
use crate::preferences::{ColorScheme, PreferenceStore, Surface};
use crate::storage::SharedStorage;
use crate::tasks::TaskStore;

/// Every store the application uses, built once over one backend. Hand out
/// references (or clones, which share locks and listeners) instead of
/// building a second store for the same key.
pub struct Workspace {
    pub tasks: TaskStore,
    pub events: EventStore,
    pub notifications: NotificationStore,
    pub preferences: PreferenceStore,
}

impl Workspace {
    pub fn open(storage: SharedStorage, surface: Arc<dyn Surface>, color_scheme: ColorScheme) -> Self {
        Self {
            tasks: TaskStore::open(storage.clone()),
            events: EventStore::open(storage.clone()),
            notifications: NotificationStore::open(storage.clone()),
            preferences: PreferenceStore::new(storage, surface, color_scheme),
        }
    }

    /// A workspace with nowhere to persist: reads return seeds and defaults.
    pub fn detached(surface: Arc<dyn Surface>, color_scheme: ColorScheme) -> Self {
        Self {
            tasks: TaskStore::open_detached(),
            events: EventStore::open_detached(),
            notifications: NotificationStore::open_detached(),
            preferences: PreferenceStore::detached(surface, color_scheme),
        }
    }

    /// Remove the task, event and notification collections. Preferences are kept.
    pub fn clear_all(&self) {
        self.tasks.clear();
        self.events.clear();
        self.notifications.clear();
        info!("cleared all collections");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNotification, NewTask};
    use crate::preferences::{DocumentState, Theme};
    use crate::storage::MemoryStorage;

    #[test]
    fn clear_all_reseeds_collections_but_keeps_preferences() {
        let workspace = Workspace::open(
            Arc::new(MemoryStorage::new()),
            Arc::new(DocumentState::new()),
            ColorScheme::new(false),
        );
        workspace.tasks.add_task(NewTask::new("Write report".to_string(), "2025-03-03T17:00:00".to_string()));
        workspace.notifications.notify(NewNotification::system("Hi", "there"));
        workspace.preferences.set_theme(Theme::Dark);

        workspace.clear_all();

        assert!(workspace.tasks.load().is_empty());
        assert!(workspace.events.load().is_empty());
        assert_eq!(workspace.notifications.load().len(), 1);
        assert_eq!(workspace.preferences.theme(), Theme::Dark);
    }
}
