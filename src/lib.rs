pub mod broadcast;
pub mod cli;
pub mod config;
pub mod database;
pub mod events;
pub mod models;
pub mod notifications;
pub mod poller;
pub mod preferences;
pub mod storage;
pub mod store;
pub mod tasks;
pub mod utils;
pub mod views;
pub mod workspace;

pub use config::Config;
pub use database::Database;
pub use events::EventStore;
pub use models::{Event, EventId, NewEvent, NewNotification, NewTask, Notification, NotificationKind, Task};
pub use notifications::NotificationStore;
pub use preferences::{Language, PreferenceStore, Theme};
pub use storage::{KeyValueStore, MemoryStorage, SharedStorage};
pub use store::EntityStore;
pub use tasks::TaskStore;
pub use utils::Profile;
pub use workspace::Workspace;
