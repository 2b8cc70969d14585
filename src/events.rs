use crate::models::{Event, EventId, NewEvent};
use crate::storage::SharedStorage;
use crate::store::{EntityStore, Insertion};

pub const EVENTS_STORAGE_KEY: &str = "lifeflow-events";

pub type EventStore = EntityStore<Event>;

fn initial_events() -> Vec<Event> {
    Vec::new()
}

impl EntityStore<Event> {
    pub fn open(storage: SharedStorage) -> Self {
        EntityStore::new(storage, EVENTS_STORAGE_KEY, initial_events, Insertion::Append)
    }

    pub fn open_detached() -> Self {
        EntityStore::detached(EVENTS_STORAGE_KEY, initial_events, Insertion::Append)
    }

    pub fn add_event(&self, event: NewEvent) -> Event {
        self.add(event)
    }

    pub fn delete_event(&self, id: &EventId) -> Vec<Event> {
        self.remove(id)
    }
}
