use crate::models::{NewTask, Task};
use crate::storage::SharedStorage;
use crate::store::{EntityStore, Insertion};

pub const TASKS_STORAGE_KEY: &str = "lifeflow-tasks";

pub type TaskStore = EntityStore<Task>;

fn initial_tasks() -> Vec<Task> {
    Vec::new()
}

impl EntityStore<Task> {
    pub fn open(storage: SharedStorage) -> Self {
        EntityStore::new(storage, TASKS_STORAGE_KEY, initial_tasks, Insertion::Append)
    }

    pub fn open_detached() -> Self {
        EntityStore::detached(TASKS_STORAGE_KEY, initial_tasks, Insertion::Append)
    }

    pub fn add_task(&self, task: NewTask) -> Task {
        self.add(task)
    }

    /// Flip the completed flag of the task with `id`.
    pub fn toggle_completion(&self, id: i64) -> Vec<Task> {
        self.update(
            |task| task.id == id,
            |task| Task {
                completed: !task.completed,
                ..task
            },
        )
    }

    pub fn delete_task(&self, id: i64) -> Vec<Task> {
        self.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStorage};
    use std::sync::Arc;

    fn buy_milk() -> NewTask {
        NewTask {
            title: "Buy milk".to_string(),
            description: String::new(),
            due_date: "2025-03-03T18:00:00".to_string(),
            completed: false,
            category: "家事".to_string(),
        }
    }

    #[test]
    fn first_task_gets_id_one() {
        let tasks = TaskStore::open(Arc::new(MemoryStorage::new()));
        let created = tasks.add_task(buy_milk());
        assert_eq!(created.id, 1);
        assert_eq!(created.title, "Buy milk");
        assert_eq!(tasks.load(), vec![created]);
    }

    #[test]
    fn toggle_twice_restores_state() {
        let tasks = TaskStore::open(Arc::new(MemoryStorage::new()));
        tasks.add_task(buy_milk());
        tasks.add_task(buy_milk());

        let once = tasks.toggle_completion(2);
        assert!(!once[0].completed);
        assert!(once[1].completed);

        let twice = tasks.toggle_completion(2);
        assert!(twice.iter().all(|t| !t.completed));
    }

    #[test]
    fn delete_keeps_remaining_order() {
        let tasks = TaskStore::open(Arc::new(MemoryStorage::new()));
        for _ in 0..3 {
            tasks.add_task(buy_milk());
        }
        let before = tasks.load();
        let remaining = tasks.delete_task(2);
        assert_eq!(remaining.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(remaining[0], before[0]);
        assert_eq!(remaining[1], before[2]);
        assert_eq!(tasks.load(), remaining);
    }

    #[test]
    fn malformed_json_is_left_alone() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(TASKS_STORAGE_KEY, "[{oops").unwrap();
        let tasks = TaskStore::open(storage.clone());

        assert!(tasks.load().is_empty());
        assert_eq!(storage.get_item(TASKS_STORAGE_KEY).unwrap().as_deref(), Some("[{oops"));
    }

    #[test]
    fn clear_then_load_reseeds() {
        let storage = Arc::new(MemoryStorage::new());
        let tasks = TaskStore::open(storage.clone());
        tasks.add_task(buy_milk());

        tasks.clear();
        assert_eq!(storage.get_item(TASKS_STORAGE_KEY).unwrap(), None);

        assert!(tasks.load().is_empty());
        assert_eq!(storage.get_item(TASKS_STORAGE_KEY).unwrap().as_deref(), Some("[]"));
    }
}
