//! In-memory state for monitored tasks and backend health.
//!
//! The task store is the single source of truth consulted by the UI binding
//! and the monitor's snapshot reads. It is intentionally not persisted:
//! records live exactly as long as their poller.

mod health;
mod task;

pub use health::{HealthState, HealthTransition};
pub use task::{TaskInfo, TaskStatus, Transition};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Shared map of task id to current state.
///
/// Guarded by a blocking mutex so reads are synchronous snapshots; no
/// critical section ever spans an await point.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    inner: Arc<Mutex<HashMap<String, TaskInfo>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: TaskInfo) {
        self.inner
            .lock()
            .expect("task store lock poisoned")
            .insert(info.task_id.clone(), info);
    }

    pub fn get(&self, task_id: &str) -> Option<TaskInfo> {
        self.inner
            .lock()
            .expect("task store lock poisoned")
            .get(task_id)
            .cloned()
    }

    pub fn remove(&self, task_id: &str) -> Option<TaskInfo> {
        self.inner
            .lock()
            .expect("task store lock poisoned")
            .remove(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.inner
            .lock()
            .expect("task store lock poisoned")
            .contains_key(task_id)
    }

    pub fn all(&self) -> Vec<TaskInfo> {
        self.inner
            .lock()
            .expect("task store lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("task store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` against the stored record, if present, under the lock.
    pub fn update<R>(&self, task_id: &str, f: impl FnOnce(&mut TaskInfo) -> R) -> Option<R> {
        self.inner
            .lock()
            .expect("task store lock poisoned")
            .get_mut(task_id)
            .map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_are_snapshots() {
        let store = TaskStore::new();
        store.insert(TaskInfo::new("task-1", "build"));

        let mut snapshot = store.get("task-1").unwrap();
        snapshot.retry_count = 9;
        // Mutating the snapshot does not touch the store.
        assert_eq!(store.get("task-1").unwrap().retry_count, 0);
    }

    #[test]
    fn update_mutates_in_place() {
        let store = TaskStore::new();
        store.insert(TaskInfo::new("task-1", "build"));
        store.update("task-1", |info| info.retry_count += 1);
        assert_eq!(store.get("task-1").unwrap().retry_count, 1);
        assert_eq!(store.update("missing", |_| ()), None);
    }

    #[test]
    fn remove_returns_the_final_record() {
        let store = TaskStore::new();
        store.insert(TaskInfo::new("task-1", "build"));
        assert!(store.remove("task-1").is_some());
        assert!(store.remove("task-1").is_none());
        assert!(store.is_empty());
    }
}
