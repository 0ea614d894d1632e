//! TasksState - Scheduled Tasks Merged by Id

use ahash::AHashSet;
use hashlink::LinkedHashMap;

use crate::domain::task::ScheduledTask;

/// Locally held task list plus notification bookkeeping
#[derive(Debug, Clone, Default)]
pub struct TasksState {
    tasks: LinkedHashMap<String, ScheduledTask>,
    /// Task ids that already produced a terminal notification
    notified: AHashSet<String>,
    /// Task ids that already produced an "executing soon" notice
    announced: AHashSet<String>,
}

impl TasksState {
    /// Replace the list with a fresh backend snapshot
    pub fn replace_all(&mut self, tasks: Vec<ScheduledTask>) {
        self.tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
    }

    /// Merge one task in place, keeping its position when already present
    pub fn upsert(&mut self, task: ScheduledTask) {
        if let Some(existing) = self.tasks.get_mut(&task.id) {
            *existing = task;
        } else {
            self.tasks.insert(task.id.clone(), task);
        }
    }

    pub fn get(&self, task_id: &str) -> Option<&ScheduledTask> {
        self.tasks.get(task_id)
    }

    pub fn remove(&mut self, task_id: &str) -> Option<ScheduledTask> {
        self.tasks.remove(task_id)
    }

    pub fn list(&self) -> Vec<ScheduledTask> {
        self.tasks.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns true the first time it is called for `task_id`
    pub fn mark_notified(&mut self, task_id: &str) -> bool {
        self.notified.insert(task_id.to_string())
    }

    /// Returns true the first time it is called for `task_id`
    pub fn mark_announced(&mut self, task_id: &str) -> bool {
        self.announced.insert(task_id.to_string())
    }
}
