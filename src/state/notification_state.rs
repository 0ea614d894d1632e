//! NotificationState - Recent Notifications with Ring Buffer

use std::collections::VecDeque;

use crate::constants::NOTIFICATION_CAPACITY;
use crate::services::{Notification, NotificationLevel};

/// A notification with a sequence id
#[derive(Debug, Clone)]
pub struct NotificationEntry {
    pub id: u64,
    pub notification: Notification,
}

/// Recent notifications, oldest dropped first
#[derive(Debug)]
pub struct NotificationState {
    entries: VecDeque<NotificationEntry>,
    capacity: usize,
    next_id: u64,
}

impl NotificationState {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    pub fn push(&mut self, notification: Notification) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(NotificationEntry { id, notification });
        id
    }

    pub fn entries(&self) -> &VecDeque<NotificationEntry> {
        &self.entries
    }

    /// Entries at or above `level`
    pub fn at_least(&self, level: NotificationLevel) -> impl Iterator<Item = &NotificationEntry> {
        self.entries
            .iter()
            .filter(move |e| e.notification.level >= level)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for NotificationState {
    fn default() -> Self {
        Self::new(NOTIFICATION_CAPACITY)
    }
}
