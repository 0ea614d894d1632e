//! Feed Supervisor
//!
//! Tracks whether a polled backend feed is currently reachable and reports
//! transitions. Feeds are retried on their normal cadence, without backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crossbeam_channel::Sender;

use crate::services::events::ServiceEvent;

/// Reachability of one feed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedState {
    /// No request has completed yet
    Unknown,
    Connected,
    Disconnected,
}

impl FeedState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => FeedState::Connected,
            2 => FeedState::Disconnected,
            _ => FeedState::Unknown,
        }
    }
}

/// Health tracker for one polled feed (weather, activity, dashboard)
pub struct Supervisor {
    feed: Arc<str>,
    tx: Sender<ServiceEvent>,
    state: AtomicU8,
    /// Consecutive failures since the last success
    failures: AtomicU32,
}

impl Supervisor {
    pub fn new(feed: impl Into<Arc<str>>, tx: Sender<ServiceEvent>) -> Self {
        Self {
            feed: feed.into(),
            tx,
            state: AtomicU8::new(FeedState::Unknown as u8),
            failures: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> FeedState {
        FeedState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == FeedState::Connected
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    /// Swap in `next`, emitting an event only when the state changed
    fn transition(&self, next: FeedState, detail: &str) -> bool {
        let previous = self.state.swap(next as u8, Ordering::SeqCst);
        if previous == next as u8 {
            return false;
        }
        let _ = self.tx.send(ServiceEvent::ConnectionState {
            service: self.feed.clone(),
            connected: next == FeedState::Connected,
            detail: detail.into(),
        });
        true
    }

    pub fn on_success(&self) {
        self.failures.store(0, Ordering::SeqCst);
        if self.transition(FeedState::Connected, "Connected") {
            tracing::info!("{}: Connected", self.feed);
        }
    }

    pub fn on_failure(&self, reason: &str) {
        let count = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if self.transition(FeedState::Disconnected, reason) {
            tracing::warn!("{}: Disconnected - {}", self.feed, reason);
        } else {
            tracing::debug!(feed = %self.feed, failures = count, "still unreachable: {reason}");
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("feed", &self.feed)
            .field("state", &self.state())
            .field("failures", &self.failures())
            .finish()
    }
}
