//! Polling correlation manager backed by a concurrent map.

use super::{CorrelationManager, CorrelationState};
use crate::context::TestContext;
use crate::errors::TestflowError;
use crate::message::Message;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default interval between two lookups of a pending key.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(500);

/// Default time an unclaimed entry is kept in the table.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30);

/// Shortest accepted polling interval.
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_millis(1);

/// Entry in the correlation table.
#[derive(Debug)]
struct CorrelationEntry {
    message: Option<Message>,
    created_at: Instant,
    expired_at: Option<Instant>,
}

impl CorrelationEntry {
    fn pending() -> Self {
        Self {
            message: None,
            created_at: Instant::now(),
            expired_at: None,
        }
    }

    /// Start of the retention window: the timeout if one happened, the
    /// registration otherwise.
    fn retained_since(&self) -> Instant {
        self.expired_at.unwrap_or(self.created_at)
    }

    fn state(&self) -> CorrelationState {
        match (&self.message, self.expired_at) {
            (Some(_), _) => CorrelationState::Stored,
            (None, Some(_)) => CorrelationState::Expired,
            (None, None) => CorrelationState::Created,
        }
    }
}

/// Correlation manager that polls its table until a reply shows up.
///
/// Create, store and claim of a single key are atomic: the map locks the
/// shard holding the key for the duration of each operation, and a claim
/// removes the entry, so exactly one of several concurrent pollers receives
/// a given reply.
#[derive(Debug)]
pub struct PollingCorrelationManager {
    entries: DashMap<String, CorrelationEntry>,
    polling_interval: Duration,
    retention: Duration,
}

impl PollingCorrelationManager {
    /// Creates a manager with the default polling interval and retention.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Sets the polling interval, raised to [`MIN_POLLING_INTERVAL`] if shorter.
    #[must_use]
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_POLLING_INTERVAL {
            warn!(?interval, minimum = ?MIN_POLLING_INTERVAL, "Polling interval too short, clamping");
        }
        self.polling_interval = interval.max(MIN_POLLING_INTERVAL);
        self
    }

    /// Sets how long unclaimed entries stay in the table.
    ///
    /// The window starts at the timeout for entries whose retrieval timed
    /// out and at registration for every other entry.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// Returns the state of a key, or `None` if it is unknown or consumed.
    #[must_use]
    pub fn state(&self, key_value: &str) -> Option<CorrelationState> {
        self.entries.get(key_value).map(|entry| entry.state())
    }

    /// Returns the number of entries still waiting for a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.message.is_none())
            .count()
    }

    /// Returns the number of entries in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries whose retention window has passed.
    ///
    /// This covers timed-out keys, keys nobody ever retrieved and replies
    /// stored under a key that was never claimed. Returns the number of
    /// dropped entries.
    pub fn purge_expired(&self) -> usize {
        let retention = self.retention;
        let before = self.entries.len();

        self.entries.retain(|key, entry| {
            if entry.retained_since().elapsed() < retention {
                return true;
            }
            match entry.state() {
                CorrelationState::Stored => {
                    warn!(key = %key, "Dropping unclaimed reply after retention window");
                }
                CorrelationState::Expired => {
                    debug!(key = %key, "Dropping expired correlation key");
                }
                CorrelationState::Created => {
                    debug!(key = %key, "Dropping correlation key that was never retrieved");
                }
            }
            false
        });

        before.saturating_sub(self.entries.len())
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn mark_expired(&self, key_value: &str) {
        if let Some(mut entry) = self.entries.get_mut(key_value) {
            if entry.message.is_none() {
                entry.expired_at = Some(Instant::now());
            }
        }
    }
}

impl Default for PollingCorrelationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CorrelationManager for PollingCorrelationManager {
    fn create_key(&self, key_name: &str, key_value: &str, ctx: &TestContext) {
        debug!(key_name, key_value, "Saving correlation key");
        ctx.set_variable(key_name, key_value);
        self.entries
            .entry(key_value.to_string())
            .or_insert_with(CorrelationEntry::pending);
    }

    fn store(&self, key_value: &str, message: Message) {
        self.purge_expired();

        let mut entry = self
            .entries
            .entry(key_value.to_string())
            .or_insert_with(CorrelationEntry::pending);

        if entry.message.is_some() {
            warn!(key = key_value, "Replacing reply that was never claimed");
        } else if entry.expired_at.is_some() {
            warn!(key = key_value, "Storing late reply for timed-out correlation key");
        }

        debug!(
            key = key_value,
            waited = ?entry.created_at.elapsed(),
            "Storing reply message"
        );
        entry.message = Some(message);
    }

    async fn find(&self, key_value: &str, timeout: Duration) -> Result<Message, TestflowError> {
        self.purge_expired();

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_find(key_value) {
                return Ok(message);
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let wait = self.polling_interval.min(deadline - now);
            debug!(
                key = key_value,
                retry_in = ?wait,
                "Reply message did not arrive yet"
            );
            tokio::time::sleep(wait).await;
        }

        self.mark_expired(key_value);
        Err(TestflowError::timeout(
            format!("no reply received for correlation key '{key_value}'"),
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        ))
    }

    fn try_find(&self, key_value: &str) -> Option<Message> {
        self.entries
            .remove_if(key_value, |_, entry| entry.message.is_some())
            .and_then(|(_, entry)| entry.message)
    }

    fn discard(&self, key_value: &str) {
        if self
            .entries
            .remove_if(key_value, |_, entry| entry.message.is_none())
            .is_some()
        {
            debug!(key = key_value, "Discarded pending correlation key");
        }
    }
}
