//! Per-session bounded conversational memory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::{debug, trace};

use boardroom_core::{MemorySettings, SessionId, Turn};

use crate::error::{Error, Result};

/// Ordered turns for one session, never longer than its capacity.
///
/// Appending to a full window evicts the oldest turn.
#[derive(Debug)]
pub struct MemoryWindow {
    capacity: usize,
    turns: Mutex<VecDeque<Turn>>,
}

impl MemoryWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            turns: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn turns(&self) -> MutexGuard<'_, VecDeque<Turn>> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a turn, returning the one evicted to make room, if any.
    pub fn push(&self, turn: Turn) -> Option<Turn> {
        let mut turns = self.turns();
        let evicted = if turns.len() >= self.capacity {
            turns.pop_front()
        } else {
            None
        };
        turns.push_back(turn);
        evicted
    }

    /// Append several turns in order under one lock.
    pub fn extend(&self, new_turns: impl IntoIterator<Item = Turn>) {
        let mut turns = self.turns();
        for turn in new_turns {
            if turns.len() >= self.capacity {
                turns.pop_front();
            }
            turns.push_back(turn);
        }
    }

    /// Copy of the current turns, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns().iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns().is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.turns().clear();
    }
}

/// Lazily created memory windows keyed by session.
#[derive(Clone)]
pub struct ChatMemoryStore {
    capacity: usize,
    windows: Cache<SessionId, Arc<MemoryWindow>>,
}

impl ChatMemoryStore {
    /// Store with `capacity` turns per session and default eviction.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCapacity` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::from_settings(&MemorySettings {
            capacity,
            ..MemorySettings::default()
        })
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidCapacity` if the configured capacity is zero.
    pub fn from_settings(settings: &MemorySettings) -> Result<Self> {
        if settings.capacity == 0 {
            return Err(Error::InvalidCapacity {
                capacity: settings.capacity,
            });
        }

        Ok(Self {
            capacity: settings.capacity,
            windows: Cache::builder()
                .max_capacity(settings.max_sessions)
                .time_to_idle(settings.idle_ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        })
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Handle to the session's window, creating it on first use.
    ///
    /// Concurrent first calls for the same session all receive the same window.
    #[must_use]
    pub fn get(&self, session: &SessionId) -> Arc<MemoryWindow> {
        let capacity = self.capacity;
        self.windows.get_with_by_ref(session, || {
            debug!(session = %session, capacity, "Creating memory window");
            Arc::new(MemoryWindow::new(capacity))
        })
    }

    /// Append a turn to the session's window.
    pub fn append(&self, session: &SessionId, turn: Turn) {
        if let Some(evicted) = self.get(session).push(turn) {
            trace!(session = %session, role = evicted.role.as_str(), "Evicted oldest turn");
        }
    }

    /// The session's turns, oldest first. Empty for sessions never written.
    #[must_use]
    pub fn snapshot(&self, session: &SessionId) -> Vec<Turn> {
        self.windows
            .get(session)
            .map(|window| window.snapshot())
            .unwrap_or_default()
    }

    /// Drop the session's window.
    pub fn clear(&self, session: &SessionId) {
        self.windows.invalidate(session);
    }
}

impl std::fmt::Debug for ChatMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatMemoryStore")
            .field("capacity", &self.capacity)
            .field("sessions", &self.windows.entry_count())
            .finish()
    }
}
