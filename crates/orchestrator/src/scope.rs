//! Shared key-value state for one orchestration run.
//!
//! Each worker owns exactly one declared output key, so the scope needs no
//! per-key locking: seed values are read through a shared immutable snapshot
//! and results are merged by the run task after the join barrier.

use indexmap::IndexMap;
use serde_json::Value;

use boardroom_core::SessionId;

use crate::error::{Error, Result};

/// Seed key holding the topic under discussion.
pub const TOPIC_KEY: &str = "topic";

/// Seed key holding the session identifier.
pub const SESSION_KEY: &str = "sessionId";

/// Named values for one run. Insertion order is kept for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    entries: IndexMap<String, Value>,
}

impl Scope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the standard seed for a run: topic plus session id.
    #[must_use]
    pub fn seeded(topic: impl Into<String>, session: &SessionId) -> Self {
        Self::new()
            .with_entry(TOPIC_KEY, topic.into())
            .with_entry(SESSION_KEY, session.as_str())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the previous one for that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Look up a text value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    /// Look up a text value that must be present.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingScopeKey` if the key is absent or not a string.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key).ok_or_else(|| Error::missing_scope_key(key))
    }

    /// The session this run belongs to.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingScopeKey` if the seed has no session id, or a
    /// core error if it is empty.
    pub fn session_id(&self) -> Result<SessionId> {
        Ok(SessionId::new(self.require_str(SESSION_KEY)?)?)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
