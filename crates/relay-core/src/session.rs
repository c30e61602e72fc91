//! Session registry.
//!
//! Sessions are independent, identifier-keyed string values. All mutations go
//! through one `RwLock`, so concurrent updates to the same identifier are
//! serialized and none is lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// A registered session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Session identifier.
    pub id: String,
    /// Current value (empty until the first update).
    pub value: String,
    /// When the session was added.
    pub created_at: DateTime<Utc>,
    /// When the value was last written.
    pub updated_at: DateTime<Utc>,
}

impl SessionEntry {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            value: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Thread-safe map from session identifier to [`SessionEntry`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session with an empty value. Fails if `id` already exists.
    pub fn add(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::LockPoisoned)?;
        if entries.contains_key(id) {
            return Err(Error::SessionExists(id.to_string()));
        }
        entries.insert(id.to_string(), SessionEntry::new(id));
        Ok(())
    }

    /// Overwrite the value of an existing session.
    pub fn update(&self, id: &str, value: impl Into<String>) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::LockPoisoned)?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        entry.value = value.into();
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// Current value of a session.
    pub fn value(&self, id: &str) -> Result<String> {
        self.get(id).map(|entry| entry.value)
    }

    /// Full entry of a session.
    pub fn get(&self, id: &str) -> Result<SessionEntry> {
        let entries = self.entries.read().map_err(|_| Error::LockPoisoned)?;
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Remove a session, returning its last entry.
    pub fn remove(&self, id: &str) -> Result<SessionEntry> {
        let mut entries = self.entries.write().map_err(|_| Error::LockPoisoned)?;
        entries
            .remove(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> Result<bool> {
        let entries = self.entries.read().map_err(|_| Error::LockPoisoned)?;
        Ok(entries.contains_key(id))
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| Error::LockPoisoned)?;
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(|_| Error::LockPoisoned)?;
        Ok(entries.len())
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Remove every session. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| Error::LockPoisoned)?;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_creates_empty_value() {
        let registry = SessionRegistry::new();
        registry.add("session-1").unwrap();

        assert_eq!(registry.value("session-1").unwrap(), "");
        assert!(registry.contains("session-1").unwrap());
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_add_fails_and_keeps_value() {
        let registry = SessionRegistry::new();
        registry.add("session-1").unwrap();
        registry.update("session-1", "value1").unwrap();

        let err = registry.add("session-1").unwrap_err();
        assert!(matches!(err, Error::SessionExists(ref id) if id == "session-1"));
        assert_eq!(registry.value("session-1").unwrap(), "value1");
    }

    #[test]
    fn test_unknown_session_is_not_found() {
        let registry = SessionRegistry::new();

        assert!(registry.value("missing").unwrap_err().is_not_found());
        assert!(registry.update("missing", "v").unwrap_err().is_not_found());
        assert!(registry.remove("missing").unwrap_err().is_not_found());
        // update must not create the session
        assert!(!registry.contains("missing").unwrap());
    }

    #[test]
    fn test_update_touches_timestamp() {
        let registry = SessionRegistry::new();
        registry.add("s").unwrap();
        let before = registry.get("s").unwrap();

        registry.update("s", "v").unwrap();
        let after = registry.get("s").unwrap();

        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.value, "v");
    }

    #[test]
    fn test_ids_sorted_and_clear() {
        let registry = SessionRegistry::new();
        for id in ["b", "c", "a"] {
            registry.add(id).unwrap();
        }

        assert_eq!(registry.ids().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(registry.clear().unwrap(), 3);
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn test_concurrent_updates_are_independent() {
        let registry = Arc::new(SessionRegistry::new());
        let ids: Vec<String> = (0..8).map(|i| format!("session-{}", i)).collect();
        for id in &ids {
            registry.add(id).unwrap();
        }

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for n in 0..100 {
                        registry.update(&id, format!("{}:{}", id, n)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for id in &ids {
            assert_eq!(registry.value(id).unwrap(), format!("{}:99", id));
        }
    }
}
