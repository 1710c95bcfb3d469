//! Session registry implementation

use dashmap::DashMap;

use super::entry::SessionEntry;
use super::error::RegistryError;

/// Counts of registered sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// All live sessions
    pub total: usize,
    /// Sessions serving a stream
    pub streaming: usize,
}

/// Concurrent map of live sessions keyed by session id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<u64, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    pub fn insert(&self, entry: SessionEntry) -> Result<(), RegistryError> {
        use dashmap::mapref::entry::Entry;

        match self.sessions.entry(entry.session_id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateSession(entry.session_id)),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    session_id = entry.session_id,
                    peer = %entry.peer_addr,
                    "Session registered"
                );
                slot.insert(entry);
                Ok(())
            }
        }
    }

    /// Record that a session is now streaming `display_id`
    pub fn mark_streaming(&self, session_id: u64, display_id: u32) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.display_id = Some(display_id);
        }
    }

    /// Deregister a session. Returns the entry if it was present.
    pub fn remove(&self, session_id: u64) -> Option<SessionEntry> {
        let removed = self.sessions.remove(&session_id).map(|(_, entry)| entry);

        if let Some(ref entry) = removed {
            tracing::debug!(
                session_id,
                peer = %entry.peer_addr,
                duration_ms = entry.age().as_millis() as u64,
                "Session deregistered"
            );
        }

        removed
    }

    pub fn contains(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    pub fn get(&self, session_id: u64) -> Option<SessionEntry> {
        self.sessions.get(&session_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for entry in self.sessions.iter() {
            stats.total += 1;
            if entry.is_streaming() {
                stats.streaming += 1;
            }
        }
        stats
    }

    /// Cancel every live session. Entries are removed by the sessions
    /// themselves as they close.
    pub fn cancel_all(&self) -> usize {
        let tokens: Vec<_> = self.sessions.iter().map(|entry| entry.cancel.clone()).collect();
        for token in &tokens {
            token.cancel();
        }

        if !tokens.is_empty() {
            tracing::info!(sessions = tokens.len(), "Cancelled live sessions");
        }
        tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use super::*;

    fn entry(id: u64) -> SessionEntry {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        SessionEntry::new(id, addr, CancellationToken::new())
    }

    #[test]
    fn test_insert_and_remove() {
        let registry = SessionRegistry::new();

        registry.insert(entry(1)).unwrap();
        assert!(registry.contains(1));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = SessionRegistry::new();

        registry.insert(entry(7)).unwrap();
        assert_eq!(registry.insert(entry(7)), Err(RegistryError::DuplicateSession(7)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stats_counts_streaming() {
        let registry = SessionRegistry::new();
        registry.insert(entry(1)).unwrap();
        registry.insert(entry(2)).unwrap();

        registry.mark_streaming(2, 5);
        registry.mark_streaming(99, 5);

        assert_eq!(registry.stats(), RegistryStats { total: 2, streaming: 1 });
        assert_eq!(registry.get(2).unwrap().display_id, Some(5));
    }

    #[test]
    fn test_cancel_all() {
        let registry = SessionRegistry::new();
        let first = entry(1);
        let second = entry(2);
        let tokens = [first.cancel.clone(), second.cancel.clone()];
        registry.insert(first).unwrap();
        registry.insert(second).unwrap();

        assert_eq!(registry.cancel_all(), 2);
        assert!(tokens.iter().all(|t| t.is_cancelled()));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_register_deregister() {
        let registry = Arc::new(SessionRegistry::new());

        let tasks: Vec<_> = (0..32u64)
            .map(|id| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry.insert(entry(id)).unwrap();
                    tokio::task::yield_now().await;
                    assert!(registry.remove(id).is_some());
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.is_empty());
    }
}
