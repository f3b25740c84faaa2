//! Session registry — the only synchronization point between connection
//! workers.
//!
//! One session per connection: insert on accept, remove on disconnect.
//! Lookups are read-mostly and safe under concurrent insert/remove from
//! other connections. Everything else a session owns (chunk set, delivered
//! set, received store) lives exclusively in its worker; nothing here is
//! mutated across workers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use ferry_core::error::ProtocolError;

/// Metadata about an active session. Counters are updated by the owning
/// worker and read by the status logger.
#[derive(Debug)]
pub struct SessionMeta {
    /// Stable identifier, allocated by the registry, carried in every
    /// frame and resend request.
    pub session_id: u32,
    /// Peer address, for logging.
    pub peer_addr: String,
    /// When the connection was accepted.
    pub started_at: Instant,
    pub chunks_sent: AtomicU64,
    pub resends_served: AtomicU64,
}

impl SessionMeta {
    pub fn record_chunk_sent(&self) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resend_served(&self) {
        self.resends_served.fetch_add(1, Ordering::Relaxed);
    }
}

/// The registry of live sessions, shared across all connection workers.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<u32, Arc<SessionMeta>>>,
    next_id: Arc<AtomicU32>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session for one connection. Ids are allocated here,
    /// so two connections can never collide.
    pub fn create(&self, peer_addr: impl Into<String>) -> Arc<SessionMeta> {
        let session_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let meta = Arc::new(SessionMeta {
            session_id,
            peer_addr: peer_addr.into(),
            started_at: Instant::now(),
            chunks_sent: AtomicU64::new(0),
            resends_served: AtomicU64::new(0),
        });
        self.sessions.insert(session_id, meta.clone());
        meta
    }

    pub fn get(&self, session_id: u32) -> Result<Arc<SessionMeta>, ProtocolError> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(ProtocolError::UnknownSession(session_id))
    }

    /// Remove a session. Workers call this on every exit path.
    pub fn remove(&self, session_id: u32) -> Option<Arc<SessionMeta>> {
        self.sessions.remove(&session_id).map(|(_, meta)| meta)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of live sessions, for the periodic status log.
    pub fn snapshot(&self) -> Vec<Arc<SessionMeta>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_remove_lifecycle() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());

        let meta = registry.create("127.0.0.1:9999");
        let id = meta.session_id;
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id).unwrap().peer_addr, "127.0.0.1:9999");

        registry.remove(id);
        assert!(registry.is_empty());
        assert_eq!(
            registry.get(id).unwrap_err(),
            ProtocolError::UnknownSession(id)
        );
    }

    #[test]
    fn ids_are_unique_across_sessions() {
        let registry = SessionRegistry::new();
        let a = registry.create("peer-a");
        let b = registry.create("peer-b");
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn concurrent_workers_do_not_observe_each_other() {
        let registry = SessionRegistry::new();
        let mut handles = Vec::new();

        for worker in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let meta = registry.create(format!("peer-{worker}"));
                    meta.record_chunk_sent();
                    assert!(registry.get(meta.session_id).is_ok());
                    registry.remove(meta.session_id);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
