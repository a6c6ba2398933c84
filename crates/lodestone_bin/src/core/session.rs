//! The session table: connection-id keyed handles plus the player index.
//!
//! The connection map is a concurrent map with one writer per id (the
//! owning connection task); anyone may read. The player index is guarded
//! by a single lock so the duplicate-login policy is atomic: evicting the
//! old session and committing the new one happen under one critical
//! section.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use lodestone_protocol::packets::ProtocolState;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info};
use uuid::Uuid;

use crate::handler::{ConnectionId, PlayerProfile};

/// What the writer task pulls off the outbound queue. Payloads are
/// pre-encoded packet bodies (id varint + fields) so a broadcast encodes
/// once and clones cheaply.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Ordinary packet; enqueueing awaited capacity.
    Packet(Bytes),
    /// Send, then close the connection. Always the last message.
    Final(Bytes),
}

/// Read-only connection state other components may inspect.
#[derive(Debug, Clone)]
pub struct ConnInfo {
    pub addr:    SocketAddr,
    pub state:   ProtocolState,
    pub profile: Option<PlayerProfile>,
}

/// Shared per-connection handle held in the session table.
pub struct ConnectionHandle {
    pub id:       ConnectionId,
    pub outbound: mpsc::Sender<OutboundMessage>,
    pub info:     RwLock<ConnInfo>,
    /// Fired when another component (eviction, shutdown) wants this
    /// connection gone; the reader observes it within one frame boundary.
    pub cancel:   Notify,
}

impl ConnectionHandle {
    pub fn state(&self) -> ProtocolState {
        self.info.read().state
    }

    pub fn set_state(&self, state: ProtocolState) {
        let mut info = self.info.write();
        debug!("[CONNECTION] conn={} state {} -> {}", self.id, info.state, state);
        info.state = state;
    }

    pub fn profile(&self) -> Option<PlayerProfile> {
        self.info.read().profile.clone()
    }
}

pub struct SessionTable {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    players:     Mutex<HashMap<Uuid, ConnectionId>>,
    next_id:     AtomicU64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            players:     Mutex::new(HashMap::new()),
            next_id:     AtomicU64::new(1),
        }
    }

    /// Register a freshly accepted socket and hand back its handle.
    pub fn register(
        &self,
        addr: SocketAddr,
        queue_depth: usize,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, rx) = mpsc::channel(queue_depth);

        let handle = Arc::new(ConnectionHandle {
            id,
            outbound,
            info: RwLock::new(ConnInfo {
                addr,
                state: ProtocolState::Handshaking,
                profile: None,
            }),
            cancel: Notify::new(),
        });

        self.connections.insert(id, Arc::clone(&handle));
        (handle, rx)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&id).map(|entry| Arc::clone(&entry))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Players past LoginSuccess.
    pub fn player_count(&self) -> usize {
        self.players.lock().len()
    }

    pub fn for_each_handle(&self, mut f: impl FnMut(&Arc<ConnectionHandle>)) {
        for entry in self.connections.iter() {
            f(entry.value());
        }
    }

    /// Commit a profile to the player index, displacing any live session
    /// holding the same identity.
    ///
    /// The displaced connection gets `eviction` as its final outbound
    /// message, is transitioned to Closed and cancelled, all before the
    /// new binding becomes visible. Returns the evicted connection id.
    pub fn bind_player(
        &self,
        conn_id: ConnectionId,
        profile: &PlayerProfile,
        eviction: Bytes,
    ) -> Option<ConnectionId> {
        let mut players = self.players.lock();

        let evicted = players.insert(profile.uuid, conn_id);
        if let Some(old_id) = evicted {
            if let Some(old) = self.get(old_id) {
                info!(
                    "[SESSION] Displacing conn={} ({}), logged in again as conn={}",
                    old_id, profile.username, conn_id
                );
                // Best effort: a full queue cannot hold the eviction notice,
                // but the cancel signal still tears the connection down.
                let _ = old.outbound.try_send(OutboundMessage::Final(eviction));
                old.set_state(ProtocolState::Closed);
                old.cancel.notify_one();
            }
        }

        if let Some(handle) = self.get(conn_id) {
            handle.info.write().profile = Some(profile.clone());
        }

        evicted
    }

    /// Drop a connection's table entries. The player index entry is only
    /// removed while it still points at this connection, so an evicted
    /// session cannot unbind its replacement.
    pub fn remove(&self, conn_id: ConnectionId) -> Option<PlayerProfile> {
        let profile = self
            .connections
            .remove(&conn_id)
            .and_then(|(_, handle)| handle.profile());

        if let Some(profile) = &profile {
            let mut players = self.players.lock();
            if players.get(&profile.uuid) == Some(&conn_id) {
                players.remove(&profile.uuid);
            } else {
                return None; // displaced; the replacement owns the identity
            }
        }

        profile
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:25565".parse().unwrap()
    }

    #[test]
    fn test_register_assigns_monotonic_ids() {
        let table = SessionTable::new();
        let (a, _rx_a) = table.register(addr(), 8);
        let (b, _rx_b) = table.register(addr(), 8);
        assert!(b.id > a.id);
        assert_eq!(table.connection_count(), 2);
    }

    #[test]
    fn test_duplicate_login_evicts_old_connection() {
        let table = SessionTable::new();
        let profile = PlayerProfile::offline("Alice");

        let (a, mut rx_a) = table.register(addr(), 8);
        assert_eq!(table.bind_player(a.id, &profile, Bytes::from_static(b"x")), None);
        assert_eq!(table.player_count(), 1);

        let (b, _rx_b) = table.register(addr(), 8);
        let evicted = table.bind_player(b.id, &profile, Bytes::from_static(b"evict"));
        assert_eq!(evicted, Some(a.id));

        // The old connection saw its eviction notice and is Closed before
        // the new binding became visible.
        assert_eq!(a.state(), ProtocolState::Closed);
        match rx_a.try_recv() {
            Ok(OutboundMessage::Final(bytes)) => assert_eq!(&bytes[..], b"evict"),
            other => panic!("expected eviction notice, got {other:?}"),
        }

        // Still one player; the identity now belongs to B.
        assert_eq!(table.player_count(), 1);

        // A's cleanup must not unbind B.
        assert_eq!(table.remove(a.id), None);
        assert_eq!(table.player_count(), 1);
        assert_eq!(table.remove(b.id).unwrap().username, "Alice");
        assert_eq!(table.player_count(), 0);
    }

    #[test]
    fn test_remove_clears_player_index() {
        let table = SessionTable::new();
        let profile = PlayerProfile::offline("Bob");
        let (handle, _rx) = table.register(addr(), 8);
        table.bind_player(handle.id, &profile, Bytes::new());

        assert_eq!(table.remove(handle.id).unwrap().username, "Bob");
        assert_eq!(table.player_count(), 0);
        assert_eq!(table.connection_count(), 0);
    }
}
