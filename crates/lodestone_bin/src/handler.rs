//! The handler boundary and the collaborator interfaces.
//!
//! Gameplay logic consumes the protocol engine through these traits; the
//! engine never implements game semantics itself. Handlers receive an
//! explicit context (connection id plus the [`ServerHandle`]) rather than
//! capturing server state.
//!
//! [`ServerHandle`]: crate::core::server::ServerHandle

use lodestone_protocol::packets::{ServerboundPacket, StatusPayload};
use uuid::Uuid;

/// Monotonically increasing per-process connection identifier.
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub uuid:     Uuid,
    pub username: String,
}

impl PlayerProfile {
    /// The vanilla offline-mode identity: a UUIDv3-shaped digest of
    /// `OfflinePlayer:<name>`.
    pub fn offline(username: &str) -> Self {
        let digest = md5::compute(format!("OfflinePlayer:{username}"));
        let mut bytes = digest.0;
        bytes[6] = (bytes[6] & 0x0F) | 0x30; // version 3
        bytes[8] = (bytes[8] & 0x3F) | 0x80; // RFC 4122 variant

        Self {
            uuid:     Uuid::from_bytes(bytes),
            username: username.to_string(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("online-mode login is not supported by this authenticator")]
    Unsupported,

    #[error("invalid session")]
    InvalidSession,

    #[error("session server unreachable: {0}")]
    Unreachable(String),
}

/// Session-server verification. The engine computes the server hash and
/// calls this; the implementation talks to whatever identity backend the
/// embedder uses.
pub trait Authenticator: Send + Sync + 'static {
    fn verify_session(&self, username: &str, server_hash: &str) -> Result<PlayerProfile, AuthError>;
}

/// The shipped default: refuses online-mode logins outright. Offline mode
/// never reaches the authenticator.
pub struct OfflineAuthenticator;

impl Authenticator for OfflineAuthenticator {
    fn verify_session(&self, _username: &str, _server_hash: &str) -> Result<PlayerProfile, AuthError> {
        Err(AuthError::Unsupported)
    }
}

/// Gameplay event dispatch.
///
/// `deliver` runs on the connection's reader task: implementations must
/// return promptly and must not hold on to the borrowed packet (clone if
/// it needs to outlive the call).
pub trait EventHandler: Send + Sync + 'static {
    fn on_join(&self, _profile: &PlayerProfile) {}

    fn on_leave(&self, _profile: &PlayerProfile) {}

    fn on_chat(&self, _profile: &PlayerProfile, _message: &str) {}

    /// Amend the status-response document. The default keeps the
    /// config-derived payload as is.
    fn on_status_request(&self, payload: StatusPayload) -> StatusPayload {
        payload
    }

    /// Every decoded Play-state packet lands here, in arrival order.
    fn deliver(&self, _conn_id: ConnectionId, _packet: &ServerboundPacket) {}
}

/// The do-nothing handler used when the embedder supplies none.
pub struct NullHandler;

impl EventHandler for NullHandler {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_uuid_matches_vanilla_derivation() {
        // Stable across runs and processes.
        let a = PlayerProfile::offline("Alice");
        let b = PlayerProfile::offline("Alice");
        assert_eq!(a.uuid, b.uuid);
        assert_ne!(a.uuid, PlayerProfile::offline("alice").uuid);

        // Version and variant bits per RFC 4122.
        assert_eq!(a.uuid.get_version_num(), 3);
        let variant = a.uuid.as_bytes()[8] >> 6;
        assert_eq!(variant, 0b10);
    }

    #[test]
    fn test_offline_authenticator_refuses() {
        let auth = OfflineAuthenticator;
        assert!(matches!(
            auth.verify_session("Alice", "deadbeef"),
            Err(AuthError::Unsupported)
        ));
    }
}
