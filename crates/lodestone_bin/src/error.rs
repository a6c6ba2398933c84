//! Connection-level failure taxonomy.
//!
//! Every kind here is fatal to its connection. The one non-fatal case,
//! a well-formed frame with an unknown id, never becomes an error: the
//! reader logs it under `[PACKET]` and skips the frame.

use lodestone_protocol::error::CodecError;
use lodestone_protocol::frame::FrameError;

use crate::handler::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket or stream-transform failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Codec-level bad bytes.
    #[error("malformed packet: {0}")]
    Malformed(CodecError),

    /// Well-formed bytes, wrong state or wrong semantics. Carries the
    /// reason shown in the Disconnect packet when the state allows one.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// Keep-alive echo missing or mismatched. No Disconnect is attempted;
    /// the peer is presumed dead.
    #[error("keep-alive timeout")]
    KeepAliveTimeout,

    /// Session verification refused the login.
    #[error("authentication failed: {0}")]
    AuthFailed(#[from] AuthError),

    /// Connection cap reached during login.
    #[error("server is full")]
    Capacity,

    /// Accept-to-LoginSuccess deadline exceeded.
    #[error("login timed out")]
    LoginTimeout,
}

impl From<CodecError> for ConnectionError {
    fn from(err: CodecError) -> Self {
        Self::Malformed(err)
    }
}

impl From<FrameError> for ConnectionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => Self::Io(e),
            FrameError::Codec(e) => Self::Malformed(e),
        }
    }
}

impl ConnectionError {
    /// Whether a Disconnect packet should be attempted before closing.
    pub fn wants_disconnect_packet(&self) -> bool {
        !matches!(self, Self::KeepAliveTimeout | Self::Io(_))
    }

    /// The reason text placed in the Disconnect packet, when one is sent.
    pub fn disconnect_reason(&self) -> String {
        match self {
            Self::ProtocolViolation(reason) => (*reason).to_string(),
            Self::AuthFailed(err) => err.to_string(),
            Self::Capacity => "Server is full".to_string(),
            Self::LoginTimeout => "Login timed out".to_string(),
            Self::Malformed(_) => "Malformed packet".to_string(),
            _ => "Disconnected".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keepalive_timeout_sends_no_disconnect() {
        assert!(!ConnectionError::KeepAliveTimeout.wants_disconnect_packet());
        assert!(!ConnectionError::Io(std::io::Error::other("gone")).wants_disconnect_packet());
        assert!(ConnectionError::Capacity.wants_disconnect_packet());
        assert!(ConnectionError::ProtocolViolation("bad state").wants_disconnect_packet());
    }
}
