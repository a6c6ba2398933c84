//! The login flow: LoginStart, the optional encryption leg, compression
//! negotiation, LoginSuccess and session registration.
//!
//! Runs sequentially on the connection task, under the login deadline the
//! caller wraps around it.

use std::sync::Arc;

use lodestone_protocol::crypto;
use lodestone_protocol::frame::{FrameReader, FrameWriter};
use lodestone_protocol::packets::login::{
    EncryptionRequest, EncryptionResponse, LoginSuccess, SetCompression,
};
use lodestone_protocol::packets::play::Disconnect;
use lodestone_protocol::packets::{ClientboundPacket, ProtocolState, ServerboundPacket};
use lodestone_protocol::types::Chat;
use lodestone_protocol::{ReadBuf, PROTOCOL_VERSION};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::server::ServerContext;
use crate::core::session::ConnectionHandle;
use crate::error::ConnectionError;
use crate::handler::PlayerProfile;
use crate::network::connection::{next_inbound, Inbound};
use crate::network::encode_packet;

/// Sent to a displaced session when the same identity logs in again.
const DUPLICATE_LOGIN_REASON: &str = "Logged in from another location";

fn closed() -> ConnectionError {
    ConnectionError::Io(std::io::ErrorKind::UnexpectedEof.into())
}

/// Read the next known Login-state packet, skipping unknown ids.
async fn next_login_packet(
    reader: &mut FrameReader<OwnedReadHalf>,
    shutdown: &mut watch::Receiver<bool>,
    handle: &ConnectionHandle,
) -> Result<ServerboundPacket, ConnectionError> {
    loop {
        match next_inbound(reader, shutdown, &handle.cancel).await? {
            Inbound::Closed => return Err(closed()),
            Inbound::Frame(frame) => {
                let mut r = ReadBuf::new(&frame);
                match ServerboundPacket::decode_frame(ProtocolState::Login, &mut r)
                    .map_err(|_| ConnectionError::ProtocolViolation("malformed login packet"))?
                {
                    Some((_, packet)) => return Ok(packet),
                    None => {
                        debug!("[PACKET] conn={} unknown Login id, frame skipped", handle.id);
                    }
                }
            }
        }
    }
}

async fn write_packet(
    writer: &mut FrameWriter<OwnedWriteHalf>,
    ctx: &ServerContext,
    packet: &ClientboundPacket,
) -> Result<(), ConnectionError> {
    let bytes = encode_packet(&ctx.pool, packet)?;
    writer.write_frame(&bytes).await?;
    Ok(())
}

fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (1..=16).contains(&len) && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Drive a connection from LoginStart to a bound player profile.
pub async fn run(
    reader: &mut FrameReader<OwnedReadHalf>,
    writer: &mut FrameWriter<OwnedWriteHalf>,
    shutdown: &mut watch::Receiver<bool>,
    handle: &Arc<ConnectionHandle>,
    ctx: &Arc<ServerContext>,
    protocol_version: i32,
) -> Result<PlayerProfile, ConnectionError> {
    let login_start = match next_login_packet(reader, shutdown, handle).await? {
        ServerboundPacket::LoginStart(packet) => packet,
        _ => return Err(ConnectionError::ProtocolViolation("expected LoginStart")),
    };
    debug!("[LOGIN] conn={} LoginStart '{}'", handle.id, login_start.username);

    // Status pings are version-agnostic; logins are not.
    if protocol_version != PROTOCOL_VERSION {
        warn!(
            "[LOGIN] conn={} unsupported protocol {} (need {})",
            handle.id, protocol_version, PROTOCOL_VERSION
        );
        return Err(ConnectionError::ProtocolViolation(
            "Unsupported client version, please use 1.16.5",
        ));
    }

    if !is_valid_username(&login_start.username) {
        return Err(ConnectionError::ProtocolViolation("Invalid username"));
    }

    if ctx.sessions.player_count() >= ctx.config.max_players as usize {
        info!("[LOGIN] conn={} refused: server is full", handle.id);
        return Err(ConnectionError::Capacity);
    }

    let profile = if ctx.config.online_mode {
        run_encryption(reader, writer, shutdown, handle, ctx, &login_start.username).await?
    } else {
        PlayerProfile::offline(&login_start.username)
    };

    // SetCompression flips framing for every packet after it, ours and
    // theirs.
    if ctx.config.compression_enabled() {
        let threshold = ctx.config.compression_threshold;
        write_packet(
            writer,
            ctx,
            &ClientboundPacket::SetCompression(SetCompression { threshold }),
        )
        .await?;
        writer.enable_compression(threshold)?;
        reader.enable_compression()?;
        debug!("[LOGIN] conn={} compression enabled (threshold {})", handle.id, threshold);
    }

    write_packet(
        writer,
        ctx,
        &ClientboundPacket::LoginSuccess(LoginSuccess {
            uuid:     profile.uuid,
            username: profile.username.clone(),
        }),
    )
    .await?;

    // Commit the identity; a prior session under the same UUID is evicted
    // before this one becomes visible.
    let eviction = encode_packet(
        &ctx.pool,
        &ClientboundPacket::Disconnect(Disconnect {
            reason: Chat::text(DUPLICATE_LOGIN_REASON),
        }),
    )?;
    if ctx.sessions.bind_player(handle.id, &profile, eviction).is_some() {
        // The displaced session's cleanup no longer owns the identity, so
        // its leave event fires here.
        ctx.handler.on_leave(&profile);
    }

    info!(
        "[LOGIN] conn={} '{}' ({}) logged in successfully",
        handle.id, profile.username, profile.uuid
    );
    Ok(profile)
}

/// The online-mode encryption leg: request, response, verify, enable
/// AES/CFB8 and check the session server.
async fn run_encryption(
    reader: &mut FrameReader<OwnedReadHalf>,
    writer: &mut FrameWriter<OwnedWriteHalf>,
    shutdown: &mut watch::Receiver<bool>,
    handle: &Arc<ConnectionHandle>,
    ctx: &Arc<ServerContext>,
    username: &str,
) -> Result<PlayerProfile, ConnectionError> {
    let verify_token = crypto::generate_verify_token();

    write_packet(
        writer,
        ctx,
        &ClientboundPacket::EncryptionRequest(EncryptionRequest {
            server_id:    String::new(), // vanilla sends an empty server id
            public_key:   ctx.keys.public_key_der().to_vec(),
            verify_token: verify_token.to_vec(),
        }),
    )
    .await?;
    debug!("[LOGIN] conn={} EncryptionRequest sent", handle.id);

    let response: EncryptionResponse = match next_login_packet(reader, shutdown, handle).await? {
        ServerboundPacket::EncryptionResponse(packet) => packet,
        _ => {
            return Err(ConnectionError::ProtocolViolation(
                "expected EncryptionResponse",
            ));
        }
    };

    ctx.keys
        .check_verify_token(&verify_token, &response.verify_token)
        .map_err(|_| ConnectionError::ProtocolViolation("verify token mismatch"))?;

    let secret = ctx
        .keys
        .decrypt_shared_secret(&response.shared_secret)
        .map_err(|_| ConnectionError::ProtocolViolation("bad shared secret"))?;

    // Everything from here on, both directions, is AES/CFB8.
    reader.enable_encryption(&secret)?;
    writer.enable_encryption(&secret)?;
    debug!("[LOGIN] conn={} stream encryption enabled", handle.id);

    let server_hash = crypto::server_hash("", &secret, ctx.keys.public_key_der());
    let profile = ctx
        .authenticator
        .verify_session(username, &server_hash)
        .map_err(ConnectionError::AuthFailed)?;

    info!("[LOGIN] conn={} session verified for '{}'", handle.id, profile.username);
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("Alice"));
        assert!(is_valid_username("a"));
        assert!(is_valid_username("under_score_16ch"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("seventeen_chars__"));
        assert!(!is_valid_username("bad space"));
        assert!(!is_valid_username("ünïcode"));
    }
}
