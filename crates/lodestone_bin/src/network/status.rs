//! The status flow: server-list request and ping echo.

use lodestone_protocol::frame::{FrameReader, FrameWriter};
use lodestone_protocol::packets::status::{Pong, StatusResponse};
use lodestone_protocol::packets::{ClientboundPacket, ProtocolState, ServerboundPacket};
use lodestone_protocol::ReadBuf;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;
use tokio::sync::Notify;
use tracing::debug;

use crate::core::server::ServerContext;
use crate::error::ConnectionError;
use crate::network::connection::{next_inbound, Inbound};
use crate::network::encode_packet;

/// A status client that stops talking is dropped after this long.
const STATUS_IDLE: Duration = Duration::from_secs(10);

/// Serve StatusRequest/Ping until the client closes (the normal ending:
/// close is client-initiated after the Pong).
pub async fn run(
    reader: &mut FrameReader<OwnedReadHalf>,
    writer: &mut FrameWriter<OwnedWriteHalf>,
    shutdown: &mut watch::Receiver<bool>,
    cancel: &Notify,
    ctx: &ServerContext,
) -> Result<(), ConnectionError> {
    loop {
        let inbound = tokio::time::timeout(STATUS_IDLE, next_inbound(reader, shutdown, cancel))
            .await
            .map_err(|_| {
                ConnectionError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "status client idle",
                ))
            })??;

        let frame = match inbound {
            Inbound::Closed => return Ok(()),
            Inbound::Frame(frame) => frame,
        };

        let mut r = ReadBuf::new(&frame);
        let decoded = ServerboundPacket::decode_frame(ProtocolState::Status, &mut r)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed status packet"))?;

        match decoded {
            Some((_, ServerboundPacket::StatusRequest)) => {
                let payload = ctx.status_payload();
                debug!("[STATUS] Responding with {} online", payload.players.online);
                let packet = ClientboundPacket::StatusResponse(StatusResponse {
                    json: payload.to_json(),
                });
                let bytes = encode_packet(&ctx.pool, &packet)?;
                writer.write_frame(&bytes).await?;
            }
            Some((_, ServerboundPacket::Ping(ping))) => {
                let packet = ClientboundPacket::Pong(Pong {
                    payload: ping.payload,
                });
                let bytes = encode_packet(&ctx.pool, &packet)?;
                writer.write_frame(&bytes).await?;
                // The client closes once it has its Pong; wait for that
                // on the next loop turn rather than racing it.
            }
            Some(_) => return Err(ConnectionError::ProtocolViolation("unexpected status packet")),
            None => {
                debug!("[PACKET] Unknown Status id, frame skipped");
            }
        }
    }
}
