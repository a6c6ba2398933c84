pub mod connection;
pub mod login;
pub mod play;
pub mod status;

use bytes::Bytes;
use lodestone_pool::BufferPool;
use lodestone_protocol::error::CodecError;
use lodestone_protocol::packets::ClientboundPacket;

/// Encode a packet body (id varint + fields) into a cheaply clonable
/// buffer for the outbound queue.
pub(crate) fn encode_packet(
    pool: &BufferPool,
    packet: &ClientboundPacket,
) -> Result<Bytes, CodecError> {
    let body = packet.encode_body(pool)?;
    Ok(Bytes::from(body.into_vec()))
}
