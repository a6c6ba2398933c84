//! Per-connection state machine.
//!
//! One task owns the socket through Handshaking, Status and Login, where
//! the exchange is strictly sequential. Entering Play splits the socket:
//! the current task becomes the reader, a spawned task becomes the writer
//! servicing the bounded outbound queue. Keep-alive runs on the reader's
//! select loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lodestone_pool::PooledBuf;
use lodestone_protocol::frame::{FrameError, FrameReader, FrameWriter};
use lodestone_protocol::packets::play::Disconnect;
use lodestone_protocol::packets::{
    ClientboundPacket, LoginDisconnect, ProtocolState, ServerboundPacket,
};
use lodestone_protocol::types::Chat;
use lodestone_protocol::ReadBuf;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::core::server::{describe_close, ServerContext};
use crate::core::session::{ConnectionHandle, OutboundMessage};
use crate::error::ConnectionError;
use crate::handler::PlayerProfile;
use crate::network::{encode_packet, login, play, status};

/// A frame read that may instead observe close: peer EOF between frames,
/// the global cancellation signal, or a targeted cancel.
pub(crate) enum Inbound {
    Frame(PooledBuf),
    Closed,
}

pub(crate) async fn next_inbound(
    reader: &mut FrameReader<OwnedReadHalf>,
    shutdown: &mut watch::Receiver<bool>,
    cancel: &Notify,
) -> Result<Inbound, ConnectionError> {
    tokio::select! {
        biased;

        _ = cancel.notified() => Ok(Inbound::Closed),

        _ = shutdown.changed() => Ok(Inbound::Closed),

        res = reader.read_frame() => match res {
            Ok(frame) => Ok(Inbound::Frame(frame)),
            Err(FrameError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(Inbound::Closed)
            }
            Err(e) => Err(e.into()),
        },
    }
}

pub struct Connection {
    handle:      Arc<ConnectionHandle>,
    reader:      FrameReader<OwnedReadHalf>,
    writer:      Option<FrameWriter<OwnedWriteHalf>>,
    outbound_rx: Option<Receiver<OutboundMessage>>,
    state:       ProtocolState,
    shutdown:    watch::Receiver<bool>,
    /// Tells the writer task to drain the queue and stop; the outbound
    /// sender sits in the shared handle, so channel closure alone cannot
    /// signal writer shutdown.
    writer_stop: watch::Sender<bool>,
    ctx:         Arc<ServerContext>,
    addr:        SocketAddr,
}

impl Connection {
    /// Task entry point: drive the connection to completion and clean up
    /// its session-table entries. Never panics the acceptor; every exit
    /// path logs under `[CONNECTION]`.
    pub async fn run(socket: TcpStream, addr: SocketAddr, ctx: Arc<ServerContext>) {
        let (read_half, write_half) = socket.into_split();
        let (handle, outbound_rx) = ctx
            .sessions
            .register(addr, ctx.config.outbound_queue_depth as usize);
        let conn_id = handle.id;

        let (writer_stop, _) = watch::channel(false);
        let mut conn = Self {
            handle,
            reader: FrameReader::new(read_half, ctx.pool.clone()),
            writer: Some(FrameWriter::new(write_half, ctx.pool.clone())),
            outbound_rx: Some(outbound_rx),
            state: ProtocolState::Handshaking,
            shutdown: ctx.shutdown.clone(),
            writer_stop,
            ctx,
            addr,
        };

        let result = conn.drive().await;
        match &result {
            Ok(()) => info!("[CONNECTION] conn={} from {} closed", conn_id, conn.addr),
            Err(e) => {
                warn!(
                    "[CONNECTION] conn={} from {} closing ({}): {}",
                    conn_id,
                    conn.addr,
                    describe_close(e),
                    e
                );
                conn.send_failure_disconnect(e).await;
            }
        }

        conn.set_state(ProtocolState::Closed);

        // Dropping the table entry also releases the outbound sender so a
        // running writer task drains and exits.
        let profile = conn.ctx.sessions.remove(conn_id);
        if let Some(profile) = profile {
            conn.ctx.handler.on_leave(&profile);
        }
    }

    fn set_state(&mut self, state: ProtocolState) {
        self.state = state;
        self.handle.set_state(state);
    }

    async fn drive(&mut self) -> Result<(), ConnectionError> {
        // The login deadline runs from accept to LoginSuccess, so the
        // handshake read already counts against it.
        let login_deadline = tokio::time::Instant::now()
            + Duration::from_millis(u64::from(self.ctx.config.login_timeout_ms));

        let handshake = tokio::time::timeout_at(login_deadline, self.read_handshake())
            .await
            .map_err(|_| ConnectionError::LoginTimeout)??;
        let Some(handshake) = handshake else {
            return Ok(()); // closed before handshaking finished
        };

        debug!(
            "[CONNECTION] conn={} handshake: protocol={} next_state={}",
            self.handle.id, handshake.protocol_version, handshake.next_state
        );

        match handshake.next_state {
            1 => {
                self.set_state(ProtocolState::Status);
                let Self {
                    reader,
                    writer,
                    shutdown,
                    handle,
                    ctx,
                    ..
                } = self;
                let writer = writer.as_mut().ok_or(ConnectionError::ProtocolViolation(
                    "status after writer split",
                ))?;
                status::run(reader, writer, shutdown, &handle.cancel, ctx).await
            }
            2 => {
                self.set_state(ProtocolState::Login);

                let profile = {
                    let Self {
                        reader,
                        writer,
                        shutdown,
                        handle,
                        ctx,
                        ..
                    } = self;
                    let writer = writer.as_mut().ok_or(ConnectionError::ProtocolViolation(
                        "login after writer split",
                    ))?;

                    tokio::time::timeout_at(
                        login_deadline,
                        login::run(
                            reader,
                            writer,
                            shutdown,
                            handle,
                            ctx,
                            handshake.protocol_version,
                        ),
                    )
                    .await
                    .map_err(|_| ConnectionError::LoginTimeout)??
                };

                self.set_state(ProtocolState::Play);
                info!(
                    "[CONNECTION] conn={} '{}' ({}) entered Play",
                    self.handle.id, profile.username, profile.uuid
                );
                self.run_play(profile).await
            }
            _ => Err(ConnectionError::ProtocolViolation("handshake next_state")),
        }
    }

    /// First phase: wait for the Handshake packet. `None` means the peer
    /// (or the server) closed first.
    async fn read_handshake(
        &mut self,
    ) -> Result<Option<lodestone_protocol::packets::Handshake>, ConnectionError> {
        loop {
            let Self {
                reader, shutdown, handle, ..
            } = self;
            match next_inbound(reader, shutdown, &handle.cancel).await? {
                Inbound::Closed => return Ok(None),
                Inbound::Frame(frame) => {
                    let mut r = ReadBuf::new(&frame);
                    match ServerboundPacket::decode_frame(ProtocolState::Handshaking, &mut r)
                        .map_err(|_| ConnectionError::ProtocolViolation("malformed handshake"))?
                    {
                        Some((_, ServerboundPacket::Handshake(handshake))) => {
                            return Ok(Some(handshake));
                        }
                        Some(_) => {
                            return Err(ConnectionError::ProtocolViolation("expected handshake"));
                        }
                        None => {
                            debug!(
                                "[PACKET] conn={} unknown pre-handshake id, skipped",
                                self.handle.id
                            );
                        }
                    }
                }
            }
        }
    }

    async fn run_play(&mut self, profile: PlayerProfile) -> Result<(), ConnectionError> {
        let (Some(writer), Some(outbound_rx)) = (self.writer.take(), self.outbound_rx.take())
        else {
            return Err(ConnectionError::ProtocolViolation("play entered twice"));
        };

        // One writer task per connection; write failures cancel the reader.
        let writer_handle = Arc::clone(&self.handle);
        let writer_stop_rx = self.writer_stop.subscribe();
        let writer_task = tokio::spawn(write_loop(writer, outbound_rx, writer_handle, writer_stop_rx));

        self.ctx.handler.on_join(&profile);
        play::send_join_sequence(&self.ctx, &self.handle, &profile).await?;

        let keepalive_interval =
            Duration::from_millis(u64::from(self.ctx.config.keepalive_interval_ms));
        let keepalive_timeout =
            Duration::from_millis(u64::from(self.ctx.config.keepalive_timeout_ms));
        let idle_grace = Duration::from_millis(u64::from(self.ctx.config.idle_timeout_ms));

        let mut interval = tokio::time::interval(keepalive_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.reset(); // the first tick fires one interval from now

        // Outstanding keep-alive token and its send time.
        let mut pending_echo: Option<(i64, tokio::time::Instant)> = None;

        // Any inbound packet pushes this out; the echo deadline below is
        // independent of it.
        let mut idle_deadline = tokio::time::Instant::now() + idle_grace;

        let result = loop {
            let echo_deadline = pending_echo.map(|(_, sent_at)| sent_at + keepalive_timeout);
            let Self {
                reader,
                shutdown,
                handle,
                ctx,
                ..
            } = self;

            tokio::select! {
                biased;

                _ = handle.cancel.notified() => break Ok(()),

                _ = shutdown.changed() => {
                    debug!("[SHUTDOWN] conn={} observed cancellation", handle.id);
                    let packet = ClientboundPacket::Disconnect(Disconnect {
                        reason: Chat::text("Server closed"),
                    });
                    if let Ok(bytes) = encode_packet(&ctx.pool, &packet) {
                        let _ = handle.outbound.try_send(OutboundMessage::Final(bytes));
                    }
                    break Ok(());
                }

                _ = tokio::time::sleep_until(idle_deadline) => {
                    debug!("[KEEPALIVE] conn={} idle grace window expired", handle.id);
                    break Err(ConnectionError::KeepAliveTimeout);
                }

                _ = sleep_until_opt(echo_deadline) => {
                    break Err(ConnectionError::KeepAliveTimeout);
                }

                _ = interval.tick() => {
                    if pending_echo.is_none() {
                        let token = now_millis();
                        let packet = ClientboundPacket::KeepAlive(
                            lodestone_protocol::packets::play::KeepAliveClientbound { id: token },
                        );
                        let bytes = match encode_packet(&ctx.pool, &packet) {
                            Ok(bytes) => bytes,
                            Err(e) => break Err(e.into()),
                        };
                        if handle.outbound.send(OutboundMessage::Packet(bytes)).await.is_err() {
                            break Ok(()); // writer gone
                        }
                        pending_echo = Some((token, tokio::time::Instant::now()));
                        debug!("[KEEPALIVE] conn={} sent token {}", handle.id, token);
                    }
                }

                res = reader.read_frame() => {
                    let frame = match res {
                        Ok(frame) => frame,
                        Err(FrameError::Io(e))
                            if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                        {
                            break Ok(());
                        }
                        Err(e) => break Err(e.into()),
                    };

                    // Any inbound packet refreshes the idle grace window,
                    // whatever its id; the echo deadline is untouched.
                    idle_deadline = tokio::time::Instant::now() + idle_grace;

                    match self.handle_play_frame(&frame, &profile, &mut pending_echo) {
                        Ok(()) => {}
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        // Reader is done. Releasing our queue entries lets the writer
        // drain whatever is left (including a Final) and exit.
        if let Err(e) = &result {
            if e.wants_disconnect_packet() {
                let packet = ClientboundPacket::Disconnect(Disconnect {
                    reason: Chat::text(e.disconnect_reason()),
                });
                if let Ok(bytes) = encode_packet(&self.ctx.pool, &packet) {
                    let _ = self.handle.outbound.try_send(OutboundMessage::Final(bytes));
                }
            }
        }

        self.set_state(ProtocolState::Closed);
        if let Some(profile) = self.ctx.sessions.remove(self.handle.id) {
            self.ctx.handler.on_leave(&profile);
        }

        // The writer drains whatever is queued (a Final included), then
        // stops.
        let _ = self.writer_stop.send(true);
        let _ = writer_task.await;

        result
    }

    /// Decode and dispatch one Play-state frame on the reader task.
    /// Handlers run synchronously here, so they are bound by the
    /// don't-block contract of the handler boundary.
    fn handle_play_frame(
        &self,
        frame: &[u8],
        profile: &PlayerProfile,
        pending_echo: &mut Option<(i64, tokio::time::Instant)>,
    ) -> Result<(), ConnectionError> {
        let mut r = ReadBuf::new(frame);
        let decoded = ServerboundPacket::decode_frame(ProtocolState::Play, &mut r)
            .map_err(|_| ConnectionError::ProtocolViolation("packet failed to decode"))?;

        let Some((id, packet)) = decoded else {
            debug!("[PACKET] conn={} unknown Play id, frame skipped", self.handle.id);
            return Ok(());
        };

        debug!("[PACKET] conn={} {} ({:#04x})", self.handle.id, packet.name(), id);

        match &packet {
            ServerboundPacket::KeepAlive(echo) => match pending_echo.take() {
                Some((token, _)) if token == echo.id => {
                    debug!("[KEEPALIVE] conn={} echo ok", self.handle.id);
                }
                _ => return Err(ConnectionError::KeepAliveTimeout),
            },
            ServerboundPacket::ChatMessage(chat) => {
                self.ctx.handler.on_chat(profile, &chat.message);
            }
            _ => {}
        }

        self.ctx.handler.deliver(self.handle.id, &packet);
        Ok(())
    }

    /// Best-effort Disconnect for failures whose kind allows one.
    async fn send_failure_disconnect(&mut self, err: &ConnectionError) {
        if !err.wants_disconnect_packet() {
            return;
        }
        let reason = Chat::text(err.disconnect_reason());

        match self.state {
            ProtocolState::Login => {
                let packet = ClientboundPacket::LoginDisconnect(LoginDisconnect { reason });
                self.write_direct(&packet).await;
            }
            ProtocolState::Play => {
                // The writer task owns the socket now; run_play already
                // queued the Final message on the error path.
            }
            _ => {}
        }
    }

    async fn write_direct(&mut self, packet: &ClientboundPacket) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        match encode_packet(&self.ctx.pool, packet) {
            Ok(bytes) => {
                if let Err(e) = writer.write_frame(&bytes).await {
                    debug!("[CONNECTION] conn={} disconnect write failed: {}", self.handle.id, e);
                }
            }
            Err(e) => {
                debug!("[CONNECTION] conn={} disconnect encode failed: {}", self.handle.id, e);
            }
        }
    }
}

/// The writer task: drain the bounded queue onto the socket. A `Final`
/// message, a write failure, or the reader's stop signal ends the task;
/// write failure also cancels the reader so the whole connection
/// terminates.
async fn write_loop(
    mut writer: FrameWriter<OwnedWriteHalf>,
    mut rx: Receiver<OutboundMessage>,
    handle: Arc<ConnectionHandle>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            message = rx.recv() => message,
            _ = stop.changed() => {
                // Stop taking new work but flush what is already queued.
                rx.close();
                continue;
            }
        };

        let Some(message) = message else { break };

        match message {
            OutboundMessage::Packet(bytes) => {
                if let Err(e) = writer.write_frame(&bytes).await {
                    warn!("[NETWORK] conn={} write failed: {}", handle.id, e);
                    handle.cancel.notify_one();
                    break;
                }
            }
            OutboundMessage::Final(bytes) => {
                if let Err(e) = writer.write_frame(&bytes).await {
                    debug!("[NETWORK] conn={} final write failed: {}", handle.id, e);
                }
                handle.cancel.notify_one();
                break;
            }
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
