//! The acceptor and the server-wide context handed to every connection.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use bytes::Bytes;
use futures::future::join_all;
use lodestone_config::ServerConfig;
use lodestone_pool::BufferPool;
use lodestone_protocol::crypto::ServerKeys;
use lodestone_protocol::packets::{ClientboundPacket, StatusPayload};
use lodestone_protocol::types::Chat;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::session::{ConnInfo, OutboundMessage, SessionTable};
use crate::error::ConnectionError;
use crate::handler::{
    Authenticator, ConnectionId, EventHandler, NullHandler, OfflineAuthenticator,
};
use crate::network::connection::Connection;
use crate::world::{FlatWorld, WorldSource};

/// Everything a connection task needs from the rest of the server. Passed
/// as an explicit context; connections refer back to the server by id,
/// never by owning pointer.
pub struct ServerContext {
    pub config:        ServerConfig,
    pub pool:          BufferPool,
    pub keys:          ServerKeys,
    pub sessions:      SessionTable,
    pub handler:       Arc<dyn EventHandler>,
    pub authenticator: Arc<dyn Authenticator>,
    pub world:         Arc<dyn WorldSource>,
    pub shutdown:      watch::Receiver<bool>,
}

impl ServerContext {
    /// The status JSON for the current player count, routed through the
    /// handler so embedders can amend it.
    pub fn status_payload(&self) -> StatusPayload {
        let payload = StatusPayload::new(
            &self.config.motd,
            self.config.max_players,
            self.sessions.player_count() as u32,
        );
        self.handler.on_status_request(payload)
    }
}

/// Cheap clonable surface for enqueueing outbound packets; the `send` /
/// `broadcast` half of the handler boundary.
#[derive(Clone)]
pub struct ServerHandle {
    ctx: Arc<ServerContext>,
}

/// Send failure: the connection is gone. (A full queue is not a failure
/// for lossy packets; they are dropped by design.)
#[derive(Debug, thiserror::Error)]
#[error("connection closed")]
pub struct Closed;

impl ServerHandle {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    pub fn online_count(&self) -> usize {
        self.ctx.sessions.player_count()
    }

    /// Queue one packet for one connection. Ordering is preserved per
    /// caller; lossy packets are dropped instead of waiting when the
    /// queue is full.
    pub async fn send(
        &self,
        conn_id: ConnectionId,
        packet: &ClientboundPacket,
    ) -> Result<(), Closed> {
        let handle = self.ctx.sessions.get(conn_id).ok_or(Closed)?;
        let body = packet.encode_body(&self.ctx.pool).map_err(|_| Closed)?;
        let bytes = Bytes::from(body.into_vec());

        if packet.is_lossy() {
            // Drop on backpressure; never block the producer.
            let _ = handle.outbound.try_send(OutboundMessage::Packet(bytes));
            Ok(())
        } else {
            handle
                .outbound
                .send(OutboundMessage::Packet(bytes))
                .await
                .map_err(|_| Closed)
        }
    }

    /// Encode once, enqueue for every connection matching the predicate.
    pub async fn broadcast(
        &self,
        predicate: impl Fn(&ConnInfo) -> bool,
        packet: &ClientboundPacket,
    ) -> usize {
        let Ok(body) = packet.encode_body(&self.ctx.pool) else {
            return 0;
        };
        let bytes = Bytes::from(body.into_vec());
        let lossy = packet.is_lossy();

        let mut targets = Vec::new();
        self.ctx.sessions.for_each_handle(|handle| {
            if predicate(&handle.info.read()) {
                targets.push(Arc::clone(handle));
            }
        });

        let mut queued = 0;
        for handle in targets {
            let message = OutboundMessage::Packet(bytes.clone());
            let delivered = if lossy {
                handle.outbound.try_send(message).is_ok()
            } else {
                handle.outbound.send(message).await.is_ok()
            };
            if delivered {
                queued += 1;
            }
        }
        queued
    }

    /// Ask a connection to disconnect with a reason; returns whether the
    /// connection was still known.
    pub fn disconnect(&self, conn_id: ConnectionId, reason: &str) -> Result<(), Closed> {
        let handle = self.ctx.sessions.get(conn_id).ok_or(Closed)?;
        let packet = ClientboundPacket::Disconnect(lodestone_protocol::packets::play::Disconnect {
            reason: Chat::text(reason),
        });
        if let Ok(body) = packet.encode_body(&self.ctx.pool) {
            let _ = handle
                .outbound
                .try_send(OutboundMessage::Final(Bytes::from(body.into_vec())));
        }
        handle.cancel.notify_one();
        Ok(())
    }
}

/// Clonable switch that fires the global cancellation signal.
#[derive(Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.0.send(true);
    }
}

pub struct Server {
    listener:    TcpListener,
    local_addr:  SocketAddr,
    ctx:         Arc<ServerContext>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    tasks:       Mutex<Vec<JoinHandle<()>>>,
}

impl Server {
    /// Bind the configured port. Failure here is the fatal-initialisation
    /// path: the caller logs and exits with code 1.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        Self::bind_with(
            config,
            Arc::new(NullHandler),
            Arc::new(OfflineAuthenticator),
            Arc::new(FlatWorld::new()),
        )
        .await
    }

    pub async fn bind_with(
        config: ServerConfig,
        handler: Arc<dyn EventHandler>,
        authenticator: Arc<dyn Authenticator>,
        world: Arc<dyn WorldSource>,
    ) -> Result<Self> {
        let bind_addr = config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        let local_addr = listener.local_addr().context("listener has no local addr")?;
        info!("[STARTUP] Server listening on {}", local_addr);

        let keys = ServerKeys::generate().context("RSA keypair generation failed")?;
        info!("[STARTUP] Login keypair generated");

        let (shutdown_tx, shutdown) = watch::channel(false);

        let ctx = Arc::new(ServerContext {
            config,
            pool: BufferPool::new(),
            keys,
            sessions: SessionTable::new(),
            handler,
            authenticator,
            world,
            shutdown,
        });

        Ok(Self {
            listener,
            local_addr,
            ctx,
            shutdown_tx: Arc::new(shutdown_tx),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(Arc::clone(&self.ctx))
    }

    /// Accept until the shutdown signal fires, then disconnect everyone
    /// and join the connection tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown = self.ctx.shutdown.clone();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("[SHUTDOWN] Stop accepting connections");
                    break;
                }

                res = self.listener.accept() => {
                    match res {
                        Ok((socket, addr)) => self.spawn_connection(socket, addr),
                        Err(e) => {
                            // Transient accept errors (fd pressure etc.)
                            // must not take the acceptor down.
                            error!("[NETWORK] Accept error: {}", e);
                        }
                    }
                }
            }
        }

        self.drain().await;
        Ok(())
    }

    /// Signal every task to stop. `run` observes this too.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// A handle for triggering shutdown from elsewhere (signal handlers,
    /// admin surfaces).
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger(Arc::clone(&self.shutdown_tx))
    }

    fn spawn_connection(&self, socket: TcpStream, addr: SocketAddr) {
        info!("[CONNECTION] New connection from {}", addr);
        if let Err(e) = socket.set_nodelay(true) {
            warn!("[CONNECTION] set_nodelay failed for {}: {}", addr, e);
        }

        let ctx = Arc::clone(&self.ctx);
        let task = tokio::spawn(async move {
            Connection::run(socket, addr, ctx).await;
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    async fn drain(&self) {
        self.ctx.sessions.for_each_handle(|handle| {
            handle.cancel.notify_one();
        });

        let tasks = std::mem::take(&mut *self.tasks.lock());
        info!("[SHUTDOWN] Waiting for {} connection task(s)", tasks.len());
        join_all(tasks).await;
        info!("[SHUTDOWN] All connections closed");
    }
}

/// Convenience used by the connection module to surface accept-phase
/// failures uniformly in logs.
pub fn describe_close(err: &ConnectionError) -> &'static str {
    match err {
        ConnectionError::Io(_) => "io",
        ConnectionError::Malformed(_) => "malformed",
        ConnectionError::ProtocolViolation(_) => "protocol violation",
        ConnectionError::KeepAliveTimeout => "keep-alive timeout",
        ConnectionError::AuthFailed(_) => "auth failed",
        ConnectionError::Capacity => "capacity",
        ConnectionError::LoginTimeout => "login timeout",
    }
}
