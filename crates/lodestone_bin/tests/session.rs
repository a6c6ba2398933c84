//! End-to-end session tests against a real loopback listener, driven by a
//! minimal client built from the same frame pipeline the server uses.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lodestone_bin::handler::{EventHandler, PlayerProfile};
use lodestone_bin::Server;
use lodestone_config::ServerConfig;
use lodestone_pool::BufferPool;
use lodestone_protocol::buffer::{ReadBuf, WriteBuf};
use lodestone_protocol::frame::{FrameReader, FrameWriter};
use lodestone_protocol::PROTOCOL_VERSION;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        bind_address: "127.0.0.1".to_string(),
        motd: "integration".to_string(),
        ..ServerConfig::default()
    }
}

async fn start_server(config: ServerConfig) -> std::net::SocketAddr {
    let server = Server::bind(config).await.expect("bind");
    let addr = server.local_addr();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

async fn start_server_with(
    config: ServerConfig,
    handler: Arc<dyn EventHandler>,
) -> std::net::SocketAddr {
    let server = Server::bind_with(
        config,
        handler,
        Arc::new(lodestone_bin::handler::OfflineAuthenticator),
        Arc::new(lodestone_bin::world::FlatWorld::new()),
    )
    .await
    .expect("bind");
    let addr = server.local_addr();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

struct TestClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    pool:   BufferPool,
}

impl TestClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let socket = TcpStream::connect(addr).await.expect("connect");
        let (read_half, write_half) = socket.into_split();
        let pool = BufferPool::new();
        Self {
            reader: FrameReader::new(read_half, pool.clone()),
            writer: FrameWriter::new(write_half, pool.clone()),
            pool,
        }
    }

    async fn send_packet(&mut self, id: i32, build: impl FnOnce(&mut WriteBuf)) {
        let mut w = WriteBuf::new(&self.pool);
        w.write_varint(id);
        build(&mut w);
        self.writer.write_frame(w.as_slice()).await.expect("write frame");
    }

    /// Read one frame and split it into (packet id, field bytes).
    async fn read_packet(&mut self) -> Option<(i32, Vec<u8>)> {
        let frame = self.reader.read_frame().await.ok()?;
        let mut r = ReadBuf::new(&frame);
        let id = r.read_varint().expect("packet id");
        let rest = r.read_raw(r.remaining()).expect("fields").to_vec();
        Some((id, rest))
    }

    /// Read frames until `id` shows up. Panics after too many frames so a
    /// missing packet fails fast instead of hanging.
    async fn read_until(&mut self, id: i32) -> Vec<u8> {
        for _ in 0..200 {
            let Some((got, fields)) = self.read_packet().await else {
                panic!("connection closed while waiting for {id:#04x}");
            };
            if got == id {
                return fields;
            }
        }
        panic!("packet {id:#04x} never arrived");
    }

    async fn handshake(&mut self, protocol: i32, next_state: i32) {
        self.send_packet(0x00, |w| {
            w.write_varint(protocol);
            w.write_string("localhost").unwrap();
            w.write_u16(25565);
            w.write_varint(next_state);
        })
        .await;
    }

    /// LoginStart through LoginSuccess, enabling compression when the
    /// server announces it. Returns the confirmed (uuid, username).
    async fn login(&mut self, username: &str) -> (uuid::Uuid, String) {
        self.send_packet(0x00, |w| {
            w.write_string(username).unwrap();
        })
        .await;

        let (id, fields) = self.read_packet().await.expect("login reply");
        let (id, fields) = if id == 0x03 {
            let mut r = ReadBuf::new(&fields);
            let threshold = r.read_varint().expect("threshold");
            assert!(threshold >= 0);
            self.reader.enable_compression().unwrap();
            self.writer.enable_compression(threshold).unwrap();
            self.read_packet().await.expect("login success")
        } else {
            (id, fields)
        };

        assert_eq!(id, 0x02, "expected LoginSuccess");
        let mut r = ReadBuf::new(&fields);
        let uuid = r.read_uuid().expect("uuid");
        let name = r.read_string().expect("name");
        (uuid, name)
    }
}

#[tokio::test]
async fn test_status_ping_scenario() {
    let mut config = test_config();
    config.max_players = 37;
    let addr = start_server(config).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 1).await;

    client.send_packet(0x00, |_| {}).await;
    let fields = client.read_until(0x00).await;
    let mut r = ReadBuf::new(&fields);
    let json: serde_json::Value = serde_json::from_str(&r.read_string().unwrap()).unwrap();
    assert_eq!(json["version"]["protocol"], PROTOCOL_VERSION);
    assert_eq!(json["players"]["max"], 37);
    assert_eq!(json["players"]["online"], 0);
    assert_eq!(json["description"]["text"], "integration");

    client
        .send_packet(0x01, |w| w.write_i64(0x1122_3344_5566_7788))
        .await;
    let fields = client.read_until(0x01).await;
    let mut r = ReadBuf::new(&fields);
    assert_eq!(r.read_i64().unwrap(), 0x1122_3344_5566_7788);
}

#[tokio::test]
async fn test_offline_login_reaches_play() {
    let addr = start_server(test_config()).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 2).await;

    let (uuid, name) = client.login("Alice").await;
    assert_eq!(name, "Alice");
    assert_eq!(uuid, PlayerProfile::offline("Alice").uuid);

    // The join sequence follows; JoinGame is compressed (it exceeds the
    // threshold), which the client pipeline handles transparently.
    let fields = client.read_until(0x24).await;
    let mut r = ReadBuf::new(&fields);
    assert!(r.read_i32().unwrap() > 0); // entity id derives from the connection id

    // Spawn position and the position sync also arrive.
    client.read_until(0x42).await;
    client.read_until(0x34).await;
}

#[tokio::test]
async fn test_login_with_compression_disabled() {
    let mut config = test_config();
    config.compression_threshold = -1;
    let addr = start_server(config).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 2).await;
    let (_, name) = client.login("Bob").await;
    assert_eq!(name, "Bob");
    client.read_until(0x24).await;
}

#[tokio::test]
async fn test_wrong_version_login_refused() {
    let addr = start_server(test_config()).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION + 10, 2).await;
    client
        .send_packet(0x00, |w| {
            w.write_string("Alice").unwrap();
        })
        .await;

    // Login-phase Disconnect with a version message.
    let fields = client.read_until(0x00).await;
    let mut r = ReadBuf::new(&fields);
    let reason = r.read_string().unwrap();
    assert!(reason.contains("version"), "reason: {reason}");
}

#[tokio::test]
async fn test_duplicate_login_evicts_first_session() {
    let addr = start_server(test_config()).await;

    let mut first = TestClient::connect(addr).await;
    first.handshake(PROTOCOL_VERSION, 2).await;
    first.login("Alice").await;
    first.read_until(0x24).await;

    let mut second = TestClient::connect(addr).await;
    second.handshake(PROTOCOL_VERSION, 2).await;
    second.login("Alice").await;
    second.read_until(0x24).await;

    // The first session gets the Play-state Disconnect.
    let deadline = Duration::from_secs(5);
    let fields = tokio::time::timeout(deadline, first.read_until(0x19))
        .await
        .expect("first session was not evicted");
    let mut r = ReadBuf::new(&fields);
    let reason = r.read_string().unwrap();
    assert!(reason.contains("another location"), "reason: {reason}");
}

#[tokio::test]
async fn test_capacity_refusal() {
    let mut config = test_config();
    config.max_players = 1;
    let addr = start_server(config).await;

    let mut first = TestClient::connect(addr).await;
    first.handshake(PROTOCOL_VERSION, 2).await;
    first.login("Alice").await;
    first.read_until(0x24).await;

    let mut second = TestClient::connect(addr).await;
    second.handshake(PROTOCOL_VERSION, 2).await;
    second
        .send_packet(0x00, |w| {
            w.write_string("Bob").unwrap();
        })
        .await;

    let fields = second.read_until(0x00).await;
    let mut r = ReadBuf::new(&fields);
    let reason = r.read_string().unwrap();
    assert!(reason.contains("full"), "reason: {reason}");
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_flow_and_timeout() {
    let mut config = test_config();
    config.keepalive_interval_ms = 150;
    config.keepalive_timeout_ms = 300;
    let addr = start_server(config).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 2).await;
    client.login("Alice").await;
    client.read_until(0x24).await;

    // The first KeepAlive arrives on virtual time; echo it and the
    // session survives to the next one.
    let fields = client.read_until(0x1F).await;
    let mut r = ReadBuf::new(&fields);
    let token = r.read_i64().unwrap();
    client.send_packet(0x10, |w| w.write_i64(token)).await;

    client.read_until(0x1F).await;
    let ignored_at = tokio::time::Instant::now();

    // Never echo this one. The echo deadline closes the connection with
    // no Disconnect packet, so the client just sees EOF; the clock only
    // moves by timer auto-advance, making the deadline exact.
    let closed = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            if client.read_packet().await.is_none() {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection was not closed after missed echo");
    assert!(
        ignored_at.elapsed() >= Duration::from_millis(300),
        "closed before the echo deadline"
    );
}

#[tokio::test]
async fn test_idle_grace_refreshed_by_any_packet() {
    let handler = Arc::new(RecordingHandler {
        chats: Mutex::new(Vec::new()),
    });

    // Keep-alives pushed far out so the idle window acts alone.
    let mut config = test_config();
    config.keepalive_interval_ms = 3_600_000;
    config.keepalive_timeout_ms = 3_600_000;
    config.idle_timeout_ms = 10_000;
    let addr = start_server_with(config, handler.clone()).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 2).await;
    client.login("Alice").await;
    client.read_until(0x24).await;

    // Stay busy across three idle windows; every movement packet
    // refreshes the grace window, so the session must survive.
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(6)).await;
        client.send_packet(0x15, |w| w.write_bool(true)).await;
    }

    // Still alive: a chat sent now reaches the handler.
    client
        .send_packet(0x03, |w| {
            w.write_string("still here").unwrap();
        })
        .await;
    for _ in 0..50 {
        if !handler.chats.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        handler.chats.lock().unwrap().len(),
        1,
        "session died while it was still sending packets"
    );

    // Go silent; the idle window alone must drop the connection.
    let silent_at = tokio::time::Instant::now();
    let closed = tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            if client.read_packet().await.is_none() {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "idle connection was not dropped");
    assert!(
        silent_at.elapsed() >= Duration::from_secs(9),
        "dropped before the idle window elapsed"
    );
}

#[tokio::test]
async fn test_unknown_play_packet_is_skipped() {
    let mut config = test_config();
    config.keepalive_interval_ms = 200;
    let addr = start_server(config).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 2).await;
    client.login("Alice").await;
    client.read_until(0x24).await;

    // 0x01 (QueryBlockNBT) is deliberately absent from the registry.
    client
        .send_packet(0x01, |w| {
            w.write_varint(1);
            w.write_raw(&[0xAA; 10]);
        })
        .await;

    // The session survives: the next keep-alive still arrives.
    tokio::time::timeout(Duration::from_secs(5), client.read_until(0x1F))
        .await
        .expect("connection died on unknown packet");
}

#[tokio::test]
async fn test_malformed_known_packet_closes_connection() {
    let addr = start_server(test_config()).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 2).await;
    client.login("Alice").await;
    client.read_until(0x24).await;

    // KeepAlive echo with a truncated token.
    client.send_packet(0x10, |w| w.write_u8(1)).await;

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if client.read_packet().await.is_none() {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "malformed packet did not close the connection");
}

struct AcceptAllAuthenticator;

impl lodestone_bin::handler::Authenticator for AcceptAllAuthenticator {
    fn verify_session(
        &self,
        username: &str,
        _server_hash: &str,
    ) -> Result<PlayerProfile, lodestone_bin::handler::AuthError> {
        Ok(PlayerProfile {
            uuid:     uuid::Uuid::from_u128(0xFEED_F00D),
            username: username.to_string(),
        })
    }
}

#[tokio::test]
async fn test_online_mode_login_over_encryption() {
    use rsa::pkcs8::DecodePublicKey;
    use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

    let mut config = test_config();
    config.online_mode = true;
    let server = Server::bind_with(
        config,
        Arc::new(lodestone_bin::handler::NullHandler),
        Arc::new(AcceptAllAuthenticator),
        Arc::new(lodestone_bin::world::FlatWorld::new()),
    )
    .await
    .expect("bind");
    let addr = server.local_addr();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 2).await;
    client
        .send_packet(0x00, |w| {
            w.write_string("Alice").unwrap();
        })
        .await;

    // EncryptionRequest: server id, DER public key, verify token.
    let fields = client.read_until(0x01).await;
    let mut r = ReadBuf::new(&fields);
    let server_id = r.read_string().unwrap();
    assert!(server_id.is_empty());
    let public_key_der = r.read_byte_array().unwrap();
    let verify_token = r.read_byte_array().unwrap();
    assert_eq!(verify_token.len(), 4);

    let public_key = RsaPublicKey::from_public_key_der(&public_key_der).unwrap();
    let secret = [0x5Au8; 16];
    let mut rng = rand::rngs::OsRng;
    let encrypted_secret = public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &secret)
        .unwrap();
    let encrypted_token = public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &verify_token)
        .unwrap();

    client
        .send_packet(0x01, |w| {
            w.write_byte_array(&encrypted_secret);
            w.write_byte_array(&encrypted_token);
        })
        .await;

    // Every byte from here on is AES/CFB8 in both directions.
    client.reader.enable_encryption(&secret).unwrap();
    client.writer.enable_encryption(&secret).unwrap();

    // The rest proceeds exactly like offline mode, now over the cipher.
    let (id, fields) = client.read_packet().await.expect("login reply");
    let (id, fields) = if id == 0x03 {
        let mut r = ReadBuf::new(&fields);
        let threshold = r.read_varint().unwrap();
        client.reader.enable_compression().unwrap();
        client.writer.enable_compression(threshold).unwrap();
        client.read_packet().await.expect("login success")
    } else {
        (id, fields)
    };
    assert_eq!(id, 0x02);

    let mut r = ReadBuf::new(&fields);
    assert_eq!(r.read_uuid().unwrap(), uuid::Uuid::from_u128(0xFEED_F00D));
    assert_eq!(r.read_string().unwrap(), "Alice");

    client.read_until(0x24).await;
}

struct RecordingHandler {
    chats: Mutex<Vec<(String, String)>>,
}

impl EventHandler for RecordingHandler {
    fn on_chat(&self, profile: &PlayerProfile, message: &str) {
        self.chats
            .lock()
            .unwrap()
            .push((profile.username.clone(), message.to_string()));
    }
}

#[tokio::test]
async fn test_chat_reaches_handler() {
    let handler = Arc::new(RecordingHandler {
        chats: Mutex::new(Vec::new()),
    });
    let addr = start_server_with(test_config(), handler.clone()).await;

    let mut client = TestClient::connect(addr).await;
    client.handshake(PROTOCOL_VERSION, 2).await;
    client.login("Alice").await;
    client.read_until(0x24).await;

    client
        .send_packet(0x03, |w| {
            w.write_string("hello world").unwrap();
        })
        .await;

    // Delivery is asynchronous; poll briefly.
    for _ in 0..50 {
        if !handler.chats.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let chats = handler.chats.lock().unwrap();
    assert_eq!(chats.as_slice(), [("Alice".to_string(), "hello world".to_string())]);
}
