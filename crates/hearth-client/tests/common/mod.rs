//! In-memory collaborators for driving a [`Session`] end to end.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use url::Url;

use hearth_client::{ClientConfig, Collaborators, ConnectionState, Session};
use hearth_net::{
    ApiClient, Gateway, GatewayConnection, HistoryQuery, MessageHistory, NetError, SendMessage,
};
use hearth_shared::models::{ApiInfo, Channel, ChannelUnread, Message, User};
use hearth_shared::protocol::ClientMessage;
use hearth_shared::types::{ChannelId, MessageId};
use hearth_store::{EntityStore, MemoryTokenStore, Persister, StoreHandle, TokenStore};

pub const TOKEN: &str = "session-token";

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeApi {
    pub token: Mutex<Option<String>>,
    pub dms: Mutex<Vec<Channel>>,
    pub unreads: Mutex<Vec<ChannelUnread>>,
    pub history: Mutex<MessageHistory>,
    pub sent: Mutex<Vec<SendMessage>>,
    pub acks: Mutex<Vec<(ChannelId, MessageId)>>,
    pub fail_sends: AtomicBool,
    pub reject_session: AtomicBool,
    /// When set, sends wait for a permit before answering.
    pub send_gate: Option<Arc<Semaphore>>,
}

impl FakeApi {
    /// Id the fake server assigns to the message sent with `nonce`.
    pub fn confirmed_id(nonce: &str) -> MessageId {
        MessageId::new(format!("{nonce}Z"))
    }
}

#[async_trait]
impl ApiClient for FakeApi {
    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    async fn fetch_info(&self) -> hearth_net::Result<ApiInfo> {
        Ok(serde_json::from_value(json!({
            "version": "test",
            "ws": "ws://gateway.test"
        }))?)
    }

    async fn fetch_self(&self) -> hearth_net::Result<User> {
        if self.reject_session.load(Ordering::SeqCst) {
            return Err(NetError::Status {
                status: 401,
                body: "unauthorized".into(),
            });
        }
        Ok(serde_json::from_value(user_json("me", "User"))?)
    }

    async fn fetch_dms(&self) -> hearth_net::Result<Vec<Channel>> {
        Ok(self.dms.lock().unwrap().clone())
    }

    async fn fetch_unreads(&self) -> hearth_net::Result<Vec<ChannelUnread>> {
        Ok(self.unreads.lock().unwrap().clone())
    }

    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &SendMessage,
    ) -> hearth_net::Result<Message> {
        self.sent.lock().unwrap().push(message.clone());
        if let Some(gate) = &self.send_gate {
            let _permit = gate.acquire().await.map_err(|_| NetError::Closed)?;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(NetError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(serde_json::from_value(confirmed_message_json(
            channel.as_str(),
            &message.nonce,
            &message.content,
        ))?)
    }

    async fn fetch_messages(
        &self,
        _channel: &ChannelId,
        _query: &HistoryQuery,
    ) -> hearth_net::Result<MessageHistory> {
        if self.reject_session.load(Ordering::SeqCst) {
            return Err(NetError::Status {
                status: 401,
                body: "unauthorized".into(),
            });
        }
        Ok(self.history.lock().unwrap().clone())
    }

    async fn ack(&self, channel: &ChannelId, message: &MessageId) -> hearth_net::Result<()> {
        self.acks
            .lock()
            .unwrap()
            .push((channel.clone(), message.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Server end of one fake gateway connection.
pub struct ServerSide {
    pub from_client: mpsc::Receiver<ClientMessage>,
    pub to_client: mpsc::Sender<String>,
}

impl ServerSide {
    pub async fn push(&self, event: Value) {
        self.to_client.send(event.to_string()).await.unwrap();
    }

    pub async fn push_raw(&self, frame: &str) {
        self.to_client.send(frame.to_string()).await.unwrap();
    }

    /// Wait for the handshake and return the token it carried.
    pub async fn expect_authenticate(&mut self) -> String {
        loop {
            match self.from_client.recv().await {
                Some(ClientMessage::Authenticate { token }) => return token,
                Some(_) => continue,
                None => panic!("client hung up before authenticating"),
            }
        }
    }
}

pub struct FakeGateway {
    pub attempts: Mutex<Vec<Instant>>,
    failures_left: AtomicUsize,
    conns: mpsc::UnboundedSender<ServerSide>,
}

impl FakeGateway {
    pub fn new(failures: usize) -> (Self, mpsc::UnboundedReceiver<ServerSide>) {
        let (conns, rx) = mpsc::unbounded_channel();
        (
            Self {
                attempts: Mutex::new(Vec::new()),
                failures_left: AtomicUsize::new(failures),
                conns,
            },
            rx,
        )
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn connect(&self, _url: &Url) -> hearth_net::Result<GatewayConnection> {
        self.attempts.lock().unwrap().push(Instant::now());
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(NetError::Closed);
        }

        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);
        self.conns
            .send(ServerSide {
                from_client: out_rx,
                to_client: in_tx,
            })
            .map_err(|_| NetError::Closed)?;
        Ok(GatewayConnection::new(out_tx, in_rx))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub session: Session,
    pub api: Arc<FakeApi>,
    pub gateway: Arc<FakeGateway>,
    pub conns: mpsc::UnboundedReceiver<ServerSide>,
    pub tokens: Arc<MemoryTokenStore>,
}

pub struct HarnessOptions {
    pub gateway_failures: usize,
    pub api: FakeApi,
    pub store: EntityStore,
    pub persister: Option<Persister>,
    pub store_handle: Option<StoreHandle>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            gateway_failures: 0,
            api: FakeApi::default(),
            store: EntityStore::new(),
            persister: None,
            store_handle: None,
        }
    }
}

pub fn harness() -> Harness {
    harness_with(HarnessOptions::default())
}

pub fn harness_with(options: HarnessOptions) -> Harness {
    let api = Arc::new(options.api);
    let (gateway, conns) = FakeGateway::new(options.gateway_failures);
    let gateway = Arc::new(gateway);
    let tokens = Arc::new(MemoryTokenStore::new());
    let store = options
        .store_handle
        .unwrap_or_else(|| StoreHandle::new(options.store));

    let session = Session::new(
        ClientConfig::default(),
        store,
        options.persister,
        Collaborators {
            api: api.clone(),
            gateway: gateway.clone(),
            files: None,
            tokens: tokens.clone(),
        },
    );

    Harness {
        session,
        api,
        gateway,
        conns,
        tokens,
    }
}

impl Harness {
    /// Sign in and wait for the gateway handshake.
    pub async fn connect(&mut self) -> ServerSide {
        self.session.sign_in(TOKEN).await.unwrap();
        self.next_connection().await
    }

    pub async fn next_connection(&mut self) -> ServerSide {
        let mut conn = self.conns.recv().await.expect("gateway dropped");
        assert_eq!(conn.expect_authenticate().await, TOKEN);
        conn
    }

    /// Sign in, deliver the standard `Ready` and wait until connected.
    pub async fn connect_ready(&mut self) -> ServerSide {
        let conn = self.connect().await;
        conn.push(ready_json()).await;
        wait_for_state(&self.session, ConnectionState::Connected).await;
        conn
    }

    pub fn stored_token(&self) -> Option<String> {
        self.tokens.load_token().unwrap()
    }
}

pub async fn wait_for_state(session: &Session, state: ConnectionState) {
    let mut rx = session.watch_state();
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}"))
        .unwrap();
}

/// Poll the store until `check` holds.
pub async fn eventually(session: &Session, check: impl Fn(&EntityStore) -> bool) {
    for _ in 0..400 {
        if session.store().read(&check).unwrap() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("store never reached the expected state");
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

pub fn user_json(id: &str, relationship: &str) -> Value {
    json!({
        "_id": id,
        "username": id,
        "discriminator": "0001",
        "relationship": relationship
    })
}

/// Self user `me`, friend `other`, server `s1` owned by `owner` with text
/// channel `c1`, and `me`'s membership.
pub fn ready_json() -> Value {
    json!({
        "type": "Ready",
        "users": [user_json("me", "User"), user_json("other", "Friend")],
        "servers": [{
            "_id": "s1",
            "owner": "owner",
            "name": "home",
            "channels": ["c1"],
            "default_permissions": hearth_shared::permissions::Permissions::DEFAULT_SERVER.bits()
        }],
        "channels": [{
            "channel_type": "TextChannel",
            "_id": "c1",
            "server": "s1",
            "name": "general"
        }],
        "members": [{
            "_id": {"server": "s1", "user": "me"},
            "joined_at": "2024-01-01T00:00:00Z"
        }],
        "emojis": []
    })
}

pub fn message_json(id: &str, channel: &str, author: &str) -> Value {
    json!({
        "type": "Message",
        "_id": id,
        "channel": channel,
        "author": author,
        "content": format!("message {id}")
    })
}

pub fn confirmed_message_json(channel: &str, nonce: &str, content: &str) -> Value {
    json!({
        "_id": FakeApi::confirmed_id(nonce),
        "nonce": nonce,
        "channel": channel,
        "author": "me",
        "content": content
    })
}
