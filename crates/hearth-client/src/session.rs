//! Session and connection lifecycle.
//!
//! One background task per sign-in owns the gateway connection: it fetches
//! the API info, connects, authenticates, bootstraps on `Ready` and then
//! feeds every frame through the reducer. When the connection drops it
//! sleeps for the backoff delay and starts over.
//!
//! Every run is tagged with an epoch. Stopping bumps the epoch, so a frame
//! or bootstrap result from an older run can never land in the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use hearth_net::{gateway_url, ApiClient, FileStorage, Gateway, GatewayConnection, HistoryQuery};
use hearth_shared::protocol::{ClientMessage, ReadyPayload, ServerEvent};
use hearth_shared::types::{ChannelId, MessageId};
use hearth_store::{Persister, StoreHandle, TokenStore};

use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, Notifier};
use crate::queue::OutboundQueue;
use crate::reducer::{self, Change};
use crate::state::ConnectionState;

const EVENT_CAPACITY: usize = 256;

/// External services the session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub api: Arc<dyn ApiClient>,
    pub gateway: Arc<dyn Gateway>,
    /// `None` when the server has no file storage; attachments then fail.
    pub files: Option<Arc<dyn FileStorage>>,
    pub tokens: Arc<dyn TokenStore>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Handle to the sync engine. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
    queue: OutboundQueue,
}

struct Inner {
    config: ClientConfig,
    store: StoreHandle,
    api: Arc<dyn ApiClient>,
    gateway: Arc<dyn Gateway>,
    tokens: Arc<dyn TokenStore>,
    notifier: Notifier,
    state_tx: watch::Sender<ConnectionState>,
    epoch: AtomicU64,
    run: Mutex<Option<RunHandle>>,
    /// Sender of the live connection, for typing indicators.
    outbound: Mutex<Option<mpsc::Sender<ClientMessage>>>,
}

struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        store: StoreHandle,
        persister: Option<Persister>,
        collaborators: Collaborators,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let notifier = Notifier::new(events_tx, persister);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        let queue = OutboundQueue::new(
            store.clone(),
            collaborators.api.clone(),
            collaborators.files,
            notifier.clone(),
        );

        let inner = Arc::new(Inner {
            config,
            store,
            api: collaborators.api,
            gateway: collaborators.gateway,
            tokens: collaborators.tokens,
            notifier,
            state_tx,
            epoch: AtomicU64::new(0),
            run: Mutex::new(None),
            outbound: Mutex::new(None),
        });

        Self { inner, queue }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.inner.store
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.notifier.subscribe()
    }

    // ---- Lifecycle ----

    /// Store `token` and start connecting with it.
    pub async fn sign_in(&self, token: &str) -> Result<()> {
        self.inner.tokens.save_token(token)?;
        info!("signed in, starting session");
        self.start(token.to_string()).await;
        Ok(())
    }

    /// Start connecting with the stored token.
    pub async fn resume(&self) -> Result<()> {
        let token = self
            .inner
            .tokens
            .load_token()?
            .ok_or(ClientError::NotAuthenticated)?;
        info!("resuming stored session");
        self.start(token).await;
        Ok(())
    }

    async fn start(&self, token: String) {
        self.stop().await;

        self.inner.api.set_token(Some(token.clone()));
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(self.inner.clone(), token, epoch, cancel.clone()));

        *self.inner.run.lock().await = Some(RunHandle { cancel, task });
    }

    /// Tear the connection down and cancel any pending reconnect. The
    /// stored token and the store are kept.
    pub async fn stop(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let handle = self.inner.run.lock().await.take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await {
                if !e.is_cancelled() {
                    error!(error = %e, "session task failed");
                }
            }
        }
        *self.inner.outbound.lock().await = None;
        if self.state() != ConnectionState::SignedOut {
            self.inner.set_state(ConnectionState::Disconnected);
        }
    }

    /// Stop the connection first, then forget the store and the token.
    pub async fn sign_out(&self) -> Result<()> {
        self.stop().await;
        self.inner.finish_sign_out().await
    }

    // ---- Operations ----

    /// Fetch one page of history ending before `before` (the newest page
    /// when `None`) and merge it into the channel. Returns how many
    /// messages the page held.
    pub async fn fetch_history(
        &self,
        channel: &ChannelId,
        before: Option<MessageId>,
    ) -> Result<usize> {
        let query = HistoryQuery {
            limit: self.inner.config.history_page_size,
            before,
        };
        let history = self
            .rest(self.inner.api.fetch_messages(channel, &query).await)
            .await?;
        let count = history.messages.len();

        self.inner.store.write(|s| {
            for user in history.users {
                s.put_user(user);
            }
            for member in history.members {
                s.put_member(member);
            }
            s.ensure_message_list(channel);
            for mut message in history.messages {
                if let Some(user) = message.user.take() {
                    s.put_user(*user);
                }
                if let Some(member) = message.member.take() {
                    s.put_member(*member);
                }
                s.insert_message(message);
            }
        })?;
        self.inner.notifier.changed(&Change::Channel(channel.clone()));
        debug!(channel = %channel, count, "history page merged");
        Ok(count)
    }

    /// Mark `message` as read. A marker already past it is left alone and
    /// nothing is sent.
    pub async fn ack(&self, channel: &ChannelId, message: &MessageId) -> Result<()> {
        let advanced = self.inner.store.write(|s| {
            let me = s.current_user_id().cloned()?;
            Some(s.ack(channel, &me, message))
        })?;
        match advanced {
            None => Err(ClientError::NotAuthenticated),
            Some(false) => Ok(()),
            Some(true) => {
                self.inner.notifier.changed(&Change::Channel(channel.clone()));
                self.rest(self.inner.api.ack(channel, message).await).await
            }
        }
    }

    pub async fn begin_typing(&self, channel: &ChannelId) -> Result<()> {
        self.send_control(ClientMessage::BeginTyping {
            channel: channel.clone(),
        })
        .await
    }

    pub async fn end_typing(&self, channel: &ChannelId) -> Result<()> {
        self.send_control(ClientMessage::EndTyping {
            channel: channel.clone(),
        })
        .await
    }

    /// Sign out when a REST call reports the session token as rejected.
    async fn rest<T>(&self, result: hearth_net::Result<T>) -> Result<T> {
        match result {
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "session token rejected");
                self.sign_out().await?;
                Err(ClientError::SessionInvalidated)
            }
            other => Ok(other?),
        }
    }

    async fn send_control(&self, message: ClientMessage) -> Result<()> {
        let sender = self
            .inner
            .outbound
            .lock()
            .await
            .clone()
            .ok_or(hearth_net::NetError::Closed)?;
        sender
            .send(message)
            .await
            .map_err(|_| hearth_net::NetError::Closed)?;
        Ok(())
    }
}

impl Inner {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn set_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            info!(state = %state, "connection state changed");
            self.notifier.emit(ClientEvent::StateChanged(state));
        }
    }

    /// Apply one event unless the run that produced it was superseded.
    fn apply(&self, epoch: u64, event: ServerEvent) -> Result<()> {
        let change = self.store.write(|s| {
            if !self.is_current(epoch) {
                return Change::None;
            }
            reducer::apply_event(s, event)
        })?;
        self.notifier.changed(&change);
        Ok(())
    }

    async fn finish_sign_out(&self) -> Result<()> {
        self.store.write(|s| s.clear())?;
        self.notifier.flush().await;
        self.tokens.clear_token()?;
        self.api.set_token(None);
        self.set_state(ConnectionState::SignedOut);
        self.notifier.emit(ClientEvent::SignedOut);
        info!("signed out");
        Ok(())
    }

    /// Sign out from inside the run task. Does nothing if the run was
    /// already superseded.
    async fn invalidate(&self, epoch: u64) {
        if self
            .epoch
            .compare_exchange(epoch, epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        warn!("session invalidated by server");
        *self.outbound.lock().await = None;
        if let Err(e) = self.finish_sign_out().await {
            error!(error = %e, "failed to complete sign-out");
        }
    }
}

// ---------------------------------------------------------------------------
// Connection loop
// ---------------------------------------------------------------------------

/// How a single connection attempt ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Dropped or failed; try again after the backoff delay.
    Retry,
    /// The server rejected the session.
    Invalidated,
    /// A newer run took over.
    Superseded,
}

async fn run(inner: Arc<Inner>, token: String, epoch: u64, cancel: CancellationToken) {
    let mut backoff = inner.config.backoff();

    loop {
        if !inner.is_current(epoch) {
            break;
        }
        inner.set_state(ConnectionState::Connecting);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = connect_once(&inner, &token, epoch, &mut backoff) => outcome,
        };
        *inner.outbound.lock().await = None;

        match outcome {
            Outcome::Retry => {}
            Outcome::Invalidated => {
                inner.invalidate(epoch).await;
                break;
            }
            Outcome::Superseded => break,
        }
        if !inner.is_current(epoch) {
            break;
        }

        inner.set_state(ConnectionState::Disconnected);
        let delay = backoff.next_delay();
        info!(
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!(epoch, "session task stopped");
}

async fn connect_once(
    inner: &Arc<Inner>,
    token: &str,
    epoch: u64,
    backoff: &mut Backoff,
) -> Outcome {
    // ---- 1. Capabilities ----
    let info = match inner.api.fetch_info().await {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, "failed to fetch API info");
            return Outcome::Retry;
        }
    };
    debug!(version = %info.version, "API info fetched");

    let base = inner.config.ws_url_override.as_deref().unwrap_or(&info.ws);
    let url = match gateway_url(base) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, url = %base, "invalid gateway URL");
            return Outcome::Retry;
        }
    };

    // ---- 2. Connect and authenticate ----
    let mut conn = match inner.gateway.connect(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(error = %e, "gateway connect failed");
            return Outcome::Retry;
        }
    };
    if let Err(e) = conn
        .send(ClientMessage::Authenticate {
            token: token.to_string(),
        })
        .await
    {
        warn!(error = %e, "failed to send authenticate");
        return Outcome::Retry;
    }
    *inner.outbound.lock().await = Some(conn.sender());
    let _ping = AbortOnDrop(spawn_ping(&conn, inner.config.ping_interval()));

    // ---- 3. Event stream ----
    let mut ready = false;
    loop {
        let Some(frame) = conn.recv().await else {
            info!("gateway connection closed");
            return Outcome::Retry;
        };
        if !inner.is_current(epoch) {
            return Outcome::Superseded;
        }

        let event = match ServerEvent::from_json(&frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, len = frame.len(), "dropping malformed event");
                continue;
            }
        };

        match event {
            ServerEvent::Authenticated => debug!("gateway authenticated"),
            ServerEvent::Pong { .. } => trace!("pong"),
            ServerEvent::InvalidSession | ServerEvent::Logout => return Outcome::Invalidated,
            ServerEvent::Error { error } => {
                warn!(error = %error, "gateway error");
                if !ready {
                    return Outcome::Retry;
                }
            }
            ServerEvent::Ready(payload) => match bootstrap(inner, epoch, payload).await {
                Ok(()) => {
                    ready = true;
                    backoff.reset();
                    inner.set_state(ConnectionState::Connected);
                }
                Err(ClientError::Net(e)) if e.is_unauthorized() => return Outcome::Invalidated,
                Err(ClientError::SignedOut) => return Outcome::Superseded,
                Err(e) => {
                    warn!(error = %e, "bootstrap failed");
                    return Outcome::Retry;
                }
            },
            event => {
                if let Err(e) = inner.apply(epoch, event) {
                    error!(error = %e, "failed to apply event");
                    return Outcome::Retry;
                }
            }
        }
    }
}

/// Seed the store from `Ready`, fetch what the snapshot leaves out and
/// reconcile cached history against it.
async fn bootstrap(inner: &Arc<Inner>, epoch: u64, payload: ReadyPayload) -> Result<()> {
    info!(
        users = payload.users.len(),
        servers = payload.servers.len(),
        channels = payload.channels.len(),
        "received ready"
    );
    inner.store.write(|s| {
        if inner.is_current(epoch) {
            reducer::seed_ready(s, payload);
        }
    })?;

    let (me, dms, unreads) = tokio::try_join!(
        inner.api.fetch_self(),
        inner.api.fetch_dms(),
        inner.api.fetch_unreads(),
    )?;

    let stale = inner.store.write(|s| {
        if !inner.is_current(epoch) {
            return None;
        }
        s.set_current_user(me.id.clone());
        s.put_user(me);
        Some(reducer::merge_bootstrap(s, dms, unreads))
    })?;
    let Some(stale) = stale else {
        return Err(ClientError::SignedOut);
    };
    if !stale.is_empty() {
        info!(count = stale.len(), "invalidated stale channel history");
    }
    inner.notifier.changed(&Change::Store);
    Ok(())
}

fn spawn_ping(conn: &GatewayConnection, period: Duration) -> JoinHandle<()> {
    let sender = conn.sender();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            let data = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
            if sender.send(ClientMessage::Ping { data }).await.is_err() {
                break;
            }
        }
    })
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
