//! REST API client.

use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use hearth_shared::models::{ApiInfo, Channel, ChannelUnread, Member, Message, Reply, User};
use hearth_shared::types::{ChannelId, MessageId};

use crate::error::{NetError, Result};

/// Header carrying the session token on authenticated calls.
pub const SESSION_HEADER: &str = "x-session-token";

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub content: String,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
}

/// One page of channel history, newest first as the server returns it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageHistory {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: u32,
    /// Only messages older than this id.
    pub before: Option<MessageId>,
}

/// Request/response calls the sync engine needs.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Install or forget the token used on authenticated calls.
    fn set_token(&self, token: Option<String>);

    /// Capability document; needs no token.
    async fn fetch_info(&self) -> Result<ApiInfo>;

    async fn fetch_self(&self) -> Result<User>;

    async fn fetch_dms(&self) -> Result<Vec<Channel>>;

    async fn fetch_unreads(&self) -> Result<Vec<ChannelUnread>>;

    async fn send_message(&self, channel: &ChannelId, message: &SendMessage) -> Result<Message>;

    async fn fetch_messages(&self, channel: &ChannelId, query: &HistoryQuery)
        -> Result<MessageHistory>;

    async fn ack(&self, channel: &ChannelId, message: &MessageId) -> Result<()>;
}

/// [`ApiClient`] over HTTPS.
pub struct HttpApi {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let token = token.ok_or(NetError::NotAuthenticated)?;
        Ok(request.header(SESSION_HEADER, token))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.authed(self.client.get(self.url(path)))?;
        decode(check(request.send().await?).await?).await
    }
}

/// Turn a non-success status into [`NetError::Status`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NetError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl ApiClient for HttpApi {
    fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    async fn fetch_info(&self) -> Result<ApiInfo> {
        let response = self.client.get(self.url("/")).send().await?;
        decode(check(response).await?).await
    }

    async fn fetch_self(&self) -> Result<User> {
        self.get_json("/users/@me").await
    }

    async fn fetch_dms(&self) -> Result<Vec<Channel>> {
        self.get_json("/users/dms").await
    }

    async fn fetch_unreads(&self) -> Result<Vec<ChannelUnread>> {
        self.get_json("/sync/unreads").await
    }

    async fn send_message(&self, channel: &ChannelId, message: &SendMessage) -> Result<Message> {
        let request = self
            .client
            .post(self.url(&format!("/channels/{channel}/messages")))
            .header("Idempotency-Key", &message.nonce)
            .json(message);
        let response = self.authed(request)?.send().await?;

        tracing::debug!(channel = %channel, nonce = %message.nonce, "message submitted");
        decode(check(response).await?).await
    }

    async fn fetch_messages(
        &self,
        channel: &ChannelId,
        query: &HistoryQuery,
    ) -> Result<MessageHistory> {
        let mut params = vec![
            ("limit", query.limit.to_string()),
            ("include_users", "true".to_string()),
        ];
        if let Some(before) = &query.before {
            params.push(("before", before.to_string()));
        }
        let request = self
            .client
            .get(self.url(&format!("/channels/{channel}/messages")))
            .query(&params);
        let response = self.authed(request)?.send().await?;
        decode(check(response).await?).await
    }

    async fn ack(&self, channel: &ChannelId, message: &MessageId) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!("/channels/{channel}/ack/{message}")));
        check(self.authed(request)?.send().await?).await?;
        Ok(())
    }
}
