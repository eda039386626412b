//! Attachment uploads to the file-storage service.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use hearth_shared::models::ApiInfo;

use crate::error::{NetError, Result};

/// Bucket that message attachments are uploaded to.
pub const ATTACHMENTS_TAG: &str = "attachments";

/// Raw file picked by the user, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Upload one file and return the id messages refer to it by.
    async fn upload(&self, tag: &str, attachment: &Attachment) -> Result<String>;
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

/// [`FileStorage`] over HTTPS multipart uploads.
pub struct HttpFileStorage {
    client: Client,
    base_url: String,
}

impl HttpFileStorage {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from the `features.autumn.url` entry of the capability
    /// document, if the server advertises one.
    pub fn from_info(info: &ApiInfo) -> Result<Self> {
        let url = info
            .features
            .get("autumn")
            .filter(|f| f.get("enabled").and_then(|e| e.as_bool()).unwrap_or(true))
            .and_then(|f| f.get("url"))
            .and_then(|u| u.as_str())
            .ok_or(NetError::NoFileStorage)?;
        Ok(Self::new(url))
    }
}

#[async_trait]
impl FileStorage for HttpFileStorage {
    async fn upload(&self, tag: &str, attachment: &Attachment) -> Result<String> {
        let part = Part::bytes(attachment.bytes.clone())
            .file_name(attachment.filename.clone())
            .mime_str(&attachment.content_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, tag))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: UploadResponse = serde_json::from_slice(&response.bytes().await?)?;
        tracing::debug!(
            file = %attachment.filename,
            size = attachment.bytes.len(),
            id = %uploaded.id,
            "attachment uploaded"
        );
        Ok(uploaded.id)
    }
}
