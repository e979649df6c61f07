use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use super::sniff::sniff_container;
use super::{LoadError, MediaLoader, MediaMetadata, MediaSession, TeardownError};
use crate::validate::VideoUrl;

/// Bytes inspected for a container signature. MPEG-TS needs a second sync byte at 188.
const SNIFF_BYTES: usize = 512;

/// Media loader that requests only the leading bytes of a resource.
#[derive(Debug, Clone)]
pub struct HttpMediaLoader {
    client: Client,
    metadata_bytes: u64,
}

impl HttpMediaLoader {
    pub fn new(metadata_bytes: u64) -> reqwest::Result<Self> {
        Ok(Self::with_client(Self::build_client()?, metadata_bytes))
    }

    pub fn with_client(client: Client, metadata_bytes: u64) -> Self {
        Self {
            client,
            metadata_bytes: metadata_bytes.max(1),
        }
    }

    pub fn from_config(config: &crate::config::LinkConfig) -> reqwest::Result<Self> {
        Self::new(config.metadata_bytes)
    }

    pub fn from_config_with_client(config: &crate::config::LinkConfig, client: Client) -> Self {
        Self::with_client(client, config.metadata_bytes)
    }

    /// Client shared by probes and webhooks. Probe deadlines are enforced by
    /// the prober, so no overall request timeout is set here.
    pub fn build_client() -> reqwest::Result<Client> {
        Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(20)
            .user_agent(concat!("vidlink/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

impl MediaLoader for HttpMediaLoader {
    fn open(&self, url: &VideoUrl) -> Box<dyn MediaSession> {
        Box::new(HttpMediaSession {
            client: self.client.clone(),
            url: url.as_str().to_string(),
            metadata_bytes: self.metadata_bytes,
            response: None,
            torn_down: false,
        })
    }
}

struct HttpMediaSession {
    client: Client,
    url: String,
    metadata_bytes: u64,
    /// Body left open after sniffing; dropped on teardown to end the transfer.
    response: Option<Response>,
    torn_down: bool,
}

#[async_trait]
impl MediaSession for HttpMediaSession {
    async fn load_metadata(&mut self) -> Result<MediaMetadata, LoadError> {
        let range = format!("bytes=0-{}", self.metadata_bytes - 1);
        let mut response = self
            .client
            .get(&self.url)
            .header(RANGE, range)
            // Byte ranges must address the stored file, not a compressed body.
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| LoadError::Network {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Http {
                url: self.url.clone(),
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        let total_bytes = total_size(&response, status);

        let limit = SNIFF_BYTES.min(self.metadata_bytes as usize);
        let mut header: Vec<u8> = Vec::with_capacity(limit);
        while header.len() < limit {
            match response.chunk().await {
                Ok(Some(chunk)) => header.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    return Err(LoadError::Network {
                        url: self.url.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        }
        header.truncate(limit);
        self.response = Some(response);

        let container = sniff_container(&header);
        let is_video_type = content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("video/") || ct.starts_with("application/mp4"));

        if container.is_none() && !is_video_type {
            return Err(LoadError::NotMedia {
                url: self.url.clone(),
                reason: format!(
                    "content type {}, no known container signature",
                    content_type.as_deref().unwrap_or("unknown")
                ),
            });
        }

        debug!(url = %self.url, ?container, ?content_type, "Media metadata loaded");
        Ok(MediaMetadata {
            status_code: Some(status.as_u16()),
            content_type,
            container,
            total_bytes,
        })
    }

    fn teardown(&mut self) -> Result<(), TeardownError> {
        if self.torn_down {
            return Err(TeardownError {
                url: self.url.clone(),
                reason: "session already torn down".to_string(),
            });
        }
        self.torn_down = true;
        drop(self.response.take());
        Ok(())
    }
}

fn total_size(response: &Response, status: StatusCode) -> Option<u64> {
    let headers = response.headers();
    if status == StatusCode::PARTIAL_CONTENT {
        // Content-Range: bytes 0-65535/1048576
        return headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|total| total.trim().parse().ok());
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
