mod http;
mod sniff;

pub use http::HttpMediaLoader;
pub use sniff::{sniff_container, ContainerFormat};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::validate::VideoUrl;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("HTTP error {status} loading {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },
    #[error("Network error loading {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("{url} does not look like playable media ({reason})")]
    NotMedia { url: String, reason: String },
}

impl LoadError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("Failed to tear down media session for {url}: {reason}")]
pub struct TeardownError {
    pub url: String,
    pub reason: String,
}

/// What a successful metadata load learned about the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerFormat>,
    /// Total resource size when the server reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

/// A disposable handle used for exactly one metadata load.
///
/// The prober calls [`MediaSession::teardown`] once after the load settles
/// or is abandoned; implementations release any in-flight transfer there.
#[async_trait]
pub trait MediaSession: Send {
    async fn load_metadata(&mut self) -> Result<MediaMetadata, LoadError>;

    fn teardown(&mut self) -> Result<(), TeardownError>;
}

/// Opens media sessions. Object-safe and shareable across tasks.
pub trait MediaLoader: Send + Sync {
    fn open(&self, url: &VideoUrl) -> Box<dyn MediaSession>;
}
