use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::validate::VideoUrl;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewSnapshot {
    pub url: Option<VideoUrl>,
    pub visible: bool,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Playback surface for the last link confirmed live.
#[derive(Clone, Default)]
pub struct PreviewPlayer {
    state: Arc<RwLock<PreviewSnapshot>>,
}

impl PreviewPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, url: &VideoUrl) {
        let mut state = self.state.write().await;
        state.url = Some(url.clone());
        state.visible = true;
        state.loaded_at = Some(Utc::now());
        info!(url = %url, "Preview loaded");
    }

    /// Hides the surface; the last URL is kept.
    pub async fn hide(&self) {
        self.state.write().await.visible = false;
    }

    pub async fn snapshot(&self) -> PreviewSnapshot {
        self.state.read().await.clone()
    }
}
