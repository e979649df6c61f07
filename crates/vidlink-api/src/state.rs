use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;

use vidlink_core::{
    LinkChecker, LinkConfig, ListStore, MediaLoader, MemoryStore, Notification, PreviewPlayer,
    Prober, StatusIndicator, VideoList,
};

/// Shared handles for the single-link checker and the video list.
///
/// Both write to one status indicator slot. Only list updates auto-hide; a
/// single-link result stays until the next update.
#[derive(Clone)]
pub struct AppState {
    pub checker: LinkChecker,
    pub list: VideoList,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: LinkConfig,
        loader: Arc<dyn MediaLoader>,
        store: Arc<dyn ListStore>,
        notification_tx: Option<UnboundedSender<Notification>>,
    ) -> Self {
        let prober = Prober::from_config(loader, &config);
        let indicator = StatusIndicator::new(config.indicator_hide_delay);
        let checker = LinkChecker::new(
            prober.clone(),
            indicator.with_hide_delay(None),
            PreviewPlayer::new(),
            config.accepted_extensions.clone(),
        );
        let list = VideoList::new(config, prober, store, indicator, notification_tx);

        Self {
            checker,
            list,
            started_at: Utc::now(),
        }
    }

    /// State backed by a [`MemoryStore`] and no notifications.
    pub fn in_memory(config: LinkConfig, loader: Arc<dyn MediaLoader>) -> Self {
        Self::new(config, loader, Arc::new(MemoryStore::new()), None)
    }
}
