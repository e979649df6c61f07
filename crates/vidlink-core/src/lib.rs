#![forbid(unsafe_code)]

pub mod checker;
pub mod config;
pub mod indicator;
pub mod list;
pub mod loader;
pub mod preview;
pub mod probe;
pub mod store;
pub mod validate;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

pub use checker::{CheckReport, LinkChecker, CHECKING_MESSAGE};
pub use config::{LinkConfig, DEFAULT_SEED_URL};
pub use indicator::{IndicatorSnapshot, LinkStatus, StatusIndicator};
pub use list::{AddOutcome, ListEntry, ListError, ListState, RecheckSummary, VideoList};
pub use loader::{
    ContainerFormat, HttpMediaLoader, LoadError, MediaLoader, MediaMetadata, MediaSession,
    TeardownError,
};
pub use preview::{PreviewPlayer, PreviewSnapshot};
pub use probe::{ProbeOutcome, ProbeReport, ProbeResult, Prober};
pub use store::{JsonFileStore, ListStore, MemoryStore, StoreError, LIST_KEY};
pub use validate::{validate, ValidationError, VideoUrl};
pub use webhook::{
    notification_channel, Notification, StatusChange, WebhookConfig, WebhookDispatcher,
    WebhookPayload,
};
