//! Bounded-time liveness probing.
//!
//! A probe opens one disposable [`MediaSession`], races its metadata load
//! against the configured timeout and tears the session down exactly once,
//! whichever side wins. The losing branch of the race is dropped, which
//! cancels it; there is no shared completion flag.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::loader::{LoadError, MediaLoader, MediaMetadata};
use crate::validate::{ValidationError, VideoUrl};

pub const LIVE_MESSAGE: &str = "Video link is live!";
pub const LOAD_ERROR_MESSAGE: &str = "Video link is not accessible or offline";
pub const TIMEOUT_MESSAGE: &str = "Link is not responding or offline";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProbeResult {
    Live,
    Offline { message: String },
    Invalid { message: String },
}

impl ProbeResult {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Live => LIVE_MESSAGE,
            Self::Offline { message } | Self::Invalid { message } => message,
        }
    }
}

impl From<ValidationError> for ProbeResult {
    fn from(e: ValidationError) -> Self {
        Self::Invalid {
            message: e.to_string(),
        }
    }
}

/// How a probe ended, before it is reduced to a [`ProbeResult`].
#[derive(Debug)]
pub enum ProbeOutcome {
    Loaded(MediaMetadata),
    Failed(LoadError),
    TimedOut,
}

impl ProbeOutcome {
    pub fn result(&self) -> ProbeResult {
        match self {
            Self::Loaded(_) => ProbeResult::Live,
            Self::Failed(_) => ProbeResult::Offline {
                message: LOAD_ERROR_MESSAGE.to_string(),
            },
            Self::TimedOut => ProbeResult::Offline {
                message: TIMEOUT_MESSAGE.to_string(),
            },
        }
    }
}

#[derive(Debug)]
pub struct ProbeReport {
    pub url: VideoUrl,
    pub outcome: ProbeOutcome,
    pub elapsed: Duration,
}

impl ProbeReport {
    pub fn result(&self) -> ProbeResult {
        self.outcome.result()
    }

    pub fn metadata(&self) -> Option<&MediaMetadata> {
        match &self.outcome {
            ProbeOutcome::Loaded(meta) => Some(meta),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Prober {
    loader: Arc<dyn MediaLoader>,
    timeout: Duration,
}

impl Prober {
    pub fn new(loader: Arc<dyn MediaLoader>, timeout: Duration) -> Self {
        Self { loader, timeout }
    }

    pub fn from_config(loader: Arc<dyn MediaLoader>, config: &crate::config::LinkConfig) -> Self {
        Self::new(loader, config.probe_timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn probe(&self, url: &VideoUrl) -> ProbeResult {
        self.probe_report(url).await.result()
    }

    pub async fn probe_report(&self, url: &VideoUrl) -> ProbeReport {
        let started = tokio::time::Instant::now();
        let mut session = self.loader.open(url);

        let outcome = {
            let load = session.load_metadata();
            tokio::select! {
                res = load => match res {
                    Ok(meta) => ProbeOutcome::Loaded(meta),
                    Err(e) => ProbeOutcome::Failed(e),
                },
                _ = tokio::time::sleep(self.timeout) => ProbeOutcome::TimedOut,
            }
        };

        if let Err(e) = session.teardown() {
            debug!(url = %url, error = %e, "Ignoring media session teardown failure");
        }

        let elapsed = started.elapsed();
        match &outcome {
            ProbeOutcome::Loaded(_) => {
                debug!(url = %url, elapsed_ms = elapsed.as_millis() as u64, "Probe succeeded")
            }
            ProbeOutcome::Failed(e) => warn!(url = %url, error = %e, "Probe failed"),
            ProbeOutcome::TimedOut => warn!(
                url = %url,
                timeout_ms = self.timeout.as_millis() as u64,
                "Probe timed out"
            ),
        }

        ProbeReport {
            url: url.clone(),
            outcome,
            elapsed,
        }
    }
}
