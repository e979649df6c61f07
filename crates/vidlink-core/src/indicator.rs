//! Single-slot status indicator.
//!
//! The slot holds the state and message of the most recent `show` call.
//! When a hide delay is configured, the slot reverts to
//! [`LinkStatus::Hidden`] once the delay passes without another `show`.
//! A later `show` supersedes the pending hide of an earlier one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::trace;

use crate::probe::ProbeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Hidden,
    Checking,
    Live,
    Offline,
}

impl LinkStatus {
    pub fn from_result(result: &ProbeResult) -> Self {
        match result {
            ProbeResult::Live => Self::Live,
            ProbeResult::Offline { .. } | ProbeResult::Invalid { .. } => Self::Offline,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden => write!(f, "hidden"),
            Self::Checking => write!(f, "checking"),
            Self::Live => write!(f, "live"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub status: LinkStatus,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl IndicatorSnapshot {
    fn hidden() -> Self {
        Self {
            status: LinkStatus::Hidden,
            message: String::new(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct StatusIndicator {
    tx: Arc<watch::Sender<IndicatorSnapshot>>,
    generation: Arc<AtomicU64>,
    hide_delay: Option<Duration>,
}

impl StatusIndicator {
    pub fn new(hide_delay: Option<Duration>) -> Self {
        let (tx, _rx) = watch::channel(IndicatorSnapshot::hidden());
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            hide_delay,
        }
    }

    /// Indicator that stays on its last state until the next `show`.
    pub fn persistent() -> Self {
        Self::new(None)
    }

    /// Handle on the same slot whose `show` calls use a different hide delay.
    pub fn with_hide_delay(&self, hide_delay: Option<Duration>) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
            generation: Arc::clone(&self.generation),
            hide_delay,
        }
    }

    pub fn show(&self, status: LinkStatus, message: impl Into<String>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(IndicatorSnapshot {
            status,
            message: message.into(),
            updated_at: Utc::now(),
        });

        let Some(delay) = self.hide_delay else {
            return;
        };
        if status == LinkStatus::Hidden {
            return;
        }
        // Outside a runtime there is nothing to drive the timer; the slot stays visible.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let tx = Arc::clone(&self.tx);
        let current = Arc::clone(&self.generation);
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) == generation {
                trace!(generation, "Auto-hiding indicator");
                tx.send_replace(IndicatorSnapshot::hidden());
            }
        });
    }

    pub fn show_result(&self, result: &ProbeResult) {
        self.show(LinkStatus::from_result(result), result.message());
    }

    pub fn hide(&self) {
        self.show(LinkStatus::Hidden, "");
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IndicatorSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::persistent()
    }
}
