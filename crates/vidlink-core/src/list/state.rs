use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicator::LinkStatus;
use crate::probe::ProbeResult;
use crate::validate::VideoUrl;

/// Lifecycle of the periodic re-check loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListState {
    Idle,
    Active,
    Stopping,
    Stopped,
}

impl ListState {
    pub fn can_transition_to(self, target: ListState) -> bool {
        matches!(
            (self, target),
            (ListState::Idle, ListState::Active)
                | (ListState::Active, ListState::Stopping)
                | (ListState::Stopping, ListState::Stopped)
                | (ListState::Stopped, ListState::Active)
        )
    }
}

impl std::fmt::Display for ListState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("Cannot move video list from {from} to {to}")]
    InvalidTransition { from: ListState, to: ListState },
}

/// One row of the video list.
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub url: VideoUrl,
    pub status: LinkStatus,
    pub message: String,
    pub added_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
    pub check_count: u64,
    /// Last live/offline verdict and its message, kept while the row shows `checking`.
    #[serde(skip)]
    pub(crate) settled: Option<(LinkStatus, String)>,
}

impl ListEntry {
    pub fn new(url: VideoUrl) -> Self {
        Self {
            url,
            status: LinkStatus::Checking,
            message: crate::checker::CHECKING_MESSAGE.to_string(),
            added_at: Utc::now(),
            last_checked: None,
            check_count: 0,
            settled: None,
        }
    }

    /// Records a finished probe and returns the previous verdict when it changed.
    pub(crate) fn record(&mut self, result: &ProbeResult) -> Option<LinkStatus> {
        let status = LinkStatus::from_result(result);
        self.status = status;
        self.message = result.message().to_string();
        self.last_checked = Some(Utc::now());
        self.check_count += 1;
        let previous = self.settled.replace((status, self.message.clone()));
        previous
            .map(|(prev, _)| prev)
            .filter(|prev| *prev != status)
    }

    pub(crate) fn settled(&self) -> Option<(LinkStatus, &str)> {
        self.settled.as_ref().map(|(status, message)| (*status, message.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    /// Input failed validation; nothing was stored or probed.
    Rejected { result: ProbeResult },
    Added { result: ProbeResult },
    /// URL was already listed and has been probed again.
    Rechecked { result: ProbeResult },
    /// URL is listed and a probe for it is already running.
    AlreadyChecking,
}

impl AddOutcome {
    pub fn result(&self) -> Option<&ProbeResult> {
        match self {
            Self::Rejected { result } | Self::Added { result } | Self::Rechecked { result } => {
                Some(result)
            }
            Self::AlreadyChecking => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecheckSummary {
    pub checked: usize,
    pub live: usize,
    pub offline: usize,
    /// Entries skipped because a probe for them was already running.
    pub coalesced: usize,
}

impl RecheckSummary {
    pub(crate) fn tally(results: &[Option<ProbeResult>]) -> Self {
        let mut summary = Self::default();
        for r in results {
            match r {
                Some(r) if r.is_live() => {
                    summary.checked += 1;
                    summary.live += 1;
                }
                Some(_) => {
                    summary.checked += 1;
                    summary.offline += 1;
                }
                None => summary.coalesced += 1,
            }
        }
        summary
    }
}
