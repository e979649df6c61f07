use serde::Serialize;
use tracing::info;

use crate::indicator::{LinkStatus, StatusIndicator};
use crate::preview::PreviewPlayer;
use crate::probe::{ProbeResult, Prober};
use crate::validate::{validate, VideoUrl};

pub const CHECKING_MESSAGE: &str = "Checking link...";

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<VideoUrl>,
    #[serde(flatten)]
    pub result: ProbeResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

/// Single-link flow: validate, probe, then drive the indicator and preview.
#[derive(Clone)]
pub struct LinkChecker {
    prober: Prober,
    indicator: StatusIndicator,
    preview: PreviewPlayer,
    accepted_extensions: Vec<String>,
}

impl LinkChecker {
    pub fn new(
        prober: Prober,
        indicator: StatusIndicator,
        preview: PreviewPlayer,
        accepted_extensions: Vec<String>,
    ) -> Self {
        Self {
            prober,
            indicator,
            preview,
            accepted_extensions,
        }
    }

    pub fn indicator(&self) -> &StatusIndicator {
        &self.indicator
    }

    pub fn preview(&self) -> &PreviewPlayer {
        &self.preview
    }

    pub async fn check(&self, raw: &str) -> CheckReport {
        self.indicator.show(LinkStatus::Checking, CHECKING_MESSAGE);
        self.preview.hide().await;

        let url = match validate(raw, &self.accepted_extensions) {
            Ok(url) => url,
            Err(e) => {
                let result = ProbeResult::from(e);
                self.indicator.show_result(&result);
                return CheckReport {
                    url: None,
                    result,
                    elapsed_ms: None,
                };
            }
        };

        let report = self.prober.probe_report(&url).await;
        let result = report.result();
        self.indicator.show_result(&result);
        if result.is_live() {
            self.preview.load(&url).await;
        }
        info!(url = %url, live = result.is_live(), "Link checked");

        CheckReport {
            url: Some(url),
            result,
            elapsed_ms: Some(report.elapsed.as_millis() as u64),
        }
    }
}
