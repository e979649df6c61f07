use std::collections::HashMap;
use std::fmt::{self, Write};

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};

use vidlink_core::{IndicatorSnapshot, LinkStatus, ListEntry, ListState};

use crate::error::ApiError;
use crate::state::AppState;

const STATUSES: [LinkStatus; 4] = [
    LinkStatus::Hidden,
    LinkStatus::Checking,
    LinkStatus::Live,
    LinkStatus::Offline,
];

struct ListSample {
    id: String,
    created_at: DateTime<Utc>,
    state: ListState,
    last_recheck: Option<DateTime<Utc>>,
    probe_count: u64,
    entries: Vec<ListEntry>,
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let list = &state.list;
    let sample = ListSample {
        id: list.id().to_string(),
        created_at: list.created_at(),
        state: list.state().await,
        last_recheck: list.last_recheck().await,
        probe_count: list.probe_count(),
        entries: list.entries().await,
    };
    let indicator = state.checker.indicator().snapshot();

    let out = render(&sample, &indicator)
        .map_err(|e| ApiError::Internal(format!("Failed to render metrics: {}", e)))?;

    Ok((
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    ))
}

fn render(list: &ListSample, indicator: &IndicatorSnapshot) -> Result<String, fmt::Error> {
    let mut out = String::with_capacity(2048);
    let id = &list.id;

    writeln!(out, "# TYPE vidlink_list_info info")?;
    writeln!(out, "# HELP vidlink_list_info Information about the video list")?;
    writeln!(
        out,
        "vidlink_list_info{{list_id=\"{}\",created=\"{}\"}} 1",
        id,
        list.created_at.to_rfc3339()
    )?;

    writeln!(out, "# TYPE vidlink_list_state stateset")?;
    writeln!(out, "# HELP vidlink_list_state State of the periodic recheck loop")?;
    for variant in [
        ListState::Idle,
        ListState::Active,
        ListState::Stopping,
        ListState::Stopped,
    ] {
        writeln!(
            out,
            "vidlink_list_state{{list_id=\"{}\",state=\"{}\"}} {}",
            id,
            variant,
            u8::from(list.state == variant)
        )?;
    }

    writeln!(out, "# TYPE vidlink_list_entries gauge")?;
    writeln!(out, "# HELP vidlink_list_entries Entries in the video list by status")?;
    let mut counts: HashMap<LinkStatus, usize> = HashMap::new();
    for e in &list.entries {
        *counts.entry(e.status).or_default() += 1;
    }
    for status in STATUSES.iter().filter(|s| **s != LinkStatus::Hidden) {
        writeln!(
            out,
            "vidlink_list_entries{{list_id=\"{}\",status=\"{}\"}} {}",
            id,
            status,
            counts.get(status).copied().unwrap_or(0)
        )?;
    }

    writeln!(out, "# TYPE vidlink_probes counter")?;
    writeln!(out, "# HELP vidlink_probes Probes run by the video list")?;
    writeln!(out, "vidlink_probes_total{{list_id=\"{}\"}} {}", id, list.probe_count)?;

    writeln!(out, "# TYPE vidlink_list_last_recheck_timestamp_seconds gauge")?;
    writeln!(
        out,
        "# HELP vidlink_list_last_recheck_timestamp_seconds Unix timestamp of the last full recheck"
    )?;
    if let Some(t) = list.last_recheck {
        writeln!(
            out,
            "vidlink_list_last_recheck_timestamp_seconds{{list_id=\"{}\"}} {:.3}",
            id,
            seconds(t)
        )?;
    }

    writeln!(out, "# TYPE vidlink_list_uptime_seconds gauge")?;
    writeln!(out, "# HELP vidlink_list_uptime_seconds Time since the list was created")?;
    let uptime = (Utc::now() - list.created_at).num_milliseconds() as f64 / 1000.0;
    writeln!(out, "vidlink_list_uptime_seconds{{list_id=\"{}\"}} {:.3}", id, uptime)?;

    writeln!(out, "# TYPE vidlink_entry_live gauge")?;
    writeln!(out, "# HELP vidlink_entry_live 1 when the entry's last probe found it live")?;
    for e in &list.entries {
        writeln!(
            out,
            "vidlink_entry_live{{list_id=\"{}\",url=\"{}\"}} {}",
            id,
            escape_label(e.url.as_str()),
            u8::from(e.status == LinkStatus::Live)
        )?;
    }

    writeln!(out, "# TYPE vidlink_entry_checks counter")?;
    writeln!(out, "# HELP vidlink_entry_checks Completed probes per entry")?;
    for e in &list.entries {
        writeln!(
            out,
            "vidlink_entry_checks_total{{list_id=\"{}\",url=\"{}\"}} {}",
            id,
            escape_label(e.url.as_str()),
            e.check_count
        )?;
    }

    writeln!(out, "# TYPE vidlink_entry_last_check_timestamp_seconds gauge")?;
    writeln!(
        out,
        "# HELP vidlink_entry_last_check_timestamp_seconds Unix timestamp of the entry's last probe"
    )?;
    for e in &list.entries {
        if let Some(t) = e.last_checked {
            writeln!(
                out,
                "vidlink_entry_last_check_timestamp_seconds{{list_id=\"{}\",url=\"{}\"}} {:.3}",
                id,
                escape_label(e.url.as_str()),
                seconds(t)
            )?;
        }
    }

    writeln!(out, "# TYPE vidlink_indicator_status stateset")?;
    writeln!(out, "# HELP vidlink_indicator_status Status shown on the indicator")?;
    for status in STATUSES {
        writeln!(
            out,
            "vidlink_indicator_status{{status=\"{}\"}} {}",
            status,
            u8::from(indicator.status == status)
        )?;
    }

    writeln!(out, "# EOF")?;
    Ok(out)
}

fn seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + (t.timestamp_subsec_millis() as f64 / 1000.0)
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
