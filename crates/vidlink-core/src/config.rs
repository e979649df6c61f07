use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SEED_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

/// Configuration shared by the prober, the indicator and the video list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Time allowed for a metadata load before the link counts as offline (default: 10000ms).
    pub probe_timeout: Duration,
    /// Number of leading bytes requested when probing (default: 64 KiB).
    pub metadata_bytes: u64,
    /// Lowercase path suffixes a video URL must end with (default: [".mp4"]).
    pub accepted_extensions: Vec<String>,
    /// Interval between periodic re-checks of every listed link (default: 30000ms).
    pub recheck_interval: Duration,
    /// Delay before the list indicator hides itself. `None` keeps it visible.
    pub indicator_hide_delay: Option<Duration>,
    /// Entry used when nothing has been persisted yet.
    pub seed_url: Option<String>,
    pub max_concurrent_probes: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(10_000),
            metadata_bytes: 64 * 1024,
            accepted_extensions: vec![".mp4".to_string()],
            recheck_interval: Duration::from_millis(30_000),
            indicator_hide_delay: Some(Duration::from_millis(3_000)),
            seed_url: Some(DEFAULT_SEED_URL.to_string()),
            max_concurrent_probes: 4,
        }
    }
}

impl LinkConfig {
    pub fn with_probe_timeout(mut self, ms: u64) -> Self {
        self.probe_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_metadata_bytes(mut self, bytes: u64) -> Self {
        self.metadata_bytes = bytes.max(1);
        self
    }

    /// Replace the accepted extensions. Entries are lowercased and given a
    /// leading dot if they lack one; an empty list keeps the current set.
    pub fn with_accepted_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e != ".")
            .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
            .collect();
        if !normalized.is_empty() {
            self.accepted_extensions = normalized;
        }
        self
    }

    pub fn with_recheck_interval(mut self, ms: u64) -> Self {
        self.recheck_interval = Duration::from_millis(ms.max(1));
        self
    }

    pub fn with_indicator_hide_delay(mut self, ms: Option<u64>) -> Self {
        self.indicator_hide_delay = ms.map(Duration::from_millis);
        self
    }

    pub fn with_seed_url(mut self, seed: Option<String>) -> Self {
        self.seed_url = seed;
        self
    }

    pub fn with_max_concurrent_probes(mut self, max: usize) -> Self {
        self.max_concurrent_probes = max.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_widget_timings() {
        let c = LinkConfig::default();
        assert_eq!(c.probe_timeout, Duration::from_secs(10));
        assert_eq!(c.recheck_interval, Duration::from_secs(30));
        assert_eq!(c.indicator_hide_delay, Some(Duration::from_secs(3)));
        assert_eq!(c.accepted_extensions, vec![".mp4"]);
    }

    #[test]
    fn extensions_are_normalized() {
        let c = LinkConfig::default().with_accepted_extensions(["MP4", ".WebM", " mkv "]);
        assert_eq!(c.accepted_extensions, vec![".mp4", ".webm", ".mkv"]);
    }

    #[test]
    fn empty_extension_list_is_ignored() {
        let c = LinkConfig::default().with_accepted_extensions(Vec::<String>::new());
        assert_eq!(c.accepted_extensions, vec![".mp4"]);
    }

    #[test]
    fn concurrency_floor_is_one() {
        let c = LinkConfig::default().with_max_concurrent_probes(0);
        assert_eq!(c.max_concurrent_probes, 1);
    }
}
