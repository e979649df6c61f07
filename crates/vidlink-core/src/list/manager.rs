use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Notify, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{AddOutcome, ListEntry, ListError, ListState, RecheckSummary};
use crate::checker::CHECKING_MESSAGE;
use crate::config::LinkConfig;
use crate::indicator::{LinkStatus, StatusIndicator};
use crate::probe::{ProbeResult, Prober};
use crate::store::ListStore;
use crate::validate::{validate, VideoUrl};
use crate::webhook::Notification;

/// Persisted, ordered list of video links with periodic re-checking.
///
/// Cloning is cheap; clones share the same rows, store and loop state.
#[derive(Clone)]
pub struct VideoList {
    id: Uuid,
    config: LinkConfig,
    entries: Arc<RwLock<Vec<ListEntry>>>,
    state: Arc<RwLock<ListState>>,
    stop_signal: Arc<Notify>,
    prober: Prober,
    store: Arc<dyn ListStore>,
    indicator: StatusIndicator,
    in_flight: Arc<DashSet<String>>,
    created_at: DateTime<Utc>,
    last_recheck: Arc<RwLock<Option<DateTime<Utc>>>>,
    probe_count: Arc<AtomicU64>,
    notification_tx: Option<UnboundedSender<Notification>>,
}

/// Removes a URL from the in-flight set even if the probe future is dropped.
struct InFlightGuard {
    set: Arc<DashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

impl VideoList {
    pub fn new(
        config: LinkConfig,
        prober: Prober,
        store: Arc<dyn ListStore>,
        indicator: StatusIndicator,
        notification_tx: Option<UnboundedSender<Notification>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            entries: Arc::new(RwLock::new(Vec::new())),
            state: Arc::new(RwLock::new(ListState::Idle)),
            stop_signal: Arc::new(Notify::new()),
            prober,
            store,
            indicator,
            in_flight: Arc::new(DashSet::new()),
            created_at: Utc::now(),
            last_recheck: Arc::new(RwLock::new(None)),
            probe_count: Arc::new(AtomicU64::new(0)),
            notification_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn indicator(&self) -> &StatusIndicator {
        &self.indicator
    }

    pub async fn state(&self) -> ListState {
        *self.state.read().await
    }

    pub async fn entries(&self) -> Vec<ListEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entry(&self, url: &str) -> Option<ListEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.url.as_str() == url)
            .cloned()
    }

    pub async fn urls(&self) -> Vec<VideoUrl> {
        self.entries.read().await.iter().map(|e| e.url.clone()).collect()
    }

    pub async fn last_recheck(&self) -> Option<DateTime<Utc>> {
        *self.last_recheck.read().await
    }

    pub fn probe_count(&self) -> u64 {
        self.probe_count.load(Ordering::Relaxed)
    }

    pub fn is_checking(&self, url: &VideoUrl) -> bool {
        self.in_flight.contains(url.as_str())
    }

    /// Loads the persisted list (or the seed URL when nothing is stored),
    /// replaces the in-memory rows and probes every entry.
    pub async fn initialize(&self) -> RecheckSummary {
        let urls = self.restore().await;
        self.check_urls(&urls).await
    }

    /// Replaces the in-memory rows with the persisted list, or the seed URL
    /// when nothing is stored, without probing. Rows already in memory keep
    /// their state; those missing from the store are appended and saved.
    pub async fn restore(&self) -> Vec<VideoUrl> {
        // Adds wait on this guard, so none can save between load and merge.
        let mut entries = self.entries.write().await;

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted video list, using seed");
                None
            }
        };
        let from_store = stored.is_some();
        let raw_urls = stored.unwrap_or_else(|| self.config.seed_url.iter().cloned().collect());

        let mut rows: Vec<ListEntry> = Vec::with_capacity(raw_urls.len());
        for raw in &raw_urls {
            match validate(raw, &self.config.accepted_extensions) {
                Ok(url) if rows.iter().any(|e| e.url == url) => {
                    debug!(url = %url, "Skipping duplicate persisted entry");
                }
                Ok(url) => rows.push(ListEntry::new(url)),
                Err(e) => warn!(url = %raw, error = %e, "Skipping invalid persisted entry"),
            }
        }

        let mut previous: Vec<ListEntry> = entries.drain(..).collect();
        for row in rows.iter_mut() {
            if let Some(i) = previous.iter().position(|e| e.url == row.url) {
                *row = previous.remove(i);
            }
        }
        let merged = !previous.is_empty();
        rows.extend(previous);
        *entries = rows;
        if merged {
            self.persist(&entries);
        }

        info!(
            list_id = %self.id,
            count = entries.len(),
            from_store,
            merged,
            "Video list restored"
        );
        entries.iter().map(|e| e.url.clone()).collect()
    }

    /// Validates and adds a link. A link that is already listed is probed
    /// again instead of being inserted twice.
    pub async fn add(&self, raw: &str) -> AddOutcome {
        let url = match validate(raw, &self.config.accepted_extensions) {
            Ok(url) => url,
            Err(e) => {
                let result = ProbeResult::from(e);
                self.indicator.show_result(&result);
                return AddOutcome::Rejected { result };
            }
        };

        let inserted = {
            let mut entries = self.entries.write().await;
            if entries.iter().any(|e| e.url == url) {
                false
            } else {
                entries.push(ListEntry::new(url.clone()));
                // Saved under the write guard so concurrent adds persist in order.
                self.persist(&entries);
                info!(url = %url, count = entries.len(), "Video link added");
                true
            }
        };

        self.indicator.show(LinkStatus::Checking, CHECKING_MESSAGE);
        let Some(result) = self.check_entry(&url).await else {
            // The running probe does not update the indicator; show the last verdict instead.
            match self.entry(url.as_str()).await.as_ref().and_then(ListEntry::settled) {
                Some((status, message)) => self.indicator.show(status, message),
                None => self.indicator.hide(),
            }
            return AddOutcome::AlreadyChecking;
        };
        self.indicator.show_result(&result);

        if inserted {
            AddOutcome::Added { result }
        } else {
            AddOutcome::Rechecked { result }
        }
    }

    /// Probes every current entry, bounded by `max_concurrent_probes`.
    pub async fn recheck_all(&self) -> RecheckSummary {
        let urls = self.urls().await;
        *self.last_recheck.write().await = Some(Utc::now());
        let summary = self.check_urls(&urls).await;
        debug!(
            list_id = %self.id,
            checked = summary.checked,
            live = summary.live,
            offline = summary.offline,
            coalesced = summary.coalesced,
            "Recheck finished"
        );
        summary
    }

    /// Probes one listed URL and updates its row. Returns `None` without
    /// probing when a probe for the same URL is already running.
    pub async fn check_entry(&self, url: &VideoUrl) -> Option<ProbeResult> {
        let key = url.as_str().to_string();
        if !self.in_flight.insert(key.clone()) {
            debug!(url = %url, "Probe already in flight, coalescing");
            return None;
        }
        let _guard = InFlightGuard {
            set: Arc::clone(&self.in_flight),
            key,
        };

        self.update_row(url, |e| {
            e.status = LinkStatus::Checking;
            e.message = CHECKING_MESSAGE.to_string();
        })
        .await;

        let result = self.prober.probe(url).await;
        self.probe_count.fetch_add(1, Ordering::Relaxed);

        let mut transition = None;
        self.update_row(url, |e| transition = e.record(&result)).await;

        if let Some(previous) = transition {
            let current = LinkStatus::from_result(&result);
            info!(url = %url, %previous, %current, "Link status changed");
            if let Some(tx) = &self.notification_tx {
                let _ = tx.send(Notification::status_changed(
                    url.as_str(),
                    previous,
                    current,
                    result.message(),
                ));
            }
        }

        Some(result)
    }

    pub async fn start(&self) -> Result<(), ListError> {
        {
            let mut state = self.state.write().await;
            if *state == ListState::Active {
                return Ok(());
            }
            if !state.can_transition_to(ListState::Active) {
                return Err(ListError::InvalidTransition {
                    from: *state,
                    to: ListState::Active,
                });
            }
            *state = ListState::Active;
        }

        let interval = self.config.recheck_interval;
        info!(
            list_id = %self.id,
            interval_ms = interval.as_millis() as u64,
            "Starting periodic recheck"
        );

        let list = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let ticked = tokio::select! {
                    _ = ticker.tick() => true,
                    _ = list.stop_signal.notified() => false,
                };

                if *list.state.read().await != ListState::Active {
                    *list.state.write().await = ListState::Stopped;
                    info!(list_id = %list.id, "Periodic recheck stopped");
                    break;
                }

                if ticked {
                    list.recheck_all().await;
                }
            }
        });

        Ok(())
    }

    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        if *state == ListState::Active {
            *state = ListState::Stopping;
            self.stop_signal.notify_one();
            info!(list_id = %self.id, "Stopping periodic recheck");
        }
    }

    async fn check_urls(&self, urls: &[VideoUrl]) -> RecheckSummary {
        let concurrency = self.config.max_concurrent_probes.max(1);
        let results: Vec<Option<ProbeResult>> = stream::iter(urls.to_vec())
            .map(|url| {
                let list = self.clone();
                async move { list.check_entry(&url).await }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        RecheckSummary::tally(&results)
    }

    async fn update_row<F>(&self, url: &VideoUrl, f: F)
    where
        F: FnOnce(&mut ListEntry),
    {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| &e.url == url) {
            f(entry);
        }
    }

    fn persist(&self, entries: &[ListEntry]) {
        let urls: Vec<String> = entries.iter().map(|e| e.url.as_str().to_string()).collect();
        if let Err(e) = self.store.save(&urls) {
            error!(error = %e, "Failed to persist video list");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{ScriptedLoader, SessionScript};

    const SEED: &str = "https://example.com/seed.mp4";

    fn list_with(
        store: Arc<MemoryStore>,
        script: SessionScript,
    ) -> (VideoList, Arc<ScriptedLoader>) {
        let loader = ScriptedLoader::new(script);
        let config = LinkConfig::default().with_seed_url(Some(SEED.to_string()));
        let prober = Prober::from_config(loader.clone(), &config);
        let list = VideoList::new(config, prober, store, StatusIndicator::persistent(), None);
        (list, loader)
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_uses_seed_when_nothing_persisted() {
        let store = Arc::new(MemoryStore::new());
        let (list, loader) = list_with(store, SessionScript::LoadAfter(Duration::from_millis(10)));

        let summary = list.initialize().await;
        assert_eq!(summary.live, 1);
        let entries = list.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url.as_str(), SEED);
        assert_eq!(entries[0].status, LinkStatus::Live);
        assert_eq!(loader.opened_for(SEED), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_skips_invalid_and_duplicate_entries() {
        let store = Arc::new(MemoryStore::with_urls([
            "https://a.com/1.mp4",
            "ftp://a.com/2.mp4",
            "https://a.com/1.mp4",
            "https://a.com/3.mov",
            "https://a.com/4.mp4",
        ]));
        let (list, _) = list_with(store, SessionScript::LoadAfter(Duration::from_millis(10)));

        list.initialize().await;
        let urls: Vec<String> = list.urls().await.iter().map(|u| u.to_string()).collect();
        assert_eq!(urls, vec!["https://a.com/1.mp4", "https://a.com/4.mp4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn add_new_link_persists_and_probes() {
        let store = Arc::new(MemoryStore::new());
        let (list, loader) =
            list_with(store.clone(), SessionScript::LoadAfter(Duration::from_millis(10)));

        let outcome = list.add("https://example.com/video.mp4").await;
        assert_eq!(
            outcome,
            AddOutcome::Added {
                result: ProbeResult::Live
            }
        );
        assert_eq!(
            store.load().unwrap(),
            Some(vec!["https://example.com/video.mp4".to_string()])
        );
        assert_eq!(loader.opened(), 1);
        assert_eq!(list.indicator().snapshot().status, LinkStatus::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_add_rechecks_once_without_inserting() {
        let store = Arc::new(MemoryStore::new());
        let (list, loader) =
            list_with(store.clone(), SessionScript::LoadAfter(Duration::from_millis(10)));
        let url = "https://example.com/video.mp4";

        list.add(url).await;
        let outcome = list.add(url).await;

        assert!(matches!(outcome, AddOutcome::Rechecked { .. }));
        assert_eq!(store.load().unwrap().unwrap().len(), 1);
        assert_eq!(list.entries().await.len(), 1);
        assert_eq!(loader.opened_for(url), 2);
        assert_eq!(list.entry(url).await.unwrap().check_count, 2);
    }

    #[tokio::test]
    async fn invalid_add_is_rejected_without_probe() {
        let store = Arc::new(MemoryStore::new());
        let (list, loader) = list_with(store.clone(), SessionScript::LoadAfter(Duration::ZERO));

        let outcome = list.add("https://example.com/video.mov").await;
        assert_eq!(
            outcome.result().map(|r| r.message()),
            Some("URL must point to an .mp4 file")
        );
        assert!(matches!(outcome, AddOutcome::Rejected { .. }));
        assert_eq!(loader.opened(), 0);
        assert!(store.load().unwrap().is_none());
        assert_eq!(list.indicator().snapshot().status, LinkStatus::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_checks_of_same_url_are_coalesced() {
        let store = Arc::new(MemoryStore::with_urls([SEED]));
        let (list, loader) = list_with(store, SessionScript::LoadAfter(Duration::from_secs(2)));
        list.initialize().await;
        let url = list.urls().await.remove(0);

        let (a, b) = tokio::join!(list.check_entry(&url), list.check_entry(&url));
        assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
        assert_eq!(loader.opened_for(SEED), 2);
        assert!(!list.is_checking(&url));
    }

    #[tokio::test(start_paused = true)]
    async fn coalesced_add_shows_last_verdict() {
        let store = Arc::new(MemoryStore::with_urls([SEED]));
        let (list, _) = list_with(store, SessionScript::LoadAfter(Duration::from_secs(2)));
        list.initialize().await;
        let url = list.urls().await.remove(0);

        let background = list.clone();
        let in_flight = tokio::spawn(async move { background.check_entry(&url).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(list.add(SEED).await, AddOutcome::AlreadyChecking);
        let snap = list.indicator().snapshot();
        assert_eq!(snap.status, LinkStatus::Live);
        assert_eq!(snap.message, "Video link is live!");
        assert!(in_flight.await.unwrap().is_some());
    }

    /// Store whose first save (a one-link list) is slow.
    struct SlowFirstSave(MemoryStore);

    impl ListStore for SlowFirstSave {
        fn load(&self) -> Result<Option<Vec<String>>, crate::store::StoreError> {
            self.0.load()
        }

        fn save(&self, urls: &[String]) -> Result<(), crate::store::StoreError> {
            if urls.len() == 1 {
                std::thread::sleep(Duration::from_millis(300));
            }
            self.0.save(urls)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_adds_persist_full_list() {
        let store = Arc::new(SlowFirstSave(MemoryStore::new()));
        let loader = ScriptedLoader::new(SessionScript::LoadAfter(Duration::ZERO));
        let config = LinkConfig::default().with_seed_url(None);
        let list = VideoList::new(
            config.clone(),
            Prober::from_config(loader, &config),
            store.clone(),
            StatusIndicator::persistent(),
            None,
        );

        let first = list.clone();
        let first = tokio::spawn(async move { first.add("https://a.com/1.mp4").await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        list.add("https://a.com/2.mp4").await;
        first.await.unwrap();

        let expected = vec![
            "https://a.com/1.mp4".to_string(),
            "https://a.com/2.mp4".to_string(),
        ];
        assert_eq!(store.load().unwrap(), Some(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_keeps_rows_missing_from_store() {
        let store = Arc::new(MemoryStore::with_urls(["https://a.com/1.mp4"]));
        let (list, _) = list_with(store.clone(), SessionScript::LoadAfter(Duration::ZERO));

        list.add("https://a.com/2.mp4").await;
        store.save(&["https://a.com/1.mp4".to_string()]).unwrap();
        let urls: Vec<String> = list.restore().await.iter().map(|u| u.to_string()).collect();

        let expected = vec![
            "https://a.com/1.mp4".to_string(),
            "https://a.com/2.mp4".to_string(),
        ];
        assert_eq!(urls, expected);
        assert_eq!(store.load().unwrap(), Some(expected));
        assert_eq!(list.entry("https://a.com/2.mp4").await.unwrap().check_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_flip_sends_notification() {
        let store = Arc::new(MemoryStore::with_urls([SEED]));
        let loader = ScriptedLoader::new(SessionScript::LoadAfter(Duration::from_millis(10)));
        let config = LinkConfig::default();
        let (tx, mut rx) = crate::webhook::notification_channel();
        let list = VideoList::new(
            config.clone(),
            Prober::from_config(loader.clone(), &config),
            store,
            StatusIndicator::persistent(),
            Some(tx),
        );

        list.initialize().await;
        assert!(rx.try_recv().is_err());

        loader.set_script(SEED, SessionScript::FailAfter(Duration::from_millis(10)));
        list.recheck_all().await;

        let Notification::StatusChanged(change) = rx.try_recv().unwrap();
        assert_eq!(change.previous, LinkStatus::Live);
        assert_eq!(change.current, LinkStatus::Offline);
        assert_eq!(change.url, SEED);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_is_noop_and_restart_after_stop() {
        let store = Arc::new(MemoryStore::new());
        let (list, _) = list_with(store, SessionScript::LoadAfter(Duration::ZERO));

        list.stop().await;
        assert_eq!(list.state().await, ListState::Idle);

        list.start().await.unwrap();
        assert_eq!(list.state().await, ListState::Active);
        list.stop().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(list.state().await, ListState::Stopped);

        list.start().await.unwrap();
        assert_eq!(list.state().await, ListState::Active);
    }
}
