use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use vidlink_core::{
    notification_channel, AddOutcome, JsonFileStore, LinkConfig, LinkStatus, ListState, ListStore,
    LoadError, MediaLoader, MediaMetadata, MediaSession, Notification, Prober, StatusIndicator,
    TeardownError, VideoList, VideoUrl,
};

const CLIP_A: &str = "https://cdn.example.com/clips/a.mp4";
const CLIP_B: &str = "https://cdn.example.com/clips/b.mp4";
const SEED: &str = "https://cdn.example.com/seed.mp4";

/// Per-URL sequence of live/offline answers, advanced by the test through `step`.
struct SequenceLoader {
    step: Arc<AtomicUsize>,
    responses: HashMap<String, Vec<bool>>,
    teardowns: Arc<AtomicUsize>,
}

struct SequenceSession {
    url: String,
    live: bool,
    teardowns: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaSession for SequenceSession {
    async fn load_metadata(&mut self) -> Result<MediaMetadata, LoadError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.live {
            Ok(MediaMetadata {
                status_code: Some(206),
                ..Default::default()
            })
        } else {
            Err(LoadError::Http {
                url: self.url.clone(),
                status: 404,
                message: "Not Found".into(),
            })
        }
    }

    fn teardown(&mut self) -> Result<(), TeardownError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl MediaLoader for SequenceLoader {
    fn open(&self, url: &VideoUrl) -> Box<dyn MediaSession> {
        let steps = self
            .responses
            .get(url.as_str())
            .unwrap_or_else(|| panic!("SequenceLoader: unexpected URL: {}", url));
        let step = self.step.load(Ordering::SeqCst);
        let live = steps[step.min(steps.len() - 1)];
        Box::new(SequenceSession {
            url: url.to_string(),
            live,
            teardowns: Arc::clone(&self.teardowns),
        })
    }
}

struct Harness {
    list: VideoList,
    step: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
}

fn harness(store: Arc<dyn ListStore>, responses: &[(&str, Vec<bool>)], config: LinkConfig) -> Harness {
    let step = Arc::new(AtomicUsize::new(0));
    let teardowns = Arc::new(AtomicUsize::new(0));
    let loader = Arc::new(SequenceLoader {
        step: Arc::clone(&step),
        responses: responses
            .iter()
            .map(|(url, steps)| (url.to_string(), steps.clone()))
            .collect(),
        teardowns: Arc::clone(&teardowns),
    });
    let prober = Prober::from_config(loader, &config);
    let list = VideoList::new(config, prober, store, StatusIndicator::persistent(), None);
    Harness {
        list,
        step,
        teardowns,
    }
}

fn config() -> LinkConfig {
    LinkConfig::default()
        .with_seed_url(Some(SEED.to_string()))
        .with_recheck_interval(30_000)
}

#[tokio::test(start_paused = true)]
async fn test_list_survives_restart_through_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let responses = [
        (SEED, vec![true]),
        (CLIP_A, vec![true]),
        (CLIP_B, vec![false]),
    ];

    let first = harness(Arc::new(JsonFileStore::new(&path)), &responses, config());
    first.list.initialize().await;
    first.list.add(CLIP_A).await;
    first.list.add(CLIP_B).await;

    // The seed row is written out together with the first added link.
    let persisted = JsonFileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(persisted, vec![SEED, CLIP_A, CLIP_B]);

    let second = harness(Arc::new(JsonFileStore::new(&path)), &responses, config());
    let summary = second.list.initialize().await;
    assert_eq!(summary.checked, 3);
    assert_eq!(summary.live, 2);
    assert_eq!(summary.offline, 1);

    let entries = second.list.entries().await;
    let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(urls, vec![SEED, CLIP_A, CLIP_B]);
    assert_eq!(entries[2].status, LinkStatus::Offline);
    assert_eq!(entries[2].message, "Video link is not accessible or offline");
}

#[tokio::test(start_paused = true)]
async fn test_empty_persisted_list_does_not_fall_back_to_seed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, r#"{"videoLinks":[]}"#).unwrap();

    let h = harness(Arc::new(JsonFileStore::new(&path)), &[(SEED, vec![true])], config());
    let summary = h.list.initialize().await;
    assert_eq!(summary.checked, 0);
    assert!(h.list.entries().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_recheck_tracks_status_flips() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("store.json")));
    store.save(&[CLIP_A.to_string()]).unwrap();

    let (tx, mut rx) = notification_channel();
    let step = Arc::new(AtomicUsize::new(0));
    let teardowns = Arc::new(AtomicUsize::new(0));
    let loader = Arc::new(SequenceLoader {
        step: Arc::clone(&step),
        responses: HashMap::from([(CLIP_A.to_string(), vec![true, false, true])]),
        teardowns: Arc::clone(&teardowns),
    });
    let cfg = config();
    let list = VideoList::new(
        cfg.clone(),
        Prober::from_config(loader, &cfg),
        store,
        StatusIndicator::persistent(),
        Some(tx),
    );

    list.initialize().await;
    list.start().await.unwrap();
    assert_eq!(list.state().await, ListState::Active);

    step.store(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(list.entry(CLIP_A).await.unwrap().status, LinkStatus::Offline);

    step.store(2, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    let entry = list.entry(CLIP_A).await.unwrap();
    assert_eq!(entry.status, LinkStatus::Live);
    assert_eq!(entry.check_count, 3);
    assert!(list.last_recheck().await.is_some());
    assert_eq!(teardowns.load(Ordering::SeqCst), 3);

    let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|n: Notification| n.notification_type())
        .collect();
    assert_eq!(kinds, vec!["went_offline", "went_live"]);

    list.stop().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(list.state().await, ListState::Stopped);

    step.store(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(list.entry(CLIP_A).await.unwrap().check_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_adding_listed_url_rechecks_instead_of_duplicating() {
    let h = harness(
        Arc::new(vidlink_core::MemoryStore::new()),
        &[(SEED, vec![true]), (CLIP_A, vec![true, false])],
        config(),
    );
    h.list.initialize().await;

    let first = h.list.add(CLIP_A).await;
    assert!(matches!(first, AddOutcome::Added { .. }));

    h.step.store(1, Ordering::SeqCst);
    let second = h.list.add(CLIP_A).await;
    assert!(matches!(second, AddOutcome::Rechecked { .. }));
    assert_eq!(
        second.result().map(|r| r.message()),
        Some("Video link is not accessible or offline")
    );

    assert_eq!(h.list.entries().await.len(), 2);
    assert_eq!(h.list.indicator().snapshot().status, LinkStatus::Offline);
    assert_eq!(h.teardowns.load(Ordering::SeqCst), 3);
    assert_eq!(h.list.probe_count(), 3);
}
