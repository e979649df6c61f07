use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::loader::{LoadError, MediaLoader, MediaMetadata, MediaSession, TeardownError};
use crate::validate::VideoUrl;

#[derive(Debug, Clone, Copy)]
pub enum SessionScript {
    LoadAfter(Duration),
    FailAfter(Duration),
    Hang,
}

/// Loader whose sessions follow a per-URL script and count their lifecycle calls.
pub struct ScriptedLoader {
    default: SessionScript,
    scripts: Mutex<HashMap<String, SessionScript>>,
    failing_teardown: bool,
    opened: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
    opened_per_url: Arc<Mutex<HashMap<String, usize>>>,
}

impl ScriptedLoader {
    pub fn new(default: SessionScript) -> Arc<Self> {
        Arc::new(Self::build(default, false))
    }

    pub fn with_failing_teardown(default: SessionScript) -> Arc<Self> {
        Arc::new(Self::build(default, true))
    }

    fn build(default: SessionScript, failing_teardown: bool) -> Self {
        Self {
            default,
            scripts: Mutex::new(HashMap::new()),
            failing_teardown,
            opened: Arc::new(AtomicUsize::new(0)),
            teardowns: Arc::new(AtomicUsize::new(0)),
            opened_per_url: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn set_script(&self, url: &str, script: SessionScript) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn opened_for(&self, url: &str) -> usize {
        self.opened_per_url
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

impl MediaLoader for ScriptedLoader {
    fn open(&self, url: &VideoUrl) -> Box<dyn MediaSession> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self
            .opened_per_url
            .lock()
            .unwrap()
            .entry(url.as_str().to_string())
            .or_insert(0) += 1;
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(url.as_str())
            .copied()
            .unwrap_or(self.default);
        Box::new(ScriptedSession {
            url: url.as_str().to_string(),
            script,
            failing_teardown: self.failing_teardown,
            teardowns: Arc::clone(&self.teardowns),
        })
    }
}

struct ScriptedSession {
    url: String,
    script: SessionScript,
    failing_teardown: bool,
    teardowns: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaSession for ScriptedSession {
    async fn load_metadata(&mut self) -> Result<MediaMetadata, LoadError> {
        match self.script {
            SessionScript::LoadAfter(d) => {
                tokio::time::sleep(d).await;
                Ok(MediaMetadata::default())
            }
            SessionScript::FailAfter(d) => {
                tokio::time::sleep(d).await;
                Err(LoadError::Network {
                    url: self.url.clone(),
                    reason: "connection refused".into(),
                })
            }
            SessionScript::Hang => std::future::pending().await,
        }
    }

    fn teardown(&mut self) -> Result<(), TeardownError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        if self.failing_teardown {
            return Err(TeardownError {
                url: self.url.clone(),
                reason: "detach failed".into(),
            });
        }
        Ok(())
    }
}
