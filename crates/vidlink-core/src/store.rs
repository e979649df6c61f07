//! Key-value persistence for the video list.
//!
//! The list is stored as an ordered array of URL strings under the fixed key
//! [`LIST_KEY`]. The JSON file store keeps any other keys it finds and
//! rewrites the whole file on every save.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

pub const LIST_KEY: &str = "videoLinks";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub trait ListStore: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Vec<String>>, StoreError>;

    fn save(&self, urls: &[String]) -> Result<(), StoreError>;
}

/// JSON object on disk, one key per stored value.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(StoreError::Parse {
                path: self.path.clone(),
                message: "top-level value is not an object".into(),
            }),
            Err(e) => Err(StoreError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn write_object(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let body = serde_json::to_string_pretty(map).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(body.as_bytes()).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.as_file_mut().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl ListStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<String>>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let Some(map) = self.read_object()? else {
            return Ok(None);
        };
        match map.get(LIST_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let urls: Vec<String> =
                    serde_json::from_value(value.clone()).map_err(|e| StoreError::Parse {
                        path: self.path.clone(),
                        message: format!("{LIST_KEY}: {e}"),
                    })?;
                Ok(Some(urls))
            }
        }
    }

    fn save(&self, urls: &[String]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        // A corrupt file is replaced rather than blocking every later save.
        let mut map = self.read_object().ok().flatten().unwrap_or_default();
        map.insert(LIST_KEY.to_string(), Value::from(urls.to_vec()));
        self.write_object(&map)?;
        debug!(path = %self.path.display(), count = urls.len(), "Persisted video list");
        Ok(())
    }
}

/// In-process store, keyed like the file store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        store
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(LIST_KEY.to_string(), urls.into_iter().map(Into::into).collect());
        store
    }
}

impl ListStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<String>>, StoreError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(LIST_KEY).cloned())
    }

    fn save(&self, urls: &[String]) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(LIST_KEY.to_string(), urls.to_vec());
        Ok(())
    }
}
