//! Persistent document storage
//!
//! The bot keeps three JSON documents: the content library, the posting
//! history and the generation config. Reads are full-document and writes
//! overwrite the whole document. [`Store`] layers typed access and a
//! read-modify-write lock over a [`DocumentStore`] backend, so concurrent
//! updates of one document never interleave.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::types::{ContentLibrary, GenerationConfig, HistoryLog, PostRecord};

pub const CONTENT_KEY: &str = "content";
pub const HISTORY_KEY: &str = "posted_tweets";
pub const GENERATION_KEY: &str = "ai-config";

type StoreResult<T> = std::result::Result<T, StoreError>;

/// Raw key-value document backend
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a whole document, `None` if it does not exist
    async fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace a whole document
    async fn write(&self, key: &str, contents: &str) -> StoreResult<()>;
}

/// Documents stored as `<dir>/<key>.json`
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn write(&self, key: &str, contents: &str) -> StoreResult<()> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        // Write next to the target and rename so readers never see a torn file
        let target = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }

        debug!("Wrote {} ({} bytes)", target.display(), contents.len());
        Ok(())
    }
}

/// In-process backend for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    docs: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.docs.lock().unwrap().get(key).cloned())
    }

    async fn write(&self, key: &str, contents: &str) -> StoreResult<()> {
        self.docs
            .lock()
            .unwrap()
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// Typed access to the bot's documents
pub struct Store {
    backend: Box<dyn DocumentStore>,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn new(backend: Box<dyn DocumentStore>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// File-backed store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileStore::new(dir)))
    }

    /// Store backed by memory only
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Load and deserialize a document
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for a missing document and
    /// `StoreError::Json` when the contents do not parse.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        let contents = self
            .backend
            .read(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })
    }

    /// Serialize and overwrite a document
    pub async fn save<T: Serialize + Sync>(&self, key: &str, doc: &T) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_doc(key, doc).await
    }

    /// Read-modify-write a document as one step
    ///
    /// No other `save` or `update` on this store runs between the read and
    /// the write.
    pub async fn update<T, R, F>(&self, key: &str, f: F) -> StoreResult<R>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        R: Send,
        F: FnOnce(&mut T) -> R + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut doc: T = self.load(key).await?;
        let out = f(&mut doc);
        self.write_doc(key, &doc).await?;
        Ok(out)
    }

    /// Whether a document exists
    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.backend.read(key).await?.is_some())
    }

    async fn write_doc<T: Serialize + Sync>(&self, key: &str, doc: &T) -> StoreResult<()> {
        let contents = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })?;
        self.backend.write(key, &contents).await
    }

    /// Write default documents for any that are missing
    pub async fn initialize(&self) -> StoreResult<()> {
        if !self.exists(CONTENT_KEY).await? {
            info!("Creating default content library");
            self.save(CONTENT_KEY, &ContentLibrary::starter()).await?;
        }
        if !self.exists(HISTORY_KEY).await? {
            self.save(HISTORY_KEY, &HistoryLog::default()).await?;
        }
        if !self.exists(GENERATION_KEY).await? {
            info!("Creating default generation config");
            self.save(GENERATION_KEY, &GenerationConfig::default()).await?;
        }
        Ok(())
    }

    pub async fn library(&self) -> StoreResult<ContentLibrary> {
        self.load(CONTENT_KEY).await
    }

    pub async fn history(&self) -> StoreResult<HistoryLog> {
        self.load(HISTORY_KEY).await
    }

    pub async fn generation_config(&self) -> StoreResult<GenerationConfig> {
        self.load(GENERATION_KEY).await
    }

    /// Append a record to the history, enforcing the cap
    ///
    /// A missing history document is treated as empty.
    pub async fn append_history(&self, record: PostRecord) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut log = match self.load::<HistoryLog>(HISTORY_KEY).await {
            Ok(log) => log,
            Err(StoreError::NotFound(_)) => HistoryLog::default(),
            Err(e) => return Err(e),
        };
        log.push(record);
        self.write_doc(HISTORY_KEY, &log).await?;
        Ok(log.len())
    }

    /// Append a text to the content library
    ///
    /// Returns `false` if the library already contained it.
    pub async fn add_content(&self, text: String) -> StoreResult<bool> {
        self.update(CONTENT_KEY, |library: &mut ContentLibrary| library.add(text))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HISTORY_CAP;
    use tempfile::TempDir;

    fn record(n: usize) -> PostRecord {
        PostRecord::new(format!("post {}", n), format!("id-{}", n))
    }

    #[tokio::test]
    async fn test_initialize_writes_defaults_once() {
        let store = Store::in_memory();
        store.initialize().await.unwrap();

        let library = store.library().await.unwrap();
        assert_eq!(library.tweets.len(), 15);
        assert_eq!(library.schedules.len(), 3);
        assert!(store.history().await.unwrap().is_empty());
        assert!(store.generation_config().await.unwrap().enabled);

        // Existing documents are left alone
        store.add_content("extra".to_string()).await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.library().await.unwrap().tweets.len(), 16);
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let store = Store::in_memory();
        match store.library().await {
            Err(StoreError::NotFound(key)) => assert_eq!(key, CONTENT_KEY),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_append_history_caps_log() {
        let store = Store::in_memory();
        for n in 0..=HISTORY_CAP {
            store.append_history(record(n)).await.unwrap();
        }
        let log = store.history().await.unwrap();
        assert_eq!(log.len(), HISTORY_CAP);
        assert_eq!(log.posted[0].id, "id-1");
    }

    #[tokio::test]
    async fn test_update_round_trips_through_backend() {
        let store = Store::in_memory();
        store.save(GENERATION_KEY, &GenerationConfig::default()).await.unwrap();

        store
            .update(GENERATION_KEY, |cfg: &mut GenerationConfig| cfg.enabled = false)
            .await
            .unwrap();

        assert!(!store.generation_config().await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_file_store_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("data"));
        store.initialize().await.unwrap();

        let data = temp_dir.path().join("data");
        assert!(data.join("content.json").exists());
        assert!(data.join("posted_tweets.json").exists());
        assert!(data.join("ai-config.json").exists());

        let raw = std::fs::read_to_string(data.join("posted_tweets.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["posted"], serde_json::json!([]));

        // No temp files left behind
        let leftovers = std::fs::read_dir(&data)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_malformed_document_reports_json_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("content.json"), "{ not json").unwrap();

        let store = Store::open(temp_dir.path());
        assert!(matches!(
            store.library().await,
            Err(StoreError::Json { .. })
        ));
    }
}
