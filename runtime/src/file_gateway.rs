//! Persistence gateway backed by a single JSON document.
//!
//! The file holds one object whose members are the storage keys:
//!
//! ```json
//! { "tickets": [...], "calledTickets": [...], "ticketCounters": { "G": 3 } }
//! ```
//!
//! A batch is merged into the current document, written to a sibling temp
//! file, flushed to disk and renamed over the original, so readers see
//! either the old or the new document and never a mix. The directory entry
//! is flushed as well, so a committed batch survives a power loss.

use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use walkup_core::persistence::{
    GatewayFuture, PersistenceError, PersistenceGateway, StorageKey, StoredValue,
};

/// JSON file gateway.
#[derive(Debug)]
pub struct JsonFileGateway {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileGateway {
    /// Gateway storing its document at `path`. The file is created on the
    /// first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_document(&self) -> Result<Map<String, Value>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(backend(&self.path, &e)),
        };
        match serde_json::from_slice(&bytes) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(PersistenceError::Backend(format!(
                "{} does not hold a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(backend(&self.path, &e)),
        }
    }

    async fn write_document(&self, document: Map<String, Value>) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(&Value::Object(document))
            .map_err(|e| backend(&self.path, &e))?;
        let temp = self.temp_path();

        let mut file = tokio::fs::File::create(&temp)
            .await
            .map_err(|e| backend(&temp, &e))?;
        file.write_all(&bytes).await.map_err(|e| backend(&temp, &e))?;
        file.sync_all().await.map_err(|e| backend(&temp, &e))?;
        drop(file);

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| backend(&self.path, &e))?;
        self.sync_parent().await
    }

    /// Flush the directory so a rename or removal is durable.
    #[cfg(unix)]
    async fn sync_parent(&self) -> Result<(), PersistenceError> {
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let dir = tokio::fs::File::open(parent)
            .await
            .map_err(|e| backend(parent, &e))?;
        dir.sync_all().await.map_err(|e| backend(parent, &e))
    }

    // Directories cannot be opened for syncing here
    #[cfg(not(unix))]
    #[allow(clippy::unused_async)]
    async fn sync_parent(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

fn backend(path: &Path, error: &dyn std::fmt::Display) -> PersistenceError {
    PersistenceError::Backend(format!("{}: {error}", path.display()))
}

impl PersistenceGateway for JsonFileGateway {
    fn load(&self, key: StorageKey) -> GatewayFuture<'_, Option<Value>> {
        Box::pin(async move {
            let mut document = self.read_document().await?;
            Ok(document.remove(key.as_str()))
        })
    }

    fn save(&self, batch: Vec<StoredValue>) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut document = self.read_document().await?;
            for StoredValue { key, value } in batch {
                document.insert(key.as_str().to_string(), value);
            }
            self.write_document(document).await?;
            tracing::trace!(path = %self.path.display(), "Document written");
            Ok(())
        })
    }

    fn clear(&self) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => self.sync_parent().await,
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(backend(&self.path, &e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway() -> (tempfile::TempDir, JsonFileGateway) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = JsonFileGateway::new(dir.path().join("walkup.json"));
        (dir, gateway)
    }

    #[tokio::test]
    async fn missing_file_loads_nothing() {
        let (_dir, gateway) = gateway();
        assert_eq!(gateway.load(StorageKey::Tickets).await.unwrap(), None);
    }

    #[tokio::test]
    async fn batch_is_merged_into_document() {
        let (_dir, gateway) = gateway();
        gateway
            .save(vec![StoredValue {
                key: StorageKey::Counters,
                value: json!({ "G": 1 }),
            }])
            .await
            .unwrap();
        gateway
            .save(vec![
                StoredValue {
                    key: StorageKey::Tickets,
                    value: json!([]),
                },
                StoredValue {
                    key: StorageKey::Counters,
                    value: json!({ "G": 2 }),
                },
            ])
            .await
            .unwrap();

        assert_eq!(gateway.load(StorageKey::Counters).await.unwrap(), Some(json!({ "G": 2 })));
        assert_eq!(gateway.load(StorageKey::Tickets).await.unwrap(), Some(json!([])));
        assert_eq!(gateway.load(StorageKey::CalledTickets).await.unwrap(), None);

        let raw: Value = serde_json::from_slice(&std::fs::read(gateway.path()).unwrap()).unwrap();
        assert!(raw.get("ticketCounters").is_some());
        assert!(!gateway.temp_path().exists());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (_dir, gateway) = gateway();
        gateway
            .save(vec![StoredValue {
                key: StorageKey::Tickets,
                value: json!([]),
            }])
            .await
            .unwrap();

        gateway.clear().await.unwrap();
        gateway.clear().await.unwrap();

        assert_eq!(gateway.load(StorageKey::Tickets).await.unwrap(), None);
    }

    #[tokio::test]
    async fn interrupted_write_leaves_committed_document_intact() {
        let (_dir, gateway) = gateway();
        gateway
            .save(vec![StoredValue {
                key: StorageKey::Counters,
                value: json!({ "G": 7 }),
            }])
            .await
            .unwrap();

        // A crash mid-write leaves a truncated temp file behind
        std::fs::write(gateway.temp_path(), b"{\"ticketCoun").unwrap();
        assert_eq!(gateway.load(StorageKey::Counters).await.unwrap(), Some(json!({ "G": 7 })));

        gateway
            .save(vec![StoredValue {
                key: StorageKey::Counters,
                value: json!({ "G": 8 }),
            }])
            .await
            .unwrap();
        assert_eq!(gateway.load(StorageKey::Counters).await.unwrap(), Some(json!({ "G": 8 })));
        assert!(!gateway.temp_path().exists());
    }

    #[tokio::test]
    async fn empty_batch_creates_document_and_clear_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = JsonFileGateway::new(dir.path().join("nested.json"));
        gateway.save(Vec::new()).await.unwrap();
        assert!(gateway.path().exists());
        gateway.clear().await.unwrap();
        assert!(!gateway.path().exists());
    }

    #[tokio::test]
    async fn corrupt_document_is_a_backend_error() {
        let (_dir, gateway) = gateway();
        std::fs::write(gateway.path(), b"[1, 2]").unwrap();

        let err = gateway.load(StorageKey::Tickets).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Backend(_)));
    }
}
