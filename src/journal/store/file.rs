//! Directory Journal Store
//!
//! One JSON file per request name. New entries are written to a temporary
//! file and hard-linked into place, so creation is atomic and fails when the
//! name is already taken. Updates replace the file with a rename.

use crate::error::{Error, Result};
use crate::journal::entry::JournalEntry;
use crate::journal::store::JournalStore;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

const ENTRY_EXTENSION: &str = "json";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the directory journal store
#[derive(Debug, Clone)]
pub struct FileJournalStoreConfig {
    /// Directory holding the entry files
    pub root_path: PathBuf,
    /// Whether to fsync entry files before linking them into place
    pub sync_writes: bool,
}

impl Default for FileJournalStoreConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("/var/lib/ceph-csi/journal"),
            sync_writes: true,
        }
    }
}

// =============================================================================
// Directory Store
// =============================================================================

/// Journal store persisting entries as files in a directory
#[derive(Debug)]
pub struct FileJournalStore {
    root_path: PathBuf,
    sync_writes: bool,
}

impl FileJournalStore {
    /// Open a store rooted at `root_path` with default settings
    pub async fn with_path(root_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(FileJournalStoreConfig {
            root_path: root_path.into(),
            ..Default::default()
        })
        .await
    }

    pub async fn with_config(config: FileJournalStoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.root_path).await?;

        Ok(Self {
            root_path: config.root_path,
            sync_writes: config.sync_writes,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn entry_path(&self, request_name: &str) -> PathBuf {
        self.root_path
            .join(format!("{}.{}", safe_filename(request_name), ENTRY_EXTENSION))
    }

    /// Write `entry` to a fresh temporary file next to its final path
    async fn write_temp(&self, entry: &JournalEntry) -> Result<PathBuf> {
        let tmp_path = self.root_path.join(format!(
            ".{}.tmp-{}",
            safe_filename(&entry.request_name),
            Uuid::new_v4().simple()
        ));
        let data = serde_json::to_vec_pretty(entry)?;

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| journal_error(&entry.request_name, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| journal_error(&entry.request_name, e))?;
        if self.sync_writes {
            file.sync_all()
                .await
                .map_err(|e| journal_error(&entry.request_name, e))?;
        }

        Ok(tmp_path)
    }

    async fn read_entry(&self, path: &Path, request_name: &str) -> Result<Option<JournalEntry>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(journal_error(request_name, e)),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| journal_error(request_name, e))
    }
}

#[async_trait]
impl JournalStore for FileJournalStore {
    async fn get(&self, request_name: &str) -> Result<Option<JournalEntry>> {
        self.read_entry(&self.entry_path(request_name), request_name)
            .await
    }

    async fn create(&self, entry: &JournalEntry) -> Result<bool> {
        let path = self.entry_path(&entry.request_name);
        let tmp_path = self.write_temp(entry).await?;

        let linked = fs::hard_link(&tmp_path, &path).await;
        let _ = fs::remove_file(&tmp_path).await;

        match linked {
            Ok(()) => {
                debug!("Journal entry created at {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(journal_error(&entry.request_name, e)),
        }
    }

    async fn update(&self, entry: &JournalEntry) -> Result<()> {
        let path = self.entry_path(&entry.request_name);
        if fs::metadata(&path).await.is_err() {
            return Err(Error::EntryNotFound {
                request_name: entry.request_name.clone(),
            });
        }

        let tmp_path = self.write_temp(entry).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(journal_error(&entry.request_name, e));
        }
        Ok(())
    }

    async fn remove(&self, request_name: &str) -> Result<bool> {
        match fs::remove_file(self.entry_path(request_name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(journal_error(request_name, e)),
        }
    }

    async fn list(&self) -> Result<Vec<JournalEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root_path).await?;

        while let Some(dirent) = dir.next_entry().await? {
            let path = dirent.path();
            let is_entry = path
                .extension()
                .map(|ext| ext == ENTRY_EXTENSION)
                .unwrap_or(false);
            let is_temp = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with('.'))
                .unwrap_or(true);
            if !is_entry || is_temp {
                continue;
            }

            let label = path.display().to_string();
            match self.read_entry(&path, &label).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable journal entry {}: {}", label, e),
            }
        }

        entries.sort_by(|a, b| a.request_name.cmp(&b.request_name));
        Ok(entries)
    }
}

/// Escape a request name into a portable file name
///
/// ASCII alphanumerics, `-` and `_` are kept, every other byte becomes `%XX`.
fn safe_filename(request_name: &str) -> String {
    let mut name = String::with_capacity(request_name.len());
    for byte in request_name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name
}

fn journal_error(request_name: &str, err: impl std::fmt::Display) -> Error {
    Error::Journal {
        request_name: request_name.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::entry::{EntryState, ObjectKind};
    use tempfile::TempDir;

    async fn test_store() -> (FileJournalStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = FileJournalStore::with_path(tmp.path()).await.unwrap();
        (store, tmp)
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("pvc-1_a"), "pvc-1_a");
        assert_eq!(safe_filename("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd");
        assert_ne!(safe_filename("a/b"), safe_filename("a%2Fb"));
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let (store, _tmp) = test_store().await;
        let mut entry = JournalEntry::provisional("pvc-1", ObjectKind::Volume, None);

        assert!(store.create(&entry).await.unwrap());
        assert!(!store
            .create(&JournalEntry::provisional("pvc-1", ObjectKind::Volume, None))
            .await
            .unwrap());

        let stored = store.get("pvc-1").await.unwrap().unwrap();
        assert_eq!(stored, entry);

        entry.state = EntryState::Ready;
        store.update(&entry).await.unwrap();
        assert_eq!(store.get("pvc-1").await.unwrap().unwrap().state, EntryState::Ready);

        assert!(store.remove("pvc-1").await.unwrap());
        assert!(store.get("pvc-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persistence() {
        let tmp = TempDir::new().unwrap();
        let entry = JournalEntry::provisional("snap/1", ObjectKind::Snapshot, None);

        {
            let store = FileJournalStore::with_path(tmp.path()).await.unwrap();
            store.create(&entry).await.unwrap();
        }

        {
            let store = FileJournalStore::with_path(tmp.path()).await.unwrap();
            let stored = store.get("snap/1").await.unwrap().unwrap();
            assert_eq!(stored.object_uuid, entry.object_uuid);

            let all = store.list().await.unwrap();
            assert_eq!(all.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_list_skips_foreign_files() {
        let (store, tmp) = test_store().await;
        store
            .create(&JournalEntry::provisional("b", ObjectKind::Volume, None))
            .await
            .unwrap();
        store
            .create(&JournalEntry::provisional("a", ObjectKind::Volume, None))
            .await
            .unwrap();
        fs::write(tmp.path().join("notes.txt"), b"hello").await.unwrap();
        fs::write(tmp.path().join("broken.json"), b"{").await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.request_name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
