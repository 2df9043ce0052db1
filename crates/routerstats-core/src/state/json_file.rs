// # Durable JSON Document
//
// Shared persistence mechanics for the file-backed stores.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps <name>.backup of last known good document
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   ...store-specific tables...
// }
// ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;

/// Document format version
/// Used for future migration if format changes
pub const DOCUMENT_VERSION: &str = "1.0";

/// A versioned store document
pub trait VersionedDocument: Serialize + DeserializeOwned + Default {
    fn version(&self) -> &str;
}

/// A JSON document on disk with atomic replacement and backup recovery
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// Bind to `path`, creating parent directories if needed
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// Path of the live document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load the main file
    /// 2. If it is corrupt, try loading the backup and restore it
    /// 3. If the backup also fails, start with an empty document
    pub async fn load_with_recovery<T: VersionedDocument>(&self) -> Result<T, Error> {
        match Self::load(&self.path).await {
            Ok(doc) => Ok(doc),
            Err(LoadError::Io(e)) => Err(e),
            Err(LoadError::Corrupt(e)) => {
                tracing::warn!(
                    "State file {} appears corrupted: {}. Attempting recovery from backup.",
                    self.path.display(),
                    e
                );

                let backup_path = self.backup_path();
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty state.");
                    return Ok(T::default());
                }

                match Self::load::<T>(&backup_path).await {
                    Ok(doc) => {
                        tracing::info!("Recovered state from backup {}", backup_path.display());
                        if let Err(restore_err) = self.restore_from_backup().await {
                            tracing::error!(
                                "Failed to restore state file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(doc)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unusable: {}. Starting with empty state.",
                            backup_err
                        );
                        Ok(T::default())
                    }
                }
            }
        }
    }

    async fn load<T: VersionedDocument>(path: &Path) -> Result<T, LoadError> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(T::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Io(Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        })?;

        let doc: T = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupt(Error::state_store(format!(
                "Failed to parse state file {}: {}",
                path.display(),
                e
            )))
        })?;

        if doc.version() != DOCUMENT_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                DOCUMENT_VERSION,
                doc.version()
            );
        }

        Ok(doc)
    }

    /// Replace the document on disk atomically
    pub async fn write<T: Serialize>(&self, doc: &T) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, self.backup_path()).await
        {
            tracing::warn!("Failed to create backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    async fn restore_from_backup(&self) -> Result<(), Error> {
        let backup_path = self.backup_path();
        fs::copy(&backup_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file {} from backup", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling_path("tmp")
    }

    pub(crate) fn backup_path(&self) -> PathBuf {
        self.sibling_path("backup")
    }

    /// `<file name>.<suffix>` next to the document, so documents sharing a
    /// stem never share a temp or backup file
    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

enum LoadError {
    Io(Error),
    Corrupt(Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) | LoadError::Corrupt(e) => e.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        version: String,
        values: BTreeMap<String, u64>,
    }

    impl Default for Doc {
        fn default() -> Self {
            Self {
                version: DOCUMENT_VERSION.to_string(),
                values: BTreeMap::new(),
            }
        }
    }

    impl VersionedDocument for Doc {
        fn version(&self) -> &str {
            &self.version
        }
    }

    fn doc_with(key: &str, value: u64) -> Doc {
        let mut doc = Doc::default();
        doc.values.insert(key.to_string(), value);
        doc
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let file = JsonFile::open(dir.path().join("nested/dir/stats.json"))
            .await
            .unwrap();

        assert!(dir.path().join("nested/dir").exists());
        let doc: Doc = file.load_with_recovery().await.unwrap();
        assert_eq!(doc, Doc::default());
    }

    #[tokio::test]
    async fn write_then_reload() {
        let dir = tempdir().unwrap();
        let file = JsonFile::open(dir.path().join("stats.json")).await.unwrap();

        file.write(&doc_with("main_wan", 42)).await.unwrap();

        let reopened = JsonFile::open(dir.path().join("stats.json")).await.unwrap();
        let doc: Doc = reopened.load_with_recovery().await.unwrap();
        assert_eq!(doc.values.get("main_wan"), Some(&42));
    }

    #[tokio::test]
    async fn corruption_recovers_previous_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let file = JsonFile::open(&path).await.unwrap();

        file.write(&doc_with("a", 1)).await.unwrap();
        file.write(&doc_with("a", 2)).await.unwrap();
        assert!(file.backup_path().exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        let doc: Doc = file.load_with_recovery().await.unwrap();
        assert_eq!(doc.values.get("a"), Some(&1));

        // Main file restored from backup
        let restored = fs::read_to_string(&path).await.unwrap();
        assert!(serde_json::from_str::<Doc>(&restored).is_ok());
    }

    #[test]
    fn sidecar_paths_extend_the_file_name() {
        let file = JsonFile {
            path: PathBuf::from("/var/lib/routerstats/network_stats.json"),
        };
        assert_eq!(
            file.temp_path(),
            PathBuf::from("/var/lib/routerstats/network_stats.json.tmp")
        );
        assert_eq!(
            file.backup_path(),
            PathBuf::from("/var/lib/routerstats/network_stats.json.backup")
        );
    }

    #[tokio::test]
    async fn same_stem_documents_keep_separate_backups() {
        let dir = tempdir().unwrap();
        let traffic = JsonFile::open(dir.path().join("stats.traffic")).await.unwrap();
        let leases = JsonFile::open(dir.path().join("stats.leases")).await.unwrap();

        traffic.write(&doc_with("main_wan", 1)).await.unwrap();
        traffic.write(&doc_with("main_wan", 2)).await.unwrap();
        leases.write(&doc_with("lease", 7)).await.unwrap();
        leases.write(&doc_with("lease", 8)).await.unwrap();
        assert_ne!(traffic.backup_path(), leases.backup_path());

        fs::write(traffic.path(), b"corrupted json data").await.unwrap();

        let doc: Doc = traffic.load_with_recovery().await.unwrap();
        assert_eq!(doc.values.get("main_wan"), Some(&1));
        assert!(doc.values.get("lease").is_none());
    }

    #[tokio::test]
    async fn corruption_without_backup_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, b"{ not json").await.unwrap();

        let file = JsonFile::open(&path).await.unwrap();
        let doc: Doc = file.load_with_recovery().await.unwrap();
        assert!(doc.values.is_empty());
    }
}
