//! Local, advisory usage counters persisted as a small JSON file.

use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// The persisted counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Number of successful registrations made through the bot.
    pub registered_count: u64,
    /// Users who have activated farming at least once.
    pub farmed_user_ids: BTreeSet<String>,
}

/// File-backed store for a [`CounterRecord`].
///
/// The whole file is read and rewritten on every access. Updates made through one store are
/// serialized; nothing protects the file from other processes.
#[derive(Debug)]
pub struct CounterStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CounterStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, creating the file with empty counters if it does not exist yet.
    pub async fn load(&self) -> anyhow::Result<CounterRecord> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// Overwrite the file with `record`.
    pub async fn save(&self, record: &CounterRecord) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        self.write(record).await
    }

    /// Count one more successful registration.
    pub async fn record_registration(&self) -> anyhow::Result<CounterRecord> {
        let _guard = self.lock.lock().await;
        let mut record = self.read().await?;
        record.registered_count = record.registered_count.saturating_add(1);
        self.write(&record).await?;
        Ok(record)
    }

    /// Remember that `user_id` has activated farming. Idempotent.
    pub async fn record_farm_activation(&self, user_id: &str) -> anyhow::Result<CounterRecord> {
        let _guard = self.lock.lock().await;
        let mut record = self.read().await?;
        if record.farmed_user_ids.insert(user_id.to_string()) {
            self.write(&record).await?;
        }
        Ok(record)
    }

    async fn read(&self) -> anyhow::Result<CounterRecord> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("counter file {} is corrupt", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let record = CounterRecord::default();
                self.write(&record).await?;
                tracing::info!(path = %self.path.display(), "created counter file");
                Ok(record)
            }
            Err(e) => Err(e)
                .with_context(|| format!("failed to read counter file {}", self.path.display())),
        }
    }

    async fn write(&self, record: &CounterRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        // Write a sibling file and rename it into place, so a crash mid-write leaves the old
        // record intact
        let json = serde_json::to_vec_pretty(record)?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, json)
            .await
            .with_context(|| format!("failed to write counter file {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("failed to replace counter file {}", self.path.display()))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
