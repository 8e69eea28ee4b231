//! Local-file subscription store.
//!
//! # Layout
//!
//! ```text
//! root/
//! ├── dailyverse_users/
//! │   ├── reader%40example.com.json
//! │   └── other%40example.com.json
//! └── _meta/
//!     ├── daily_batch.json
//!     └── claims/
//!         └── 2025-10-06.claim
//! ```
//!
//! Documents are written to a temporary file and renamed into place so a
//! crashed write never leaves a truncated record behind. A daily batch claim
//! is a file created with `create_new`, which fails if another run got there
//! first.

use super::{StoreError, SubscriptionStore, USERS_COLLECTION};
use crate::models::SubscriptionRecord;
use crate::utils::ensure_writable_dir;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Serialize, Deserialize)]
struct BatchMarker {
    /// `YYYY-MM-DD`
    last_run_date: String,
}

#[derive(Debug)]
pub struct FileStore {
    collection_dir: PathBuf,
    meta_dir: PathBuf,
    claims_dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    #[instrument(level = "info", skip_all, fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let collection_dir = root.join(USERS_COLLECTION);
        let meta_dir = root.join("_meta");
        let claims_dir = meta_dir.join("claims");
        ensure_writable_dir(&collection_dir).await?;
        fs::create_dir_all(&claims_dir).await?;
        info!("File store ready");
        Ok(Self {
            collection_dir,
            meta_dir,
            claims_dir,
        })
    }

    fn document_path(&self, email: &str) -> PathBuf {
        self.collection_dir
            .join(format!("{}.json", urlencoding::encode(email.trim())))
    }

    fn marker_path(&self) -> PathBuf {
        self.meta_dir.join("daily_batch.json")
    }
}

async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl SubscriptionStore for FileStore {
    #[instrument(level = "info", skip_all, fields(email = %record.email))]
    async fn upsert(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        let path = self.document_path(&record.email);
        write_atomic(&path, serde_json::to_vec_pretty(record)?).await?;
        info!(path = %path.display(), "Saved subscription");
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        match read_optional(&self.document_path(email)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    #[instrument(level = "info", skip_all)]
    async fn list_subscribed(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.collection_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<SubscriptionRecord>(&bytes) {
                Ok(record) if record.subscribed => records.push(record),
                Ok(record) => debug!(email = %record.email, "Skipping unsubscribed record"),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed subscription document"),
            }
        }
        records.sort_by(|a, b| a.email.cmp(&b.email));
        info!(count = records.len(), "Listed subscribed records");
        Ok(records)
    }

    async fn last_batch_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        let Some(bytes) = read_optional(&self.marker_path()).await? else {
            return Ok(None);
        };
        let marker: BatchMarker = serde_json::from_slice(&bytes)?;
        match marker.last_run_date.parse() {
            Ok(date) => Ok(Some(date)),
            Err(e) => {
                warn!(value = %marker.last_run_date, error = %e, "Ignoring unreadable batch marker");
                Ok(None)
            }
        }
    }

    #[instrument(level = "info", skip(self))]
    async fn claim_batch(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let claim = self.claims_dir.join(format!("{date}.claim"));
        let created = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&claim)
            .await;
        match created {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!("Daily batch already claimed");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let marker = BatchMarker {
            last_run_date: date.to_string(),
        };
        write_atomic(&self.marker_path(), serde_json::to_vec(&marker)?).await?;
        info!("Claimed daily batch");
        Ok(true)
    }
}
