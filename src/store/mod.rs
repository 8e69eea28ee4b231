//! Persistence of daily-delivery subscriptions.
//!
//! Records are keyed by email address, so a second opt-in by the same
//! address overwrites the first (last write wins, no merge, no history).
//! The store also arbitrates the daily batch: a run claims the day before
//! sending anything, and a claim for a day can be taken only once, so
//! overlapping invocations of the batch entry point never double-send.
//!
//! # Backends
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | Local files | [`file`] | One JSON document per address under a collection directory |
//! | Firestore | [`firestore`] | REST API, project from the service credentials blob |

pub mod file;
pub mod firestore;

use crate::models::SubscriptionRecord;
use chrono::NaiveDate;
use thiserror::Error;

pub use file::FileStore;
pub use firestore::FirestoreStore;

/// Collection holding subscription documents.
pub const USERS_COLLECTION: &str = "dailyverse_users";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// A keyed collection of subscription records.
pub trait SubscriptionStore {
    /// Create or replace the record keyed by `record.email`.
    async fn upsert(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;

    async fn get(&self, email: &str) -> Result<Option<SubscriptionRecord>, StoreError>;

    /// Every record with `subscribed == true`.
    async fn list_subscribed(&self) -> Result<Vec<SubscriptionRecord>, StoreError>;

    /// Local date of the last claimed daily batch, if any.
    async fn last_batch_date(&self) -> Result<Option<NaiveDate>, StoreError>;

    /// Claim the daily batch for `date`.
    ///
    /// Returns `false` when the day was already claimed. Taking the claim is
    /// atomic with respect to other processes using the same store.
    async fn claim_batch(&self, date: NaiveDate) -> Result<bool, StoreError>;
}

/// The backend selected by configuration.
#[derive(Debug)]
pub enum AnyStore {
    File(FileStore),
    Firestore(FirestoreStore),
}

impl SubscriptionStore for AnyStore {
    async fn upsert(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        match self {
            AnyStore::File(s) => s.upsert(record).await,
            AnyStore::Firestore(s) => s.upsert(record).await,
        }
    }

    async fn get(&self, email: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        match self {
            AnyStore::File(s) => s.get(email).await,
            AnyStore::Firestore(s) => s.get(email).await,
        }
    }

    async fn list_subscribed(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        match self {
            AnyStore::File(s) => s.list_subscribed().await,
            AnyStore::Firestore(s) => s.list_subscribed().await,
        }
    }

    async fn last_batch_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        match self {
            AnyStore::File(s) => s.last_batch_date().await,
            AnyStore::Firestore(s) => s.last_batch_date().await,
        }
    }

    async fn claim_batch(&self, date: NaiveDate) -> Result<bool, StoreError> {
        match self {
            AnyStore::File(s) => s.claim_batch(date).await,
            AnyStore::Firestore(s) => s.claim_batch(date).await,
        }
    }
}
