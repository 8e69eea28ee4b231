//! Firestore-backed subscription store (REST API).
//!
//! Documents live in the `dailyverse_users` collection keyed by email
//! address. The project id comes from the service credentials blob; requests
//! authenticate with an OAuth access token issued for that service account.
//!
//! Daily batch claims are `dailyverse_meta/batch-YYYY-MM-DD` documents made
//! with `createDocument`, which answers 409 when the document already exists.

use super::{StoreError, SubscriptionStore, USERS_COLLECTION};
use crate::models::{Category, ModelChoice, SubscriptionRecord};
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::fmt;
use std::path::Path;
use std::time::Duration as StdDuration;
use tracing::{debug, info, instrument, warn};
use url::Url;

const META_COLLECTION: &str = "dailyverse_meta";
const BATCH_DOCUMENT: &str = "daily_batch";
const PAGE_SIZE: usize = 300;

#[derive(Debug, Deserialize)]
struct ServiceCredentials {
    project_id: String,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct FirestoreStore {
    http: reqwest::Client,
    documents: Url,
    access_token: String,
}

impl fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("documents", &self.documents.as_str())
            .finish_non_exhaustive()
    }
}

impl FirestoreStore {
    /// Build a store for the project named in the credentials file.
    pub async fn from_credentials_file(
        path: &Path,
        access_token: &str,
        timeout: StdDuration,
    ) -> Result<Self, StoreError> {
        let bytes = tokio::fs::read(path).await?;
        let creds: ServiceCredentials = serde_json::from_slice(&bytes)?;
        let documents = Url::parse(&format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
            creds.project_id
        ))
        .map_err(|e| StoreError::Config(e.to_string()))?;
        info!(project = %creds.project_id, "Firestore store configured");
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            documents,
            access_token: access_token.to_string(),
        })
    }

    fn document_url(&self, collection: &str, id: Option<&str>) -> Result<Url, StoreError> {
        let mut url = self.documents.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Config("documents URL cannot be a base".into()))?;
            segments.push(collection);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn patch(&self, url: Url, fields: Value) -> Result<(), StoreError> {
        let resp = self
            .http
            .patch(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    /// Create `collection/id`; `false` if it already exists.
    async fn create(&self, collection: &str, id: &str, fields: Value) -> Result<bool, StoreError> {
        let mut url = self.document_url(collection, None)?;
        url.query_pairs_mut().append_pair("documentId", id);
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::CONFLICT {
            return Ok(false);
        }
        check(resp).await.map(|_| true)
    }

    async fn fetch(&self, url: Url) -> Result<Option<Document>, StoreError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(resp).await?.json().await?))
    }
}

fn claim_id(date: NaiveDate) -> String {
    format!("batch-{date}")
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        body: truncate_for_log(&body, 300),
    })
}

/// Encode a record as Firestore typed fields.
pub fn to_fields(record: &SubscriptionRecord) -> Value {
    let types: Vec<Value> = record
        .content_types
        .iter()
        .map(|c| json!({ "stringValue": c.label() }))
        .collect();
    json!({
        "email": { "stringValue": record.email },
        "prompt": { "stringValue": record.prompt },
        "content_types": { "arrayValue": { "values": types } },
        "model_choice": { "stringValue": record.model_choice.id() },
        "subscribed": { "booleanValue": record.subscribed },
        "timestamp": { "stringValue": record.timestamp },
    })
}

fn string_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    fields.get(name)?.get("stringValue")?.as_str()
}

/// Decode Firestore typed fields into a record.
///
/// Unknown categories are dropped and an unknown model falls back to the
/// default, so documents edited by hand still load.
pub fn from_fields(fields: &Map<String, Value>) -> Option<SubscriptionRecord> {
    let email = string_field(fields, "email")?.to_string();
    let content_types = fields
        .get("content_types")
        .and_then(|v| v.pointer("/arrayValue/values"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.get("stringValue")?.as_str())
                .filter_map(|label| label.parse::<Category>().ok())
                .collect()
        })
        .unwrap_or_default();
    let model_choice = string_field(fields, "model_choice")
        .and_then(|id| ModelChoice::ALL.into_iter().find(|m| m.id() == id))
        .unwrap_or_default();

    Some(SubscriptionRecord {
        email,
        prompt: string_field(fields, "prompt").unwrap_or_default().to_string(),
        content_types,
        model_choice,
        subscribed: fields
            .get("subscribed")
            .and_then(|v| v.get("booleanValue"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        timestamp: string_field(fields, "timestamp").unwrap_or_default().to_string(),
    })
}

impl SubscriptionStore for FirestoreStore {
    #[instrument(level = "info", skip_all, fields(email = %record.email))]
    async fn upsert(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        let url = self.document_url(USERS_COLLECTION, Some(&record.email))?;
        self.patch(url, to_fields(record)).await?;
        info!("Saved subscription");
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        let url = self.document_url(USERS_COLLECTION, Some(email))?;
        Ok(self.fetch(url).await?.and_then(|doc| from_fields(&doc.fields)))
    }

    #[instrument(level = "info", skip_all)]
    async fn list_subscribed(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.document_url(USERS_COLLECTION, None)?;
            url.query_pairs_mut()
                .append_pair("pageSize", &PAGE_SIZE.to_string());
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let resp = self
                .http
                .get(url)
                .bearer_auth(&self.access_token)
                .send()
                .await?;
            let page: ListResponse = check(resp).await?.json().await?;
            debug!(documents = page.documents.len(), "Fetched document page");

            for doc in &page.documents {
                match from_fields(&doc.fields) {
                    Some(record) if record.subscribed => records.push(record),
                    Some(_) => {}
                    None => warn!("Skipping subscription document without email"),
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        info!(count = records.len(), "Listed subscribed records");
        Ok(records)
    }

    async fn last_batch_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        let url = self.document_url(META_COLLECTION, Some(BATCH_DOCUMENT))?;
        let Some(doc) = self.fetch(url).await? else {
            return Ok(None);
        };
        Ok(string_field(&doc.fields, "last_run_date").and_then(|d| d.parse().ok()))
    }

    #[instrument(level = "info", skip(self))]
    async fn claim_batch(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let fields = json!({ "last_run_date": { "stringValue": date.to_string() } });
        if !self.create(META_COLLECTION, &claim_id(date), fields.clone()).await? {
            info!("Daily batch already claimed");
            return Ok(false);
        }
        let url = self.document_url(META_COLLECTION, Some(BATCH_DOCUMENT))?;
        self.patch(url, fields).await?;
        info!("Claimed daily batch");
        Ok(true)
    }
}
