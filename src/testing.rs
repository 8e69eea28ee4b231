//! In-memory doubles for the provider traits, shared by the unit tests.

use crate::api::{ChatModel, ChatRequest};
use crate::models::SubscriptionRecord;
use crate::notifier::Mailer;
use crate::search::{SearchResult, WebSearch};
use crate::store::{StoreError, SubscriptionStore};
use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;

/// Chat model that answers every request with fixed text and records it.
#[derive(Debug, Default)]
pub struct FakeChat {
    reply: String,
    /// Fail any request whose messages contain this text.
    fail_on: Option<String>,
    requests: RefCell<Vec<ChatRequest>>,
}

impl FakeChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Default::default()
        }
    }

    pub fn failing_on(reply: &str, needle: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail_on: Some(needle.to_string()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.borrow().clone()
    }
}

impl ChatModel for FakeChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, Box<dyn Error>> {
        self.requests.borrow_mut().push(request.clone());
        // let concurrently polled callers interleave here
        tokio::task::yield_now().await;
        if let Some(needle) = &self.fail_on {
            if request.messages.iter().any(|m| m.content.contains(needle.as_str())) {
                return Err("model unavailable".into());
            }
        }
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Default)]
pub struct FakeSearch {
    titles: Vec<String>,
    fail: bool,
    queries: RefCell<Vec<String>>,
}

impl FakeSearch {
    pub fn with_titles(titles: &[&str]) -> Self {
        Self {
            titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }
}

impl WebSearch for FakeSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, Box<dyn Error>> {
        self.queries.borrow_mut().push(query.to_string());
        if self.fail {
            return Err("search quota exceeded".into());
        }
        Ok(self
            .titles
            .iter()
            .map(|t| SearchResult {
                title: t.clone(),
                url: format!("https://news.example.com/{}", t.len()),
                content: format!("{t} in detail."),
                published_date: None,
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub html: String,
}

/// Mailer that keeps every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: RefCell<Vec<SentMail>>,
    fail: Cell<bool>,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.fail.set(true);
        mailer
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.borrow().clone()
    }
}

impl Mailer for RecordingMailer {
    async fn send_html(&self, recipient: &str, subject: &str, html: String) -> Result<(), Box<dyn Error>> {
        if self.fail.get() {
            return Err("535 authentication failed".into());
        }
        self.sent.borrow_mut().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            html,
        });
        Ok(())
    }
}

/// Store keeping records in a map keyed by email.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<BTreeMap<String, SubscriptionRecord>>,
    last_batch: Cell<Option<NaiveDate>>,
    claims: RefCell<BTreeSet<NaiveDate>>,
    fail_writes: bool,
    fail_claims: bool,
}

impl MemoryStore {
    pub fn with(records: Vec<SubscriptionRecord>) -> Self {
        let store = Self::default();
        for record in records {
            store.records.borrow_mut().insert(record.email.clone(), record);
        }
        store
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    /// Store whose batch claims always fail, as when the backend is down.
    pub fn failing_claims(records: Vec<SubscriptionRecord>) -> Self {
        Self {
            fail_claims: true,
            ..Self::with(records)
        }
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }
}

impl SubscriptionStore for MemoryStore {
    async fn upsert(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Api {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.records
            .borrow_mut()
            .insert(record.email.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self.records.borrow().get(email).cloned())
    }

    async fn list_subscribed(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        Ok(self
            .records
            .borrow()
            .values()
            .filter(|r| r.subscribed)
            .cloned()
            .collect())
    }

    async fn last_batch_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.last_batch.get())
    }

    async fn claim_batch(&self, date: NaiveDate) -> Result<bool, StoreError> {
        if self.fail_claims {
            return Err(StoreError::Api {
                status: 503,
                body: "unavailable".into(),
            });
        }
        if !self.claims.borrow_mut().insert(date) {
            return Ok(false);
        }
        self.last_batch.set(Some(date));
        Ok(true)
    }
}
