//! The daily batch: regenerate and resend every subscriber's digest.
//!
//! The batch is an entry point, not a scheduler. An external timer (cron, a
//! systemd timer, an orchestrator job) invokes it as often as it likes; the
//! batch only does work once the local delivery time has passed and nobody
//! has claimed today's batch yet.
//!
//! The claim is taken through the store before the first subscriber is
//! processed. Two overlapping runs therefore cannot both send, and a run
//! that dies halfway is not repeated by the next timer tick (rerun it with
//! `--force`).
//!
//! Subscribers are processed one at a time. Each yields its own
//! [`DeliveryOutcome`], so one subscriber's failure never stops the rest.

use crate::api::ChatModel;
use crate::notifier::Mailer;
use crate::search::WebSearch;
use crate::services::{DeliveryOutcome, Services};
use crate::store::{StoreError, SubscriptionStore};
use crate::utils::batch_is_due;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberReport {
    pub email: String,
    pub outcome: DeliveryOutcome,
}

/// Per-subscriber results of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub date: NaiveDate,
    pub subscribers: Vec<SubscriberReport>,
}

impl BatchReport {
    pub fn sent(&self) -> usize {
        self.subscribers.iter().filter(|s| s.outcome.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.subscribers.len() - self.sent()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    /// Before the delivery time, or already claimed today.
    NotDue { last_run: Option<NaiveDate> },
    Completed(BatchReport),
}

/// `Some(NotDue)` when the batch should not start at local time `now`.
///
/// Only needs the store, so callers can check before building any providers.
pub async fn due_check<St: SubscriptionStore>(
    store: &St,
    delivery_time: NaiveTime,
    now: NaiveDateTime,
) -> Result<Option<BatchStatus>, StoreError> {
    let last_run = store.last_batch_date().await?;
    if batch_is_due(now, delivery_time, last_run) {
        Ok(None)
    } else {
        info!(?last_run, %delivery_time, "Daily batch not due");
        Ok(Some(BatchStatus::NotDue { last_run }))
    }
}

/// Runs the daily batch against the configured services.
pub struct DailyJob<'s, 'a, L, S, M, St> {
    services: &'s Services<'a, L, S, M, St>,
    delivery_time: NaiveTime,
    state: JobState,
}

impl<'s, 'a, L, S, M, St> DailyJob<'s, 'a, L, S, M, St>
where
    L: ChatModel,
    S: WebSearch,
    M: Mailer,
    St: SubscriptionStore,
{
    pub fn new(services: &'s Services<'a, L, S, M, St>, delivery_time: NaiveTime) -> Self {
        Self {
            services,
            delivery_time,
            state: JobState::Idle,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run the batch if it is due at local time `now` (always, with `force`).
    ///
    /// Only a failure to claim the day or to read the subscriber list is an
    /// error; per-subscriber failures are in the report. A failed claim sends
    /// nothing, so the next tick simply tries again.
    #[instrument(level = "info", skip(self), fields(delivery_time = %self.delivery_time))]
    pub async fn run(&mut self, now: NaiveDateTime, force: bool) -> Result<BatchStatus, StoreError> {
        if !force {
            if let Some(status) = due_check(self.services.store, self.delivery_time, now).await? {
                return Ok(status);
            }
        }

        let date = now.date();
        let claimed = match self.services.store.claim_batch(date).await {
            Ok(claimed) => claimed,
            Err(e) => {
                error!(error = %e, %date, "Failed to claim daily batch");
                return Err(e);
            }
        };
        if !claimed {
            if !force {
                info!(%date, "Daily batch claimed by another run");
                return Ok(BatchStatus::NotDue { last_run: Some(date) });
            }
            warn!(%date, "Forcing a daily batch that was already claimed");
        }

        self.state = JobState::Running;
        let result = self.run_batch(date).await;
        self.state = JobState::Idle;
        result.map(BatchStatus::Completed)
    }

    async fn run_batch(&self, date: NaiveDate) -> Result<BatchReport, StoreError> {
        let records = self.services.store.list_subscribed().await?;
        info!(subscribers = records.len(), %date, "Daily batch started");

        let mut subscribers = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let outcome = self
                .services
                .deliver(
                    &record.email,
                    &record.prompt,
                    &record.content_types,
                    record.model_choice,
                    date,
                )
                .await;
            if outcome.is_sent() {
                info!(index = i, email = %record.email, %outcome, "Subscriber processed");
            } else {
                warn!(index = i, email = %record.email, %outcome, "Subscriber not delivered");
            }
            subscribers.push(SubscriberReport {
                email: record.email.clone(),
                outcome,
            });
        }

        let report = BatchReport { date, subscribers };
        info!(
            total = report.subscribers.len(),
            sent = report.sent(),
            failed = report.failed(),
            "Daily batch completed"
        );
        Ok(report)
    }
}
