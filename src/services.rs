//! The generate → render → send pipeline shared by the form and the daily batch.

use crate::api::ChatModel;
use crate::generator::ContentGenerator;
use crate::models::{Category, ModelChoice, SectionBody, section_counts};
use crate::notifier::{Mailer, send_digest};
use crate::search::WebSearch;
use crate::store::SubscriptionStore;
use chrono::NaiveDate;
use std::fmt;
use tracing::{error, info, instrument, warn};

/// Result of delivering one digest to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The digest was submitted; `failed` sections were replaced by notices.
    Sent { generated: usize, failed: usize },
    /// Every section failed, so nothing was sent.
    NothingGenerated { reasons: Vec<String> },
    /// Content was generated but the mail submission failed.
    SendFailed(String),
    /// The request could not be attempted at all.
    Skipped(String),
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent { .. })
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Sent { generated, failed: 0 } => {
                write!(f, "sent ({generated} sections)")
            }
            DeliveryOutcome::Sent { generated, failed } => {
                write!(f, "sent ({generated} sections, {failed} unavailable)")
            }
            DeliveryOutcome::NothingGenerated { reasons } => {
                write!(f, "not sent, nothing generated: {}", reasons.join("; "))
            }
            DeliveryOutcome::SendFailed(reason) => write!(f, "not sent: {reason}"),
            DeliveryOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Handles to every external collaborator, constructed once and passed by reference.
pub struct Services<'a, L, S, M, St> {
    pub generator: &'a ContentGenerator<L, S>,
    pub mailer: &'a M,
    pub store: &'a St,
}

impl<'a, L, S, M, St> Services<'a, L, S, M, St>
where
    L: ChatModel,
    S: WebSearch,
    M: Mailer,
    St: SubscriptionStore,
{
    pub fn new(generator: &'a ContentGenerator<L, S>, mailer: &'a M, store: &'a St) -> Self {
        Self {
            generator,
            mailer,
            store,
        }
    }

    /// Generate every category, render the digest and send it to `recipient`.
    #[instrument(level = "info", skip(self, prompt, categories), fields(%recipient, %model))]
    pub async fn deliver(
        &self,
        recipient: &str,
        prompt: &str,
        categories: &[Category],
        model: ModelChoice,
        date: NaiveDate,
    ) -> DeliveryOutcome {
        if categories.is_empty() {
            warn!("No content types selected; nothing to deliver");
            return DeliveryOutcome::Skipped("no content types selected".to_string());
        }

        let sections = self.generator.generate_all(prompt, categories, model).await;
        let (generated, failed) = section_counts(&sections);
        if generated == 0 {
            let reasons = sections
                .iter()
                .filter_map(|s| match &s.body {
                    SectionBody::Failed(reason) => Some(format!("{}: {reason}", s.category)),
                    SectionBody::Text(_) => None,
                })
                .collect();
            return DeliveryOutcome::NothingGenerated { reasons };
        }

        match send_digest(self.mailer, recipient, &sections, model, date).await {
            Ok(()) => {
                info!(generated, failed, "Digest delivered");
                DeliveryOutcome::Sent { generated, failed }
            }
            Err(e) => {
                error!(error = %e, "Digest send failed");
                DeliveryOutcome::SendFailed(e.to_string())
            }
        }
    }
}
