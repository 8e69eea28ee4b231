//! The interactive request form.
//!
//! A [`FormSession`] is one user's pass through the form:
//!
//! ```text
//! collecting-input --submit (valid)--> sending --ok--> sent
//!        ^                               |               |
//!        +----------- error -------------+               |
//!        +----------------- start_over ------------------+
//! ```
//!
//! Validation problems are warnings and leave the session collecting input
//! without touching any provider. Once a digest has been sent the session
//! refuses further submits until [`FormSession::start_over`] is called.

use crate::api::ChatModel;
use crate::models::{Category, ModelChoice, SubscriptionRecord, ordered_categories};
use crate::notifier::Mailer;
use crate::search::WebSearch;
use crate::services::{DeliveryOutcome, Services};
use crate::store::SubscriptionStore;
use chrono::NaiveDate;
use lettre::Address;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormState {
    #[default]
    CollectingInput,
    Sent,
}

/// The values entered in the form.
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    pub email: String,
    pub categories: Vec<Category>,
    pub model: ModelChoice,
    pub prompt: String,
    pub daily: bool,
}

impl FormInput {
    fn news_only(&self) -> bool {
        !self.categories.is_empty() && self.categories.iter().all(Category::is_news)
    }

    /// Hint shown above the prompt field.
    pub fn prompt_hint(&self) -> &'static str {
        if self.news_only() {
            "Enter a news topic (or leave blank for general news):"
        } else {
            "Enter a text prompt:"
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("Please enter your email address.")]
    MissingEmail,

    #[error("{0:?} is not a valid email address.")]
    InvalidEmail(String),

    #[error("Please choose at least one kind of content.")]
    NoCategories,

    #[error("Please provide a prompt.")]
    MissingPrompt,

    #[error("Your DailyVerse has already been sent. Start over to create another.")]
    AlreadySent,

    #[error("An error occurred: nothing could be generated ({0})")]
    GenerationFailed(String),

    #[error("An error occurred while sending your DailyVerse: {0}")]
    SendFailed(String),
}

impl FormError {
    /// Input problems the user can fix in place, as opposed to provider failures.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            FormError::MissingEmail
                | FormError::InvalidEmail(_)
                | FormError::NoCategories
                | FormError::MissingPrompt
                | FormError::AlreadySent
        )
    }
}

/// Whether the daily opt-in was stored.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionStatus {
    NotRequested,
    Saved,
    Failed(String),
}

/// What a successful submit produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub delivery: DeliveryOutcome,
    pub subscription: SubscriptionStatus,
    /// Non-fatal notices to show alongside the success banner.
    pub notices: Vec<String>,
}

impl SubmitOutcome {
    /// Banner lines for the user, given the daily delivery time label.
    pub fn banner(&self, delivery_time: &str) -> Vec<String> {
        let mut lines = vec![
            "✅ Your DailyVerse has been sent to your email! Check your inbox shortly.".to_string(),
        ];
        match &self.subscription {
            SubscriptionStatus::Saved => lines.push(format!(
                "🔄 You're now subscribed for daily content delivery! Same content types will be sent daily at {delivery_time}."
            )),
            SubscriptionStatus::Failed(reason) => lines.push(format!(
                "⚠️ Your daily delivery could not be saved: {reason}"
            )),
            SubscriptionStatus::NotRequested => {}
        }
        lines.extend(self.notices.iter().cloned());
        lines
    }
}

/// One user's session with the form.
#[derive(Debug, Default)]
pub struct FormSession {
    state: FormState,
}

impl FormSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    /// The "create another" action.
    pub fn start_over(&mut self) {
        self.state = FormState::CollectingInput;
    }

    /// Check the preconditions for sending.
    pub fn validate(&self, input: &FormInput) -> Result<(), FormError> {
        if self.state == FormState::Sent {
            return Err(FormError::AlreadySent);
        }
        let email = input.email.trim();
        if email.is_empty() {
            return Err(FormError::MissingEmail);
        }
        if email.parse::<Address>().is_err() {
            return Err(FormError::InvalidEmail(email.to_string()));
        }
        if input.categories.is_empty() {
            return Err(FormError::NoCategories);
        }
        if input.prompt.trim().is_empty() && !input.news_only() {
            return Err(FormError::MissingPrompt);
        }
        Ok(())
    }

    /// Validate, generate, send and optionally subscribe.
    #[instrument(level = "info", skip_all, fields(email = %input.email.trim(), model = %input.model, daily = input.daily))]
    pub async fn submit<L, S, M, St>(
        &mut self,
        input: &FormInput,
        services: &Services<'_, L, S, M, St>,
        today: NaiveDate,
    ) -> Result<SubmitOutcome, FormError>
    where
        L: ChatModel,
        S: WebSearch,
        M: Mailer,
        St: SubscriptionStore,
    {
        if let Err(e) = self.validate(input) {
            warn!(warning = %e, "Form input rejected");
            return Err(e);
        }

        let email = input.email.trim();
        let categories = ordered_categories(&input.categories);
        let mut notices = Vec::new();
        if categories.iter().any(Category::is_news) && !services.generator.has_search() {
            warn!("News digest requested without a search key");
            notices.push(
                "⚠️ Tavily API key not found. The news digest could not use real-time search results."
                    .to_string(),
            );
        }

        let delivery = services
            .deliver(email, &input.prompt, &categories, input.model, today)
            .await;
        match &delivery {
            DeliveryOutcome::Sent { failed, .. } if *failed > 0 => notices.push(format!(
                "⚠️ {failed} section(s) could not be generated and are marked in your email."
            )),
            DeliveryOutcome::Sent { .. } => {}
            DeliveryOutcome::NothingGenerated { reasons } => {
                return Err(FormError::GenerationFailed(reasons.join("; ")));
            }
            DeliveryOutcome::SendFailed(reason) => return Err(FormError::SendFailed(reason.clone())),
            DeliveryOutcome::Skipped(_) => return Err(FormError::NoCategories),
        }
        self.state = FormState::Sent;

        let subscription = if input.daily {
            let record = SubscriptionRecord::subscribe(email, &input.prompt, &categories, input.model);
            match services.store.upsert(&record).await {
                Ok(()) => {
                    info!("Subscribed for daily delivery");
                    SubscriptionStatus::Saved
                }
                Err(e) => {
                    error!(error = %e, "Failed to save subscription");
                    SubscriptionStatus::Failed(e.to_string())
                }
            }
        } else {
            SubscriptionStatus::NotRequested
        };

        Ok(SubmitOutcome {
            delivery,
            subscription,
            notices,
        })
    }
}
