//! Digest delivery over authenticated SMTP.
//!
//! [`Mailer`] abstracts message submission so the flows can be exercised
//! without a mail server; [`SmtpMailer`] submits through `lettre` with
//! STARTTLS and login credentials taken from the environment.
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `EMAIL_HOST` | Sender address, also the SMTP login |
//! | `EMAIL_PASSWORD` | SMTP password |
//! | `EMAIL_SERVER` | SMTP server hostname |
//! | `EMAIL_PORT` | SMTP submission port (usually 587) |

use crate::digest::{SUBJECT, render_digest};
use crate::models::{GeneratedSection, ModelChoice};
use chrono::NaiveDate;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::error::Error;
use std::fmt;
use tracing::{info, instrument};

/// Submits one HTML email to one recipient.
pub trait Mailer {
    async fn send_html(&self, recipient: &str, subject: &str, html: String) -> Result<(), Box<dyn Error>>;
}

/// SMTP submission settings.
#[derive(Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    /// Sender address and login user.
    pub sender: String,
    pub password: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// [`Mailer`] backed by an async `lettre` SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, Box<dyn Error>> {
        let from: Mailbox = settings
            .sender
            .parse()
            .map_err(|e| format!("invalid EMAIL_HOST sender address: {e}"))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.password.clone(),
            ))
            .build();
        info!(server = %settings.server, port = settings.port, "SMTP transport configured");
        Ok(Self { transport, from })
    }
}

/// Build the multipart/alternative message carrying `html`.
pub fn build_message(from: &Mailbox, recipient: &str, subject: &str, html: String) -> Result<Message, Box<dyn Error>> {
    let to: Mailbox = recipient
        .trim()
        .parse()
        .map_err(|e| format!("invalid recipient address {recipient:?}: {e}"))?;
    let message = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .multipart(MultiPart::alternative().singlepart(SinglePart::html(html)))?;
    Ok(message)
}

impl Mailer for SmtpMailer {
    #[instrument(level = "info", skip(self, html), fields(bytes = html.len()))]
    async fn send_html(&self, recipient: &str, subject: &str, html: String) -> Result<(), Box<dyn Error>> {
        let message = build_message(&self.from, recipient, subject, html)?;
        let response = self.transport.send(message).await?;
        info!(code = %response.code(), "Digest submitted");
        Ok(())
    }
}

/// Render the digest for `sections` and send it to `recipient`.
#[instrument(level = "info", skip(mailer, sections), fields(sections = sections.len(), %model_used))]
pub async fn send_digest<M: Mailer>(
    mailer: &M,
    recipient: &str,
    sections: &[GeneratedSection],
    model_used: ModelChoice,
    date: NaiveDate,
) -> Result<(), Box<dyn Error>> {
    let html = render_digest(sections, model_used, date);
    mailer.send_html(recipient, SUBJECT, html).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::testing::RecordingMailer;

    fn sender() -> Mailbox {
        "dailyverse@example.com".parse().unwrap()
    }

    #[test]
    fn test_build_message_is_html_alternative() {
        let message = build_message(
            &sender(),
            "reader@example.com",
            SUBJECT,
            "<p>hello</p>".to_string(),
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: reader@example.com"));
        assert!(raw.contains("From: dailyverse@example.com"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_build_message_rejects_bad_recipient() {
        let err = build_message(&sender(), "not an address", SUBJECT, String::new()).unwrap_err();
        assert!(err.to_string().contains("invalid recipient"));
    }

    #[tokio::test]
    async fn test_send_digest_renders_sections() {
        let mailer = RecordingMailer::default();
        let sections = vec![GeneratedSection::text(Category::DailyPuzzle, "What has keys?")];
        send_digest(
            &mailer,
            "reader@example.com",
            &sections,
            ModelChoice::default(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        )
        .await
        .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "reader@example.com");
        assert_eq!(sent[0].subject, SUBJECT);
        assert!(sent[0].html.contains("What has keys?"));
    }
}
