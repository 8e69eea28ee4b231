//! # DailyVerse
//!
//! Personalized content digests generated by an LLM and delivered by email,
//! once on request or every day to subscribers.
//!
//! ## Features
//!
//! - Eight content categories, from short stories to a search-grounded
//!   "Top 5 News Digest"
//! - Groq-hosted models, Tavily web search for the news digest
//! - Styled HTML digest submitted over authenticated SMTP
//! - Daily delivery subscriptions in a local document store or Firestore
//!
//! ## Usage
//!
//! ```sh
//! dailyverse send -e you@example.com -k poem-or-haiku -p "first snow" --daily
//! dailyverse run-daily
//! ```
//!
//! ## Architecture
//!
//! 1. **Form**: validate the request ([`form`])
//! 2. **Generate**: one LLM call per category, news grounded in search ([`generator`])
//! 3. **Render & send**: HTML digest over SMTP ([`digest`], [`notifier`])
//! 4. **Subscribe**: store the preferences for the daily batch ([`store`], [`daily`])

use chrono::Local;
use clap::{Parser, ValueEnum};
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod daily;
mod digest;
mod form;
mod generator;
mod models;
mod notifier;
mod search;
mod services;
mod store;
mod utils;

#[cfg(test)]
mod testing;

use api::{GroqClient, RetryChat};
use cli::{Cli, Command, CredentialArgs, SendArgs};
use config::{Config, ConfigError, StoreBackend, load_config};
use daily::{BatchStatus, DailyJob, due_check};
use form::{FormInput, FormSession};
use generator::ContentGenerator;
use models::{Category, ModelChoice};
use notifier::{SmtpMailer, SmtpSettings};
use search::TavilyClient;
use services::Services;
use store::{AnyStore, FileStore, FirestoreStore};

type Generator = ContentGenerator<RetryChat<GroqClient>, TavilyClient>;

fn require<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn build_generator(config: &Config, creds: &CredentialArgs) -> Result<Generator, Box<dyn Error>> {
    let groq_key = require(creds.groq_api_key.as_deref(), "GROQ_API_KEY")?;
    let groq = GroqClient::new(&config.groq_base_url, groq_key, config.request_timeout())?;
    let llm = RetryChat::new(groq, config.llm_retries, std::time::Duration::from_secs(1));

    let search = match creds.tavily_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Some(TavilyClient::new(
            &config.tavily_base_url,
            key,
            config.search_max_results,
            config.request_timeout(),
        )?),
        None => {
            warn!("TAVILY_API_KEY not set; news digests will be unavailable");
            None
        }
    };
    Ok(ContentGenerator::new(llm, search, config.temperatures()))
}

fn build_mailer(creds: &CredentialArgs) -> Result<SmtpMailer, Box<dyn Error>> {
    let settings = SmtpSettings {
        server: require(creds.email_server.as_deref(), "EMAIL_SERVER")?.to_string(),
        port: creds.email_port.unwrap_or(587),
        sender: require(creds.email_host.as_deref(), "EMAIL_HOST")?.to_string(),
        password: require(creds.email_password.as_deref(), "EMAIL_PASSWORD")?.to_string(),
    };
    debug!(?settings, "SMTP settings");
    SmtpMailer::new(&settings)
}

async fn open_store(config: &Config, creds: &CredentialArgs) -> Result<AnyStore, Box<dyn Error>> {
    match config.store.backend {
        StoreBackend::File => Ok(AnyStore::File(FileStore::open(&config.store.path).await?)),
        StoreBackend::Firestore => {
            let token = require(creds.firestore_access_token.as_deref(), "FIRESTORE_ACCESS_TOKEN")?;
            let store = FirestoreStore::from_credentials_file(
                &creds.firebase_credentials,
                token,
                config.request_timeout(),
            )
            .await?;
            Ok(AnyStore::Firestore(store))
        }
    }
}

async fn run_send(
    args: SendArgs,
    services: &Services<'_, RetryChat<GroqClient>, TavilyClient, SmtpMailer, AnyStore>,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let input = FormInput {
        email: args.email,
        categories: args.categories,
        model: args.model,
        prompt: args.prompt,
        daily: args.daily,
    };
    if input.prompt.trim().is_empty() {
        debug!(hint = input.prompt_hint(), "Prompt left blank");
    }

    let mut session = FormSession::new();
    println!("✨ Crafting your personalized content with {}...", input.model);
    match session.submit(&input, services, Local::now().date_naive()).await {
        Ok(outcome) => {
            debug!(state = ?session.state(), "Form submitted");
            for line in outcome.banner(&config.delivery_time) {
                println!("{line}");
            }
            Ok(())
        }
        Err(e) if e.is_warning() => {
            warn!(warning = %e, "Form not submitted");
            eprintln!("⚠️ {e}");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "Form submission failed");
            eprintln!("❌ {e}");
            Err(e.into())
        }
    }
}

async fn run_daily(
    force: bool,
    services: &Services<'_, RetryChat<GroqClient>, TavilyClient, SmtpMailer, AnyStore>,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let mut job = DailyJob::new(services, config.delivery_time()?);
    let status = job.run(Local::now().naive_local(), force).await?;
    debug!(state = ?job.state(), "Daily job finished");

    match status {
        BatchStatus::NotDue { last_run } => {
            info!(?last_run, delivery_time = %config.delivery_time, "Nothing to do");
            Ok(())
        }
        BatchStatus::Completed(report) => {
            for subscriber in &report.subscribers {
                println!("{}: {}", subscriber.email, subscriber.outcome);
            }
            if report.is_success() {
                Ok(())
            } else {
                Err(format!(
                    "{} of {} subscribers were not delivered",
                    report.failed(),
                    report.subscribers.len()
                )
                .into())
            }
        }
    }
}

fn print_categories() {
    println!("Content categories:");
    for category in Category::ALL {
        let name = category
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        println!("  {name:<22} {}", category.label());
    }
    println!("Models:");
    for model in ModelChoice::ALL {
        let marker = if model == ModelChoice::default() { " (default)" } else { "" };
        println!("  {}{marker}", model.id());
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(command = ?args.command, config = ?args.config, "Parsed CLI arguments");

    let config = match load_config(args.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    if let Command::Categories = args.command {
        print_categories();
        return Ok(());
    }

    let store = open_store(&config, &args.credentials).await?;

    // early timer ticks need neither model nor mail credentials
    if let Command::RunDaily { force: false } = args.command {
        let now = Local::now().naive_local();
        if let Some(status) = due_check(&store, config.delivery_time()?, now).await? {
            info!(?status, elapsed = ?start_time.elapsed(), "Execution complete");
            return Ok(());
        }
    }

    let generator = build_generator(&config, &args.credentials)?;
    let mailer = build_mailer(&args.credentials)?;
    let services = Services::new(&generator, &mailer, &store);

    let result = match args.command {
        Command::Send(send) => run_send(send, &services, &config).await,
        Command::RunDaily { force } => run_daily(force, &services, &config).await,
        Command::Categories => Ok(()),
    };

    let elapsed = start_time.elapsed();
    info!(?elapsed, ok = result.is_ok(), "Execution complete");
    result
}
