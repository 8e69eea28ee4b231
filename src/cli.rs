//! Command-line interface definitions for DailyVerse.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Provider credentials can be provided via command-line flags or environment variables.

use crate::models::{Category, ModelChoice};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the DailyVerse application.
///
/// # Examples
///
/// ```sh
/// # Generate and send one digest
/// dailyverse send -e you@example.com -k personalized-story -k top-5-news-digest -p "rainy mornings"
///
/// # Same, and subscribe for daily delivery
/// dailyverse send -e you@example.com -p "rainy mornings" --daily
///
/// # Run the daily batch (from cron or a systemd timer)
/// dailyverse run-daily
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, env = "DAILYVERSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Provider credentials and endpoints, normally supplied through the environment.
#[derive(Args, Debug, Default)]
pub struct CredentialArgs {
    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true, global = true)]
    pub groq_api_key: Option<String>,

    /// Tavily API key (news digest search)
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true, global = true)]
    pub tavily_api_key: Option<String>,

    /// Sender address, also used as the SMTP login
    #[arg(long, env = "EMAIL_HOST", global = true)]
    pub email_host: Option<String>,

    /// SMTP server hostname
    #[arg(long, env = "EMAIL_SERVER", global = true)]
    pub email_server: Option<String>,

    /// SMTP submission port
    #[arg(long, env = "EMAIL_PORT", global = true)]
    pub email_port: Option<u16>,

    /// SMTP password
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true, global = true)]
    pub email_password: Option<String>,

    /// Path to the Firebase service credentials JSON
    #[arg(long, env = "FIREBASE_CREDENTIALS", default_value = "firebase_config.json", global = true)]
    pub firebase_credentials: PathBuf,

    /// OAuth access token for Firestore
    #[arg(long, env = "FIRESTORE_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub firestore_access_token: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a digest now and email it, optionally subscribing for daily delivery
    Send(SendArgs),

    /// Run the daily batch for every subscriber if it is due
    RunDaily {
        /// Run even if before the delivery time or already run today
        #[arg(long)]
        force: bool,
    },

    /// List the available content categories and models
    Categories,
}

/// The fields of the digest request form.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Email address for delivery
    #[arg(short, long, default_value = "")]
    pub email: String,

    /// Content to receive (repeatable)
    #[arg(short = 'k', long = "category", value_enum, default_values_t = [Category::PersonalizedStory])]
    pub categories: Vec<Category>,

    /// LLM model used for generation
    #[arg(short, long, value_enum, default_value_t = ModelChoice::default())]
    pub model: ModelChoice,

    /// Text prompt (or a news topic; blank means general news)
    #[arg(short, long, default_value = "")]
    pub prompt: String,

    /// Opt in to daily content delivery
    #[arg(long)]
    pub daily: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_parsing() {
        let cli = Cli::parse_from([
            "dailyverse",
            "send",
            "--email",
            "you@example.com",
            "-k",
            "poem-or-haiku",
            "-k",
            "top-5-news-digest",
            "--model",
            "qwen-2.5-32b",
            "-p",
            "autumn",
            "--daily",
        ]);

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.email, "you@example.com");
        assert_eq!(args.categories, vec![Category::PoemOrHaiku, Category::NewsDigest]);
        assert_eq!(args.model, ModelChoice::Qwen25);
        assert_eq!(args.prompt, "autumn");
        assert!(args.daily);
    }

    #[test]
    fn test_send_defaults() {
        let cli = Cli::parse_from(["dailyverse", "send"]);
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.email, "");
        assert_eq!(args.categories, vec![Category::PersonalizedStory]);
        assert_eq!(args.model, ModelChoice::Llama33Versatile);
        assert!(!args.daily);
    }

    #[test]
    fn test_run_daily_with_global_config() {
        let cli = Cli::parse_from(["dailyverse", "run-daily", "--force", "-c", "/etc/dailyverse.yaml"]);
        assert!(matches!(cli.command, Command::RunDaily { force: true }));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dailyverse.yaml")));
    }

    #[test]
    fn test_rejects_unknown_category() {
        assert!(Cli::try_parse_from(["dailyverse", "send", "-k", "horoscope"]).is_err());
    }
}
