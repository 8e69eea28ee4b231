//! Data models for content categories, model choices, subscriptions and
//! generated digests.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Category`]: The eight fixed content kinds a user may request
//! - [`ModelChoice`]: The closed set of LLM model identifiers
//! - [`SubscriptionRecord`]: Persisted daily-delivery preferences for one address
//! - [`GeneratedSection`]: One category's generated text (or failure) for a single run
//!
//! Categories and models serialize as their human-readable labels so stored
//! documents stay compatible with records written by earlier deployments.

use chrono::{SecondsFormat, Utc};
use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A kind of content that can be generated for a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Category {
    #[serde(rename = "Personalized Story")]
    PersonalizedStory,
    #[serde(rename = "Themed Blog Post")]
    ThemedBlogPost,
    #[serde(rename = "Poem or Haiku")]
    PoemOrHaiku,
    #[serde(rename = "Character Backstory")]
    CharacterBackstory,
    #[serde(rename = "Dream Interpretation")]
    DreamInterpretation,
    #[serde(rename = "Daily Puzzle")]
    DailyPuzzle,
    #[serde(rename = "Top 5 News Digest")]
    #[value(name = "top-5-news-digest")]
    NewsDigest,
    #[serde(rename = "Fun Facts & Mini Lessons")]
    FunFacts,
}

impl Category {
    /// Every category, in the order the form presents them.
    pub const ALL: [Category; 8] = [
        Category::PersonalizedStory,
        Category::ThemedBlogPost,
        Category::PoemOrHaiku,
        Category::CharacterBackstory,
        Category::DreamInterpretation,
        Category::DailyPuzzle,
        Category::NewsDigest,
        Category::FunFacts,
    ];

    /// The display label, also used as the stored value.
    pub fn label(&self) -> &'static str {
        match self {
            Category::PersonalizedStory => "Personalized Story",
            Category::ThemedBlogPost => "Themed Blog Post",
            Category::PoemOrHaiku => "Poem or Haiku",
            Category::CharacterBackstory => "Character Backstory",
            Category::DreamInterpretation => "Dream Interpretation",
            Category::DailyPuzzle => "Daily Puzzle",
            Category::NewsDigest => "Top 5 News Digest",
            Category::FunFacts => "Fun Facts & Mini Lessons",
        }
    }

    pub fn is_news(&self) -> bool {
        matches!(self, Category::NewsDigest)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts either the display label or the kebab-case CLI name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| {
                c.label().eq_ignore_ascii_case(s)
                    || c.to_possible_value()
                        .map(|v| v.matches(s, true))
                        .unwrap_or(false)
            })
            .ok_or_else(|| format!("unknown content category: {s}"))
    }
}

/// Remove duplicate categories while keeping the first occurrence of each.
pub fn ordered_categories(categories: &[Category]) -> Vec<Category> {
    categories.iter().copied().unique().collect()
}

/// The LLM model a digest is generated with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ModelChoice {
    #[default]
    #[serde(rename = "llama-3.3-70b-versatile")]
    #[value(name = "llama-3.3-70b-versatile")]
    Llama33Versatile,
    #[serde(rename = "llama3-70b-8192")]
    #[value(name = "llama3-70b-8192")]
    Llama3Large,
    #[serde(rename = "mistral-saba-24b")]
    #[value(name = "mistral-saba-24b")]
    MistralSaba,
    #[serde(rename = "gemma-9b-it")]
    #[value(name = "gemma-9b-it")]
    Gemma9b,
    #[serde(rename = "deepseek-r1-distill-llama-70b")]
    #[value(name = "deepseek-r1-distill-llama-70b")]
    DeepseekR1Distill,
    #[serde(rename = "qwen-2.5-32b")]
    #[value(name = "qwen-2.5-32b")]
    Qwen25,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 6] = [
        ModelChoice::Llama33Versatile,
        ModelChoice::Llama3Large,
        ModelChoice::MistralSaba,
        ModelChoice::Gemma9b,
        ModelChoice::DeepseekR1Distill,
        ModelChoice::Qwen25,
    ];

    /// The provider's model identifier.
    pub fn id(&self) -> &'static str {
        match self {
            ModelChoice::Llama33Versatile => "llama-3.3-70b-versatile",
            ModelChoice::Llama3Large => "llama3-70b-8192",
            ModelChoice::MistralSaba => "mistral-saba-24b",
            ModelChoice::Gemma9b => "gemma-9b-it",
            ModelChoice::DeepseekR1Distill => "deepseek-r1-distill-llama-70b",
            ModelChoice::Qwen25 => "qwen-2.5-32b",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Persisted daily-delivery preferences for one email address.
///
/// The email doubles as the document key, so a second opt-in by the same
/// address replaces the first (last write wins).
///
/// # JSON Schema
///
/// ```text
/// { "email", "prompt", "content_types": [label...], "model_choice",
///   "subscribed": bool, "timestamp": ISO-8601 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub email: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub content_types: Vec<Category>,
    #[serde(default)]
    pub model_choice: ModelChoice,
    #[serde(default)]
    pub subscribed: bool,
    pub timestamp: String,
}

impl SubscriptionRecord {
    /// Build a subscribed record stamped with the current UTC time.
    pub fn subscribe(
        email: &str,
        prompt: &str,
        content_types: &[Category],
        model_choice: ModelChoice,
    ) -> Self {
        Self {
            email: email.trim().to_string(),
            prompt: prompt.to_string(),
            content_types: ordered_categories(content_types),
            model_choice,
            subscribed: true,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// The body of one digest section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    /// Text returned by the model.
    Text(String),
    /// Generation failed; holds the reason shown to the reader.
    Failed(String),
}

/// One category's output within a single generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSection {
    pub category: Category,
    pub body: SectionBody,
}

impl GeneratedSection {
    pub fn text(category: Category, text: impl Into<String>) -> Self {
        Self {
            category,
            body: SectionBody::Text(text.into()),
        }
    }

    pub fn failed(category: Category, reason: impl Into<String>) -> Self {
        Self {
            category,
            body: SectionBody::Failed(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.body, SectionBody::Text(_))
    }
}

/// Count of successful and failed sections in a run.
pub fn section_counts(sections: &[GeneratedSection]) -> (usize, usize) {
    let ok = sections.iter().filter(|s| s.is_ok()).count();
    (ok, sections.len() - ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.label().parse::<Category>().unwrap(), category);
        }
        assert_eq!(
            "top-5-news-digest".parse::<Category>().unwrap(),
            Category::NewsDigest
        );
        assert_eq!(
            "fun-facts".parse::<Category>().unwrap(),
            Category::FunFacts
        );
        assert!("Horoscope".parse::<Category>().is_err());
    }

    #[test]
    fn test_ordered_categories_dedupes_keeping_first() {
        let picked = [
            Category::DailyPuzzle,
            Category::NewsDigest,
            Category::DailyPuzzle,
        ];
        assert_eq!(
            ordered_categories(&picked),
            vec![Category::DailyPuzzle, Category::NewsDigest]
        );
    }

    #[test]
    fn test_record_serializes_labels() {
        let record = SubscriptionRecord::subscribe(
            " reader@example.com ",
            "rainy mornings",
            &[Category::PoemOrHaiku, Category::NewsDigest],
            ModelChoice::Qwen25,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["email"], "reader@example.com");
        assert_eq!(json["content_types"][0], "Poem or Haiku");
        assert_eq!(json["content_types"][1], "Top 5 News Digest");
        assert_eq!(json["model_choice"], "qwen-2.5-32b");
        assert_eq!(json["subscribed"], true);
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_record_defaults_missing_model() {
        let json = r#"{"email":"a@b.c","prompt":"p","content_types":["Daily Puzzle"],"subscribed":true,"timestamp":"2025-01-01T00:00:00Z"}"#;
        let record: SubscriptionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.model_choice, ModelChoice::Llama33Versatile);
        assert_eq!(record.content_types, vec![Category::DailyPuzzle]);
    }

    #[test]
    fn test_section_counts() {
        let sections = vec![
            GeneratedSection::text(Category::DailyPuzzle, "riddle"),
            GeneratedSection::failed(Category::NewsDigest, "search down"),
        ];
        assert_eq!(section_counts(&sections), (1, 1));
    }
}
