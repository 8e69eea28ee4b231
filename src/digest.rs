//! HTML digest rendering.
//!
//! Turns the sections of one generation run into the styled HTML document
//! that is emailed to the reader. Rendering is a pure function of its inputs
//! (the date is passed in), so the same sections always produce the same bytes.
//!
//! # News formatting
//!
//! The news section is free text from the model. Numbered markers (`1.`,
//! `2.`, ...) split it into items, and each item's headline is whatever
//! precedes the first `(`, `Source:` or `From:` on its first line. This is a
//! best-effort transform: a headline with an early parenthesis mis-splits,
//! and an item with no separator is shown with its number as the headline.

use crate::models::{GeneratedSection, ModelChoice, SectionBody};
use chrono::NaiveDate;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use once_cell::sync::Lazy;
use regex::Regex;

/// Email subject line.
pub const SUBJECT: &str = "🌟 Your DailyVerse Magic Has Arrived!";

static NEWS_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\s*").unwrap());
static HEADLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?)(?:\(|Source:|From:)").unwrap());

const STYLE: &str = r#"
        body {
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 650px;
            margin: 0 auto;
            padding: 20px;
        }
        .header {
            background: linear-gradient(135deg, #6C63FF 0%, #4834d4 100%);
            color: white;
            padding: 25px;
            border-radius: 15px 15px 0 0;
            text-align: center;
        }
        .content {
            background-color: #f9f9f9;
            border: 1px solid #e0e0e0;
            border-top: none;
            border-radius: 0 0 15px 15px;
            padding: 20px 25px;
        }
        .content-item {
            background-color: white;
            border-radius: 12px;
            padding: 20px;
            margin-bottom: 20px;
            box-shadow: 0 3px 10px rgba(0,0,0,0.08);
        }
        h2 { margin-top: 0; font-weight: 600; }
        h3 {
            color: #6C63FF;
            border-bottom: 2px solid #e0e0e0;
            padding-bottom: 10px;
            margin-top: 0;
        }
        .footer { text-align: center; margin-top: 30px; font-size: 0.9em; color: #666; }
        .date { color: white; opacity: 0.9; font-size: 1.1em; margin-top: 5px; }
        .model-info { color: #666; font-size: 0.85em; font-style: italic; text-align: right; }
        .unavailable { color: #a33; font-style: italic; }
        .news-item { border-left: 3px solid #6C63FF; padding-left: 15px; margin-bottom: 15px; }
        .news-headline { font-weight: bold; color: #333; margin-bottom: 5px; }
"#;

/// One numbered item of a news digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    /// The marker as written, e.g. `"1. "`.
    pub number: String,
    /// `None` when the first line has no `(`, `Source:` or `From:`.
    pub headline: Option<String>,
    pub body: String,
}

/// A news digest split into its numbered items.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewsDigest {
    /// Text before the first marker, unchanged.
    pub preamble: String,
    pub items: Vec<NewsItem>,
}

/// Split model output into numbered news items.
pub fn format_news_digest(content: &str) -> NewsDigest {
    let markers: Vec<_> = NEWS_MARKER.find_iter(content).collect();
    let Some(first) = markers.first() else {
        return NewsDigest {
            preamble: content.to_string(),
            items: Vec::new(),
        };
    };

    let items = markers
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let end = markers
                .get(i + 1)
                .map(|next| next.start())
                .unwrap_or(content.len());
            let item = content[marker.end()..end].trim();
            match HEADLINE.captures(item) {
                Some(caps) => {
                    let headline = caps[1].trim();
                    NewsItem {
                        number: marker.as_str().to_string(),
                        headline: Some(headline.to_string()),
                        body: item[headline.len()..].trim().to_string(),
                    }
                }
                None => NewsItem {
                    number: marker.as_str().to_string(),
                    headline: None,
                    body: item.to_string(),
                },
            }
        })
        .collect();

    NewsDigest {
        preamble: content[..first.start()].to_string(),
        items,
    }
}

fn news_markup(text: &str) -> Markup {
    let digest = format_news_digest(text);
    html! {
        (digest.preamble)
        @for item in &digest.items {
            div class="news-item" {
                div class="news-headline" {
                    (item.number)
                    @if let Some(headline) = &item.headline { (headline) }
                }
                (item.body)
            }
        }
    }
}

fn text_markup(text: &str) -> Markup {
    html! {
        @for (i, line) in text.split('\n').enumerate() {
            @if i > 0 { br; }
            (line)
        }
    }
}

fn section_markup(section: &GeneratedSection) -> Markup {
    let title = section.category.label();
    html! {
        div class="content-item" {
            @match &section.body {
                SectionBody::Text(text) => {
                    @if section.category.is_news() {
                        h3 { "📰 " (title) }
                        div { (news_markup(text)) }
                    } @else {
                        h3 { "💫 " (title) }
                        div { (text_markup(text)) }
                    }
                }
                SectionBody::Failed(reason) => {
                    h3 { "⚠️ " (title) }
                    div class="unavailable" {
                        "This section could not be generated today: " (reason)
                    }
                }
            }
        }
    }
}

/// Render the full HTML digest for `sections`, one block per section in order.
pub fn render_digest(sections: &[GeneratedSection], model_used: ModelChoice, date: NaiveDate) -> String {
    let markup = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                style { (PreEscaped(STYLE)) }
            }
            body {
                div class="header" {
                    h2 { "✨ Your DailyVerse Magic ✨" }
                    div class="date" { (date.format("%A, %B %d, %Y").to_string()) }
                }
                div class="content" {
                    p { "Here's your uniquely crafted content, made just for you:" }
                    @for section in sections {
                        (section_markup(section))
                    }
                    div class="model-info" { "Generated using " (model_used.id()) }
                    div class="footer" {
                        p { "Made with ❤️ by DailyVerse" }
                        p { "Want more? Check your email tomorrow for fresh content!" }
                    }
                }
            }
        }
    };
    markup.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 6).unwrap()
    }

    fn item(number: &str, headline: Option<&str>, body: &str) -> NewsItem {
        NewsItem {
            number: number.to_string(),
            headline: headline.map(str::to_string),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_news_items_split_headline_before_parenthesis() {
        let digest = format_news_digest("1. Headline A (Source: X)\n2. Headline B (Source: Y)");
        assert_eq!(digest.preamble, "");
        assert_eq!(
            digest.items,
            vec![
                item("1. ", Some("Headline A"), "(Source: X)"),
                item("2. ", Some("Headline B"), "(Source: Y)"),
            ]
        );
    }

    #[test]
    fn test_news_item_without_separator_has_no_headline() {
        let digest = format_news_digest("1. Just a plain line");
        assert_eq!(digest.items, vec![item("1. ", None, "Just a plain line")]);
    }

    #[test]
    fn test_news_keeps_preamble_and_source_keyword() {
        let digest = format_news_digest("Today's digest:\n1. Rates cut Source: Reuters");
        assert_eq!(digest.preamble, "Today's digest:\n");
        assert_eq!(digest.items, vec![item("1. ", Some("Rates cut"), "Source: Reuters")]);
    }

    #[test]
    fn test_news_without_markers_is_all_preamble() {
        let digest = format_news_digest("No numbered items here");
        assert_eq!(digest.preamble, "No numbered items here");
        assert!(digest.items.is_empty());
    }

    #[test]
    fn test_news_markup() {
        let html = news_markup("1. Headline A (Source: X)\n2. No separator").into_string();
        assert_eq!(
            html,
            concat!(
                r#"<div class="news-item"><div class="news-headline">1. Headline A</div>(Source: X)</div>"#,
                r#"<div class="news-item"><div class="news-headline">2. </div>No separator</div>"#,
            )
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let sections = vec![
            GeneratedSection::text(Category::PersonalizedStory, "Line one\nLine two"),
            GeneratedSection::text(Category::NewsDigest, "1. A (Source: X)"),
        ];
        let a = render_digest(&sections, ModelChoice::default(), date());
        let b = render_digest(&sections, ModelChoice::default(), date());
        assert_eq!(a, b);
        assert!(a.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_render_one_block_per_section_in_order() {
        let sections = vec![
            GeneratedSection::text(Category::DailyPuzzle, "riddle"),
            GeneratedSection::text(Category::PoemOrHaiku, "haiku"),
            GeneratedSection::failed(Category::NewsDigest, "search failed"),
        ];
        let html = render_digest(&sections, ModelChoice::Qwen25, date());
        assert_eq!(html.matches(r#"<div class="content-item">"#).count(), 3);

        let puzzle = html.find("Daily Puzzle").unwrap();
        let poem = html.find("Poem or Haiku").unwrap();
        let news = html.find("Top 5 News Digest").unwrap();
        assert!(puzzle < poem && poem < news);

        assert!(html.contains("Monday, October 06, 2025"));
        assert!(html.contains("Generated using qwen-2.5-32b"));
        assert!(html.contains("could not be generated today: search failed"));
    }

    #[test]
    fn test_render_converts_newlines_and_escapes() {
        let sections = vec![GeneratedSection::text(Category::FunFacts, "a < b\nc & d")];
        let html = render_digest(&sections, ModelChoice::default(), date());
        assert!(html.contains("a &lt; b<br>c &amp; d"));
        assert!(html.contains("Fun Facts &amp; Mini Lessons"));
    }

    #[test]
    fn test_render_escapes_news_and_failure_reasons() {
        let sections = vec![
            GeneratedSection::text(Category::NewsDigest, "1. <b>Big</b> news (Source: \"X\")"),
            GeneratedSection::failed(Category::DailyPuzzle, "<script>"),
        ];
        let html = render_digest(&sections, ModelChoice::default(), date());
        assert!(html.contains("1. &lt;b&gt;Big&lt;/b&gt; news</div>(Source: &quot;X&quot;)"));
        assert!(html.contains("today: &lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
