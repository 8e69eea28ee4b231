//! Content generation for each digest category.
//!
//! Every category is one LLM call. The news digest is the exception that
//! first runs a web search and interpolates the hits into its instruction.
//!
//! Failures never escape as placeholder text: [`ContentGenerator::generate_all`]
//! returns one [`GeneratedSection`] per category, successful or not, and the
//! caller decides what an aggregate failure means.

use crate::api::{ChatMessage, ChatModel, ChatRequest};
use crate::models::{Category, GeneratedSection, ModelChoice, section_counts};
use crate::search::{WebSearch, render_results};
use std::error::Error;
use tracing::{error, info, instrument, warn};

/// Search query used for the news digest when the prompt is blank.
pub const DEFAULT_NEWS_TOPIC: &str = "current events";

const NEWS_DIGEST_TEMPLATE: &str = r#"Based on the following search results, create a concise "Top 5 News Digest" on the topic of {topic}.

For each news item:
1. Include a catchy headline
2. Write a brief 2-3 sentence summary
3. Include the source and publication date if available

Format it as a clean, easy-to-read digest with numbered items.

SEARCH RESULTS:
{search_results}"#;

/// Sampling temperatures for the two prompt shapes.
#[derive(Debug, Clone, Copy)]
pub struct Temperatures {
    pub creative: f32,
    pub news: f32,
}

impl Default for Temperatures {
    fn default() -> Self {
        Self {
            creative: 0.7,
            news: 0.5,
        }
    }
}

/// The search query for a news digest: the trimmed prompt, or the default topic.
pub fn news_query(prompt: &str) -> &str {
    let topic = prompt.trim();
    if topic.is_empty() {
        DEFAULT_NEWS_TOPIC
    } else {
        topic
    }
}

/// Build the news digest instruction around already-rendered search results.
pub fn news_instruction(topic: &str, search_results: &str) -> String {
    NEWS_DIGEST_TEMPLATE
        .replace("{topic}", topic)
        .replace("{search_results}", search_results)
}

/// System and user messages for a non-news category.
pub fn category_messages(category: Category, prompt: &str) -> Vec<ChatMessage> {
    let kind = category.label().to_lowercase();
    vec![
        ChatMessage::system(format!(
            "You are an expert at creating {kind}. Make it engaging and relevant to the prompt."
        )),
        ChatMessage::user(format!("Generate a {kind} based on this prompt: {prompt}")),
    ]
}

/// Generates digest sections by delegating to an LLM and, for news, a search provider.
#[derive(Debug)]
pub struct ContentGenerator<L, S> {
    llm: L,
    search: Option<S>,
    temperatures: Temperatures,
}

impl<L, S> ContentGenerator<L, S>
where
    L: ChatModel,
    S: WebSearch,
{
    /// `search` is `None` when no search key is configured; news sections then fail.
    pub fn new(llm: L, search: Option<S>, temperatures: Temperatures) -> Self {
        Self {
            llm,
            search,
            temperatures,
        }
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    #[cfg(test)]
    pub fn llm(&self) -> &L {
        &self.llm
    }

    /// Generate the text for one category.
    #[instrument(level = "info", skip(self, prompt), fields(%category, %model))]
    pub async fn generate(
        &self,
        prompt: &str,
        category: Category,
        model: ModelChoice,
    ) -> Result<String, Box<dyn Error>> {
        if category.is_news() {
            return self.generate_news_digest(prompt, model).await;
        }

        let request = ChatRequest {
            model,
            temperature: self.temperatures.creative,
            messages: category_messages(category, prompt),
        };
        self.llm.complete(&request).await
    }

    async fn generate_news_digest(
        &self,
        prompt: &str,
        model: ModelChoice,
    ) -> Result<String, Box<dyn Error>> {
        let search = self
            .search
            .as_ref()
            .ok_or("news search is not configured (missing TAVILY_API_KEY)")?;

        let topic = news_query(prompt);
        let results = search
            .search(topic)
            .await
            .map_err(|e| format!("news search failed: {e}"))?;
        info!(topic, hits = results.len(), "Fetched news search results");

        let request = ChatRequest {
            model,
            temperature: self.temperatures.news,
            messages: vec![ChatMessage::user(news_instruction(
                topic,
                &render_results(&results),
            ))],
        };
        self.llm.complete(&request).await
    }

    /// Generate every category serially, one section per category in order.
    #[instrument(level = "info", skip(self, prompt, categories), fields(count = categories.len(), %model))]
    pub async fn generate_all(
        &self,
        prompt: &str,
        categories: &[Category],
        model: ModelChoice,
    ) -> Vec<GeneratedSection> {
        let mut sections = Vec::with_capacity(categories.len());
        for &category in categories {
            match self.generate(prompt, category, model).await {
                Ok(text) => sections.push(GeneratedSection::text(category, text)),
                Err(e) => {
                    error!(%category, error = %e, "Generation failed");
                    sections.push(GeneratedSection::failed(category, e.to_string()));
                }
            }
        }

        let (ok, failed) = section_counts(&sections);
        if failed > 0 {
            warn!(ok, failed, "Some sections failed to generate");
        } else {
            info!(ok, "All sections generated");
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SectionBody;
    use crate::testing::{FakeChat, FakeSearch};

    fn generator(chat: FakeChat, search: Option<FakeSearch>) -> ContentGenerator<FakeChat, FakeSearch> {
        ContentGenerator::new(chat, search, Temperatures::default())
    }

    #[test]
    fn test_category_label_appears_once_per_message() {
        for category in Category::ALL.iter().filter(|c| !c.is_news()) {
            let kind = category.label().to_lowercase();
            let messages = category_messages(*category, "a lighthouse keeper");
            assert_eq!(messages.len(), 2);
            for message in &messages {
                assert_eq!(message.content.matches(&kind).count(), 1, "{}", message.content);
            }
            assert!(messages[1].content.ends_with("a lighthouse keeper"));
        }
    }

    #[test]
    fn test_news_query_defaults_on_blank_prompt() {
        assert_eq!(news_query(""), "current events");
        assert_eq!(news_query("   \n"), "current events");
        assert_eq!(news_query(" fusion power "), "fusion power");
    }

    #[test]
    fn test_news_instruction_interpolates_verbatim() {
        let text = news_instruction("fusion", "[1] Reactor milestone");
        assert!(text.contains("on the topic of fusion."));
        assert!(text.ends_with("SEARCH RESULTS:\n[1] Reactor milestone"));
    }

    #[tokio::test]
    async fn test_creative_category_uses_two_messages() {
        let chat = FakeChat::replying("A story.");
        let generator = generator(chat, None);
        let text = generator
            .generate("cats", Category::PersonalizedStory, ModelChoice::MistralSaba)
            .await
            .unwrap();
        assert_eq!(text, "A story.");

        let requests = generator.llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, ModelChoice::MistralSaba);
        assert_eq!(requests[0].temperature, 0.7);
        assert_eq!(requests[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_news_with_blank_prompt_searches_default_topic() {
        let search = FakeSearch::with_titles(&["Markets rally"]);
        let generator = generator(FakeChat::replying("1. Markets rally"), Some(search));
        generator
            .generate("", Category::NewsDigest, ModelChoice::default())
            .await
            .unwrap();

        assert_eq!(generator.search.as_ref().unwrap().queries(), vec!["current events"]);
        let requests = generator.llm.requests();
        assert_eq!(requests[0].temperature, 0.5);
        assert_eq!(requests[0].messages.len(), 1);
        assert!(requests[0].messages[0].content.contains("[1] Markets rally"));
    }

    #[tokio::test]
    async fn test_search_failure_becomes_failed_section() {
        let generator = generator(FakeChat::replying("unused"), Some(FakeSearch::failing()));
        let sections = generator
            .generate_all("", &[Category::NewsDigest, Category::DailyPuzzle], ModelChoice::default())
            .await;

        assert_eq!(sections.len(), 2);
        match &sections[0].body {
            SectionBody::Failed(reason) => assert!(reason.starts_with("news search failed")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(sections[1], GeneratedSection::text(Category::DailyPuzzle, "unused"));
        // the failed news digest never reached the model
        assert_eq!(generator.llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_news_without_search_client_fails() {
        let generator = generator(FakeChat::replying("unused"), None);
        let err = generator
            .generate("ai", Category::NewsDigest, ModelChoice::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("TAVILY_API_KEY"));
        assert!(generator.llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_generate_all_keeps_selection_order() {
        let generator = generator(FakeChat::replying("ok"), None);
        let picked = [Category::FunFacts, Category::PoemOrHaiku, Category::DailyPuzzle];
        let sections = generator.generate_all("p", &picked, ModelChoice::default()).await;
        let order: Vec<Category> = sections.iter().map(|s| s.category).collect();
        assert_eq!(order, picked.to_vec());
    }
}
