use super::{FetchError, FetchOutcome, WebSearch};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const RELATED_TOPICS: usize = 3;
const SEARCH_RESULTS: usize = 3;

/// Web search with a Tavily backend when a key is configured, DuckDuckGo instant
/// answers otherwise, and a static topic blurb when neither has anything usable.
pub struct WebSearcher {
    http: reqwest::Client,
    duckduckgo_url: String,
    tavily: Option<Tavily>,
    timeout: Duration,
}

struct Tavily {
    url: String,
    api_key: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    r#abstract: String,
    #[serde(default)]
    abstract_source: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a plain topic (has `Text`) or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    text: Option<String>,
    #[serde(default)]
    topics: Vec<RelatedTopic>,
}

impl RelatedTopic {
    fn texts(&self) -> Vec<&str> {
        match self.text.as_deref() {
            Some(text) if !text.trim().is_empty() => vec![text],
            _ => self.topics.iter().flat_map(|t| t.texts()).collect(),
        }
    }
}

impl WebSearcher {
    pub fn new(http: reqwest::Client, duckduckgo_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            duckduckgo_url: duckduckgo_url.into().trim_end_matches('/').to_string(),
            tavily: None,
            timeout,
        }
    }

    pub fn with_tavily(mut self, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.tavily = Some(Tavily {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        });
        self
    }

    async fn tavily(&self, tavily: &Tavily, query: &str) -> Result<String, FetchError> {
        let response = self
            .http
            .post(format!("{}/search", tavily.url))
            .json(&TavilyRequest {
                api_key: &tavily.api_key,
                query,
                max_results: SEARCH_RESULTS,
                include_answer: true,
            })
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        let mut text = String::new();
        if let Some(answer) = body.answer.filter(|a| !a.trim().is_empty()) {
            text.push_str(&format!("**Current Information:**\n{}\n\n", answer.trim()));
        }
        let results: Vec<&TavilyResult> = body
            .results
            .iter()
            .filter(|r| !r.content.trim().is_empty())
            .take(SEARCH_RESULTS)
            .collect();
        if !results.is_empty() {
            text.push_str("**Sources:**\n");
            for (i, r) in results.iter().enumerate() {
                text.push_str(&format!("{}. {}: {} ({})\n", i + 1, r.title, r.content.trim(), r.url));
            }
        }

        if text.trim().is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(format!("{}_Searched {}_", text, Utc::now().format("%Y-%m-%d %H:%M UTC")))
    }

    async fn duckduckgo(&self, query: &str) -> Result<String, FetchError> {
        let url = format!("{}/", self.duckduckgo_url);
        debug!("DuckDuckGo: GET {} q={}", url, query);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        // The instant answer API labels JSON as x-javascript, so decode by hand.
        let raw = response.text().await?;
        let answer: InstantAnswer =
            serde_json::from_str(&raw).map_err(|e| FetchError::Decode(e.to_string()))?;

        let mut text = String::new();
        if !answer.r#abstract.trim().is_empty() {
            text.push_str(&format!("**Current Information:**\n{}", answer.r#abstract.trim()));
            if !answer.abstract_source.is_empty() {
                text.push_str(&format!(" (source: {})", answer.abstract_source));
            }
            text.push_str("\n\n");
        }

        let related: Vec<&str> = answer
            .related_topics
            .iter()
            .flat_map(|t| t.texts())
            .take(RELATED_TOPICS)
            .collect();
        if !related.is_empty() {
            text.push_str("**Related Updates:**\n");
            for (i, topic) in related.iter().enumerate() {
                text.push_str(&format!("{}. {}\n", i + 1, topic));
            }
        }

        if text.trim().is_empty() {
            Err(FetchError::Empty)
        } else {
            Ok(text.trim_end().to_string())
        }
    }
}

/// Static context routed by topic, explicitly marked as not live.
pub fn background_blurb(query: &str) -> String {
    let q = query.to_lowercase();
    let words: Vec<&str> = q
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |terms: &[&str]| {
        terms.iter().any(|t| {
            if t.contains(' ') {
                q.contains(t)
            } else {
                words.iter().any(|w| w == t || w.strip_suffix('s') == Some(*t))
            }
        })
    };

    let blurb = if has(&["ai", "artificial intelligence", "chatgpt", "openai"]) {
        "AI continues to advance quickly with new models, regulatory discussions and wide integration across industries."
    } else if has(&["crypto", "bitcoin", "ethereum", "bnb", "binance", "solana"]) {
        "Cryptocurrency markets remain volatile, shaped by regulatory developments and institutional adoption."
    } else if has(&["stock", "market", "trading"]) {
        "Stock markets continue to be driven by economic indicators, corporate earnings and central bank policy."
    } else if has(&["news", "latest", "breaking"]) {
        "Global events keep unfolding across politics, technology and economics."
    } else {
        "This topic is actively evolving and needs current monitoring."
    };

    format!(
        "**Background (not live data, {}):**\n{}\nNo live search results were available. \
         Tell the user the figures may be out of date and suggest checking a current source.",
        Utc::now().format("%Y-%m-%d"),
        blurb
    )
}

#[async_trait]
impl WebSearch for WebSearcher {
    async fn search(&self, query: &str) -> FetchOutcome {
        if let Some(tavily) = &self.tavily {
            match self.tavily(tavily, query).await {
                Ok(text) => {
                    info!("Web search: Tavily returned results");
                    return FetchOutcome::Found(text);
                }
                Err(e) => warn!("Web search: Tavily failed ({}), trying DuckDuckGo", e),
            }
        }

        match self.duckduckgo(query).await {
            Ok(text) => {
                info!("Web search: DuckDuckGo returned results");
                FetchOutcome::Found(text)
            }
            Err(FetchError::Empty) => {
                info!("Web search: nothing usable, using background context");
                FetchOutcome::Found(background_blurb(query))
            }
            Err(e) => {
                warn!("Web search: DuckDuckGo failed: {}", e);
                FetchOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_blurb_routing() {
        assert!(background_blurb("latest openai release").contains("AI continues"));
        assert!(background_blurb("bitcoin outlook").contains("Cryptocurrency"));
        assert!(background_blurb("stock market today").contains("Stock markets"));
        assert!(background_blurb("breaking headlines").contains("Global events"));
        assert!(background_blurb("weather in Oslo").contains("actively evolving"));
        assert!(background_blurb("explain the details").contains("actively evolving"));
        assert!(background_blurb("anything").starts_with("**Background (not live data"));
    }

    #[test]
    fn test_related_topic_groups_flatten() {
        let raw = r#"{
            "Abstract": "",
            "RelatedTopics": [
                {"Text": "First"},
                {"Name": "Group", "Topics": [{"Text": "Nested one"}, {"Text": "Nested two"}]},
                {"Text": "Fourth"}
            ]
        }"#;
        let answer: InstantAnswer = serde_json::from_str(raw).unwrap();
        let texts: Vec<&str> = answer.related_topics.iter().flat_map(|t| t.texts()).collect();
        assert_eq!(texts, vec!["First", "Nested one", "Nested two", "Fourth"]);
    }
}
