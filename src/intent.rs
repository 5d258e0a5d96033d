//! Keyword-driven intent classification.
//!
//! The classifier is an ordered list of rules. Each rule pairs a predicate over
//! the cleaned question with an effect: either it decides the intent (first
//! decision wins) or it suppresses a later intent. The definitional-question
//! rule uses the latter so that "what is a bull flag on the BTC chart" is
//! treated as a concept question rather than a forecast request.

use regex::Regex;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// Response strategy chosen for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Nothing left after stripping mentions and control phrases.
    Greeting,
    /// Asks the bot to draw or generate an image. Always refused.
    ImageGeneration,
    /// Asks for a forecast from a chart.
    Prediction,
    /// Needs live market or news data.
    RealTimeInfo,
    /// Answerable from documents stored for the scope.
    DocumentQuery,
    /// Plain conversation.
    Chat,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::ImageGeneration => "image_generation",
            Intent::Prediction => "prediction",
            Intent::RealTimeInfo => "real_time_info",
            Intent::DocumentQuery => "document_query",
            Intent::Chat => "chat",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tunable keyword sets. Any field left out of `intents.toml` keeps its default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub image_generation: Vec<String>,
    pub general_question: Vec<String>,
    pub prediction: Vec<String>,
    pub real_time: Vec<String>,
    /// Regex for an explicit reference to a chart or diagram.
    pub chart_pattern: String,
    /// Regex for a price, currency amount or asset name.
    pub asset_pattern: String,
    /// Regex for a future date or time horizon.
    pub horizon_pattern: String,
    /// Regex for an explicit ticker such as `$SOL`.
    pub symbol_pattern: String,
}

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            image_generation: phrases(&[
                "generate image", "create image", "make image", "draw image",
                "generate an image", "create an image", "make an image",
                "generate a", "create a", "make a", "draw a", "draw me",
                "image of", "picture of", "photo of",
                "dalle", "dall-e", "dall e", "midjourney",
                "create chart", "make diagram", "draw chart", "create graph",
                "make illustration",
            ]),
            general_question: phrases(&[
                "what is", "what are", "what does", "what's a", "what means",
                "explain", "define", "definition", "describe", "tell me about",
                "how does", "how do", "how to", "how can", "how should",
                "what pattern", "what indicator",
                "hit rate", "success rate", "accuracy", "reliability",
            ]),
            prediction: phrases(&[
                "predict", "prediction", "forecast", "future price", "price target",
                "where will", "what will", "where do you think", "lands by", "reach by",
                "will reach", "price will be", "going to be", "projection",
                "which is better", "what's better", "compare", "comparison",
            ]),
            real_time: phrases(&[
                "latest", "current", "currently", "recent", "today", "now", "right now",
                "breaking", "news", "what's happening", "what is happening",
                "update", "live", "real-time", "real time", "this week", "this month",
                "price", "stock price", "market cap", "market", "trading", "volume",
                "crypto", "cryptocurrency", "bitcoin", "btc", "ethereum", "eth",
                "solana", "bnb", "binance", "defi", "nft", "blockchain",
                "stocks", "economy", "weather",
            ]),
            chart_pattern: r"(?i)\b(chart|graph|diagram|pattern|trend|technical|candles?)s?\b"
                .to_string(),
            asset_pattern: concat!(
                r"(?i)\$\s?\d|\d\s?\$|\$[a-z]{2,10}\b|",
                r"\b(price|sol|solana|bitcoin|btc|ethereum|eth|hype|bnb|xrp|doge)\b"
            )
            .to_string(),
            horizon_pattern: concat!(
                r"(?i)\b(20\d{2}|end of|by end|future|tomorrow|",
                r"next (day|week|month|quarter|year)|this (week|month|quarter|year)|",
                r"in \d+ (days?|weeks?|months?|years?))\b"
            )
            .to_string(),
            symbol_pattern: r"\$([A-Za-z]{2,10})\b".to_string(),
        }
    }
}

/// A case-insensitive any-of phrase matcher with word boundaries on alphanumeric ends.
#[derive(Debug, Clone)]
pub struct PhraseSet {
    regex: Option<Regex>,
}

impl PhraseSet {
    pub fn new(phrases: &[String]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .map(|p| {
                let starts_word = p.chars().next().is_some_and(char::is_alphanumeric);
                let ends_word = p.chars().last().is_some_and(char::is_alphanumeric);
                format!(
                    "{}{}{}",
                    if starts_word { r"\b" } else { "" },
                    regex::escape(&p),
                    if ends_word { r"(?:s|es)?\b" } else { "" }
                )
            })
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { regex: None });
        }

        let regex = Regex::new(&format!("(?i)(?:{})", alternatives.join("|")))?;
        Ok(Self { regex: Some(regex) })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Phrases(PhraseSet),
    Pattern(Regex),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Predicate::Phrases(set) => set.is_match(text),
            Predicate::Pattern(regex) => regex.is_match(text),
            Predicate::All(parts) => parts.iter().all(|p| p.matches(text)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(text)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Decide(Intent),
    Suppress(Intent),
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub effect: Effect,
    pub predicate: Predicate,
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<Rule>,
    symbol: Regex,
    asset: Regex,
}

impl IntentClassifier {
    pub fn new(config: &KeywordConfig) -> Result<Self, regex::Error> {
        let chart = Regex::new(&config.chart_pattern)?;
        let asset = Regex::new(&config.asset_pattern)?;
        let horizon = Regex::new(&config.horizon_pattern)?;
        let symbol = Regex::new(&config.symbol_pattern)?;

        let rules = vec![
            Rule {
                name: "image_generation",
                effect: Effect::Decide(Intent::ImageGeneration),
                predicate: Predicate::Phrases(PhraseSet::new(&config.image_generation)?),
            },
            Rule {
                name: "general_question",
                effect: Effect::Suppress(Intent::Prediction),
                predicate: Predicate::Phrases(PhraseSet::new(&config.general_question)?),
            },
            Rule {
                name: "prediction",
                effect: Effect::Decide(Intent::Prediction),
                predicate: Predicate::Any(vec![
                    Predicate::Phrases(PhraseSet::new(&config.prediction)?),
                    Predicate::All(vec![
                        Predicate::Pattern(chart),
                        Predicate::Any(vec![
                            Predicate::Pattern(asset.clone()),
                            Predicate::Pattern(horizon),
                        ]),
                    ]),
                ]),
            },
            Rule {
                name: "real_time",
                effect: Effect::Decide(Intent::RealTimeInfo),
                predicate: Predicate::Any(vec![
                    Predicate::Phrases(PhraseSet::new(&config.real_time)?),
                    Predicate::Pattern(symbol.clone()),
                ]),
            },
        ];

        Ok(Self {
            rules,
            symbol,
            asset,
        })
    }

    /// Classifies a cleaned question. Never fails: anything unmatched is `Chat`.
    pub fn classify(&self, text: &str, has_attachments: bool) -> Intent {
        let text = text.trim();
        if text.is_empty() {
            return if has_attachments {
                Intent::Chat
            } else {
                Intent::Greeting
            };
        }

        let mut suppressed: Vec<Intent> = Vec::new();
        for rule in &self.rules {
            match rule.effect {
                Effect::Decide(intent) => {
                    if !suppressed.contains(&intent) && rule.predicate.matches(text) {
                        debug!("Intent rule '{}' matched -> {}", rule.name, intent);
                        return intent;
                    }
                }
                Effect::Suppress(intent) => {
                    if rule.predicate.matches(text) {
                        debug!("Intent rule '{}' suppresses {}", rule.name, intent);
                        suppressed.push(intent);
                    }
                }
            }
        }

        Intent::Chat
    }

    /// Like [`classify`](Self::classify), but falls back to `DocumentQuery` when the
    /// scope has documents visible to this question.
    pub fn classify_in_scope(
        &self,
        text: &str,
        has_attachments: bool,
        documents_available: bool,
    ) -> Intent {
        match self.classify(text, has_attachments) {
            Intent::Chat if documents_available => Intent::DocumentQuery,
            other => other,
        }
    }

    /// Whether a real-time question is about prices or assets rather than news in general.
    pub fn is_financial(&self, text: &str) -> bool {
        self.symbol.is_match(text)
            || self.asset.is_match(text)
            || ["market cap", "crypto", "trading", "stock", "fdv", "volume"]
                .iter()
                .any(|k| text.to_lowercase().contains(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(&KeywordConfig::default()).unwrap()
    }

    #[test]
    fn image_generation_wins_over_everything() {
        let c = classifier();
        for text in [
            "create a prediction chart image",
            "generate image of bitcoin going to the moon by 2026",
            "can you draw a picture of the latest ETH price",
            "use dall-e to forecast SOL",
        ] {
            assert_eq!(c.classify(text, false), Intent::ImageGeneration, "{}", text);
        }
    }

    #[test]
    fn definitional_cues_never_predict() {
        let c = classifier();
        for text in [
            "what is a double bottom pattern",
            "what is the hit rate of the head and shoulders pattern on BTC charts in 2025",
            "explain how to forecast with a trend chart for SOL by end of 2026",
            "how does the ETH chart pattern predict price",
        ] {
            assert_ne!(c.classify(text, false), Intent::Prediction, "{}", text);
        }
    }

    #[test]
    fn forecasting_language_predicts() {
        let c = classifier();
        assert_eq!(
            c.classify("predict the price of SOL by end of 2026", false),
            Intent::Prediction
        );
        assert_eq!(
            c.classify("which is better, the first or second setup?", false),
            Intent::Prediction
        );
        assert_eq!(c.classify("where will it land next month", false), Intent::Prediction);
    }

    #[test]
    fn chart_reference_needs_price_or_horizon() {
        let c = classifier();
        assert_eq!(
            c.classify("looking at this chart, btc by next year?", false),
            Intent::Prediction
        );
        assert_eq!(
            c.classify("nice chart trend", false),
            Intent::Chat,
            "chart reference alone is not a forecast"
        );
        assert_eq!(
            c.classify("bitcoin price in 2026", false),
            Intent::RealTimeInfo,
            "price and year without a chart reference is not a forecast"
        );
    }

    #[test]
    fn recency_cues_are_real_time() {
        let c = classifier();
        assert_eq!(c.classify("what's the latest on AI regulation", false), Intent::RealTimeInfo);
        assert_eq!(c.classify("how much is $XPL", false), Intent::RealTimeInfo);
        assert_eq!(c.classify("current news about nvidia", false), Intent::RealTimeInfo);
    }

    #[test]
    fn word_boundaries_avoid_false_hits() {
        let c = classifier();
        // "know" contains "now", "ethical" contains "eth"
        assert_eq!(c.classify("do you know any ethical frameworks", false), Intent::Chat);
    }

    #[test]
    fn empty_question_is_greeting_unless_attachments() {
        let c = classifier();
        assert_eq!(c.classify("   ", false), Intent::Greeting);
        assert_eq!(c.classify("", true), Intent::Chat);
    }

    #[test]
    fn documents_turn_chat_into_document_query() {
        let c = classifier();
        assert_eq!(
            c.classify_in_scope("what is a double bottom pattern", false, true),
            Intent::DocumentQuery
        );
        assert_eq!(
            c.classify_in_scope("what is a double bottom pattern", false, false),
            Intent::Chat
        );
        assert_eq!(
            c.classify_in_scope("latest bitcoin news", false, true),
            Intent::RealTimeInfo
        );
    }

    #[test]
    fn keyword_overrides_from_toml() {
        let config: KeywordConfig = toml::from_str(
            r#"
            real_time = ["gm"]
            "#,
        )
        .unwrap();
        assert!(config.prediction.contains(&"predict".to_string()));
        let c = IntentClassifier::new(&config).unwrap();
        assert_eq!(c.classify("gm frens", false), Intent::RealTimeInfo);
        assert_eq!(c.classify("latest news", false), Intent::Chat);
    }

    #[test]
    fn financial_queries() {
        let c = classifier();
        assert!(c.is_financial("how is $XPL doing"));
        assert!(c.is_financial("bitcoin price today"));
        assert!(!c.is_financial("latest AI news"));
    }
}
