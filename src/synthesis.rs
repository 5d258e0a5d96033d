//! Turns a question plus resolved context into the final answer text.

use crate::config::Config;
use crate::intent::Intent;
use crate::llm::{Completion, CompletionRequest, LlmError};
use crate::models::{ChartAnalysis, Document};
use crate::replies;
use crate::resolver::Context;
use crate::system_prompt::{datetime_context, PERSONA};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

/// Upper bound on document text sent with one question. Newest documents come first.
const DOCUMENT_CONTEXT_CHARS: usize = 24_000;
const TRUNCATION_MARKER: char = '…';
const CLOSING_LINE_TOKENS: u32 = 80;

static CLOSING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)my price prediction is \$\s?[\d,]+(?:\.\d+)?\s*[kmb]?\s*",
        r"(?:-|–|to)\s*\$?\s?[\d,]+(?:\.\d+)?\s*[kmb]?\s+by\s+[^\n]+"
    ))
    .expect("closing line pattern is valid")
});

static DOLLAR_FIGURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)")
        .expect("dollar figure pattern is valid")
});

static BARE_FIGURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\b(%?)")
        .expect("bare figure pattern is valid")
});

static HORIZON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(end of (?:20\d{2}|the (?:week|month|quarter|year))|",
        r"(?:next|this) (?:week|month|quarter|year)|in \d+ (?:days?|weeks?|months?|years?)|",
        r"tomorrow|20\d{2})\b"
    ))
    .expect("horizon pattern is valid")
});

#[derive(Debug, Clone, Copy)]
pub struct SynthesisSettings {
    pub max_tokens: u32,
    pub prediction_max_tokens: u32,
    pub temperature: f32,
    /// Hard ceiling on reply length, in characters.
    pub char_limit: usize,
}

impl SynthesisSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.max_output_tokens,
            prediction_max_tokens: config.prediction_max_output_tokens,
            temperature: config.temperature,
            char_limit: config.response_char_limit,
        }
    }
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            prediction_max_tokens: 2000,
            temperature: 0.4,
            char_limit: crate::config::DISCORD_MESSAGE_LIMIT,
        }
    }
}

pub struct Synthesizer {
    llm: Arc<dyn Completion>,
    settings: SynthesisSettings,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn Completion>, settings: SynthesisSettings) -> Self {
        Self { llm, settings }
    }

    /// Answer text, never an error. Model failures become an apology.
    pub async fn synthesize(
        &self,
        question: &str,
        intent: Intent,
        context: &Context,
        history: Option<&str>,
    ) -> String {
        match self.try_synthesize(question, intent, context, history).await {
            Ok(text) => text,
            Err(e) => failure_message(&e).to_string(),
        }
    }

    pub async fn try_synthesize(
        &self,
        question: &str,
        intent: Intent,
        context: &Context,
        history: Option<&str>,
    ) -> Result<String, LlmError> {
        let predicting = intent == Intent::Prediction;
        let mut request = self.build_request(question, predicting, context);
        if let Some(update) = history {
            request.system.push_str(&format!(
                "\n\nRecent update this user received from us:\n{}\n\
                 If the question refers to it, explain it plainly.",
                update
            ));
        }

        let raw = self.llm.complete(request).await?;
        let text = if predicting {
            let line = self.closing_line(&raw, question, context).await;
            finish_prediction(&raw, &line, self.settings.char_limit)
        } else {
            truncate_to_budget(raw.trim(), self.settings.char_limit)
        };

        info!(
            "Synthesizer: {} answer from {} ({} chars)",
            intent,
            context.summary(),
            text.chars().count()
        );
        Ok(text)
    }

    fn build_request(&self, question: &str, predicting: bool, context: &Context) -> CompletionRequest {
        let s = &self.settings;
        let now = datetime_context();

        let request = match context {
            Context::Documents(docs) => CompletionRequest::text(
                format!(
                    "{}\n{}\n\nAnswer using the documents below. Quote relevant excerpts and name \
                     the file they come from. If the documents do not cover the question, say so \
                     and then answer from general knowledge.\n\n{}",
                    PERSONA,
                    now,
                    document_block(docs)
                ),
                question,
            ),
            Context::WebSearch(found) | Context::Financial(found) => CompletionRequest::text(
                format!(
                    "{}\n{}\n\nCRITICAL INSTRUCTIONS:\n\
                     - Use the current information below to answer.\n\
                     - Do NOT say you lack access to real-time data; the data is provided.\n\
                     - Quote actual numbers, prices and percentages exactly as given.\n\
                     - Use clear sections and bullet points.\n\
                     - If the information is marked as background or unavailable, say the figures may be out of date.\n\n\
                     CURRENT INFORMATION:\n{}",
                    PERSONA, now, found
                ),
                format!("Please provide current information about: {}", question),
            ),
            Context::ChartAnalyses(charts) if predicting => CompletionRequest::text(
                prediction_system(&now),
                format!(
                    "Previously uploaded chart analyses, oldest first:\n\n{}\n\nUser question: {}",
                    chart_block(charts),
                    question
                ),
            ),
            Context::ChartAnalyses(charts) => CompletionRequest::text(
                format!("{}\n{}", PERSONA, now),
                format!("Chart analyses:\n\n{}\n\nQuestion: {}", chart_block(charts), question),
            ),
            Context::Visual(images) if predicting => CompletionRequest::text(
                prediction_system(&now),
                format!("Analyze the attached chart(s) and answer: {}", question),
            )
            .with_images(images.iter().map(|i| i.url.clone())),
            Context::Visual(images) => {
                let ask = if question.trim().is_empty() {
                    "Describe this image in detail. If it is a price chart, note the asset, \
                     timeframe, trend, key support and resistance levels, and visible patterns."
                        .to_string()
                } else {
                    format!("Look at the attached image(s) and answer this question: {}", question)
                };
                CompletionRequest::text(format!("{}\n{}", PERSONA, now), ask)
                    .with_images(images.iter().map(|i| i.url.clone()))
            }
            Context::Empty if predicting => CompletionRequest::text(prediction_system(&now), question),
            Context::Empty => CompletionRequest::text(format!("{}\n{}", PERSONA, now), question),
        };

        let max_tokens = if predicting {
            s.prediction_max_tokens
        } else {
            s.max_tokens
        };
        request.max_tokens(max_tokens).temperature(s.temperature)
    }

    /// The fixed closing line for a prediction: taken from the answer, asked
    /// for once more, or derived from dollar figures in the material.
    async fn closing_line(&self, answer: &str, question: &str, context: &Context) -> String {
        if let Some(found) = CLOSING_LINE.find(answer) {
            return found.as_str().trim().to_string();
        }

        let follow_up = CompletionRequest::text(
            "Reply with exactly one line in this form and nothing else: \
             My price prediction is $LOW-HIGH by TIMEFRAME",
            format!("Question: {}\n\nAnalysis:\n{}", question, answer),
        )
        .max_tokens(CLOSING_LINE_TOKENS)
        .temperature(0.0);

        match self.llm.complete(follow_up).await {
            Ok(reply) => {
                if let Some(found) = CLOSING_LINE.find(&reply) {
                    return found.as_str().trim().to_string();
                }
                warn!("Synthesizer: follow-up did not produce a closing line");
            }
            Err(e) => warn!("Synthesizer: closing line follow-up failed: {}", e),
        }

        derive_closing_line(answer, question, context)
    }
}

fn prediction_system(now: &str) -> String {
    format!(
        "You are an expert financial analyst reading price charts.\n{}\n\n\
         Give a concrete forecast:\n\
         - Summarize what the chart shows: trend, support and resistance, patterns.\n\
         - Lay out bullish, base and bearish scenarios with price levels.\n\
         - State the key levels to watch.\n\
         - You MUST end with exactly this line, filling in numbers and a timeframe:\n\
         My price prediction is $LOW-HIGH by TIMEFRAME\n\
         This is analysis, not financial advice.",
        now
    )
}

fn document_block(docs: &[Document]) -> String {
    let mut block = String::from("Documents (newest first):\n");
    let mut budget = DOCUMENT_CONTEXT_CHARS;
    for (i, doc) in docs.iter().enumerate() {
        if budget == 0 {
            break;
        }
        let content: String = doc.content.chars().take(budget).collect();
        budget = budget.saturating_sub(content.chars().count());
        let label = doc.label.as_deref().map(|l| format!(" [{}]", l)).unwrap_or_default();
        block.push_str(&format!(
            "\n--- Document {}: {}{} ---\n{}\n",
            i + 1,
            doc.filename,
            label,
            content
        ));
    }
    block
}

fn chart_block(charts: &[ChartAnalysis]) -> String {
    charts
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "Chart {} ({}, uploaded {}):\n{}",
                i + 1,
                c.filename,
                c.timestamp.format("%Y-%m-%d %H:%M UTC"),
                c.analysis
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn derive_closing_line(answer: &str, question: &str, context: &Context) -> String {
    let mut material = answer.to_string();
    if let Context::ChartAnalyses(charts) = context {
        for chart in charts {
            material.push('\n');
            material.push_str(&chart.analysis);
        }
    }

    let mut figures = dollar_figures(&material);
    if figures.is_empty() {
        figures = bare_figures(&material);
    }

    let timeframe = HORIZON
        .find(question)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "the next 30 days".to_string());

    if figures.is_empty() {
        warn!("Synthesizer: no price figures to derive a prediction range from");
        return format!(
            "My price prediction is $0-0 by {} (the chart shows no readable price levels)",
            timeframe
        );
    }

    let low = figures.iter().cloned().fold(f64::INFINITY, f64::min);
    let high = figures.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    format!(
        "My price prediction is ${}-{} by {}",
        plain_figure(low),
        plain_figure(high),
        timeframe
    )
}

fn parse_figure(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok().filter(|v| *v > 0.0)
}

fn dollar_figures(material: &str) -> Vec<f64> {
    DOLLAR_FIGURE
        .captures_iter(material)
        .filter_map(|c| c.get(1))
        .filter_map(|m| parse_figure(m.as_str()))
        .collect()
}

/// Unmarked numbers read as price levels. Percentages and calendar years are skipped.
fn bare_figures(material: &str) -> Vec<f64> {
    BARE_FIGURE
        .captures_iter(material)
        .filter(|c| c.get(2).map_or(true, |pct| pct.as_str().is_empty()))
        .filter_map(|c| c.get(1))
        .filter(|m| {
            let raw = m.as_str();
            !(raw.len() == 4 && matches!(raw.parse::<u32>(), Ok(1900..=2100)))
        })
        .filter_map(|m| parse_figure(m.as_str()))
        .collect()
}

fn plain_figure(value: f64) -> String {
    let decimals = if value >= 100.0 { 0 } else if value >= 1.0 { 2 } else { 4 };
    crate::fetch::format::group_thousands(value, decimals)
}

/// Prediction body trimmed to leave room for the closing line, which always comes last.
fn finish_prediction(raw: &str, line: &str, budget: usize) -> String {
    let body = match CLOSING_LINE.find(raw) {
        Some(m) => format!("{}{}", &raw[..m.start()], &raw[m.end()..]),
        None => raw.to_string(),
    };
    let body = body.trim();
    let line_chars = line.chars().count();
    if line_chars + 2 >= budget {
        return truncate_to_budget(line, budget);
    }
    let body = truncate_to_budget(body, budget - line_chars - 2);
    if body.is_empty() {
        line.to_string()
    } else {
        format!("{}\n\n{}", body, line)
    }
}

/// Shortens `text` to at most `budget` characters.
///
/// Prefers the last sentence end in the back half of the budget, then the last
/// word break in the final 30%, then a hard cut. Word and hard cuts end in `…`.
pub fn truncate_to_budget(text: &str, budget: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= budget {
        return text.to_string();
    }
    if budget == 0 {
        return String::new();
    }

    let window = &chars[..budget];
    let sentence_end = (0..budget).rev().find(|&i| {
        matches!(window[i], '.' | '!' | '?') && chars[i + 1].is_whitespace()
    });
    if let Some(i) = sentence_end {
        if (i + 1) * 2 >= budget {
            return window[..=i].iter().collect();
        }
    }

    let word_break = (0..budget).rev().find(|&i| chars[i].is_whitespace());
    if let Some(i) = word_break {
        if i * 10 >= budget * 7 {
            let kept: String = window[..i].iter().collect();
            return format!("{}{}", kept.trim_end(), TRUNCATION_MARKER);
        }
    }

    let kept: String = window[..budget - 1].iter().collect();
    format!("{}{}", kept, TRUNCATION_MARKER)
}

/// User-facing text for a failed completion.
pub fn failure_message(error: &LlmError) -> &'static str {
    if error.is_rate_limited() {
        replies::RATE_LIMITED
    } else {
        replies::LLM_FAILED
    }
}
