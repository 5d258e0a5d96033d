use crate::config::Config;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// One piece of the user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    ImageUrl(String),
}

/// A single system + user exchange.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: Vec<Part>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: vec![Part::Text(user.into())],
            max_tokens: 1000,
            temperature: 0.4,
        }
    }

    pub fn with_images(mut self, urls: impl IntoIterator<Item = String>) -> Self {
        self.user.extend(urls.into_iter().map(Part::ImageUrl));
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("LLM request failed: {0}")]
    Api(String),
    #[error("LLM returned no content")]
    Empty,
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited(_))
    }
}

/// Whether an error description reads like a provider rate limit.
pub fn looks_rate_limited(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.contains("rate_limit")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
}

impl From<OpenAIError> for LlmError {
    fn from(e: OpenAIError) -> Self {
        let description = format!("{:?}", e);
        if looks_rate_limited(&description) {
            LlmError::RateLimited(e.to_string())
        } else {
            LlmError::Api(e.to_string())
        }
    }
}

#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        Self::with_endpoint(
            &config.openai_base_url,
            &config.openai_api_key,
            &config.chat_model,
        )
    }

    /// Client for an OpenAI-compatible endpoint. A failed request, rate limits
    /// included, is returned on the first attempt.
    pub fn with_endpoint(api_base: &str, api_key: &str, model: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key(api_key);
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry),
            model: model.to_string(),
        }
    }

    fn user_content(parts: Vec<Part>) -> Result<ChatCompletionRequestUserMessageContent, OpenAIError> {
        if let [Part::Text(text)] = parts.as_slice() {
            return Ok(ChatCompletionRequestUserMessageContent::Text(text.clone()));
        }

        let mut content = Vec::with_capacity(parts.len());
        for part in parts {
            content.push(match part {
                Part::Text(text) => ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text(text)
                        .build()?,
                ),
                Part::ImageUrl(url) => ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(ImageUrlArgs::default().url(url).build()?)
                        .build()?,
                ),
            });
        }
        Ok(ChatCompletionRequestUserMessageContent::Array(content))
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let images = request
            .user
            .iter()
            .filter(|p| matches!(p, Part::ImageUrl(_)))
            .count();
        debug!(
            "LLM: {} with {} image(s), max_tokens={}",
            self.model, images, request.max_tokens
        );

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::user_content(request.user)?)
                .build()?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(request.max_tokens)
            .temperature(request.temperature)
            .build()?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            let err = LlmError::from(e);
            warn!("LLM: request failed: {}", err);
            err
        })?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        assert!(looks_rate_limited("ApiError { code: Some(\"rate_limit_exceeded\") }"));
        assert!(looks_rate_limited("HTTP status client error (429 Too Many Requests)"));
        assert!(looks_rate_limited("Rate limit reached for gpt-4o"));
        assert!(!looks_rate_limited("invalid_api_key"));
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::text("sys", "question")
            .with_images(vec!["https://cdn.example/chart.png".to_string()])
            .max_tokens(2000)
            .temperature(0.2);
        assert_eq!(request.user.len(), 2);
        assert_eq!(request.max_tokens, 2000);
        assert!(matches!(&request.user[1], Part::ImageUrl(url) if url.ends_with("chart.png")));
    }

    #[test]
    fn test_user_content_shapes() {
        let single = LlmClient::user_content(vec![Part::Text("hi".to_string())]).unwrap();
        assert!(matches!(single, ChatCompletionRequestUserMessageContent::Text(ref t) if t == "hi"));

        let mixed = LlmClient::user_content(vec![
            Part::Text("look".to_string()),
            Part::ImageUrl("https://cdn.example/a.png".to_string()),
        ])
        .unwrap();
        match mixed {
            ChatCompletionRequestUserMessageContent::Array(parts) => assert_eq!(parts.len(), 2),
            _ => panic!("expected multi-part content"),
        }
    }
}
