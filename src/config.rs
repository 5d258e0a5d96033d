use crate::intent::KeywordConfig;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::time::Duration;

/// How a document query without a `using <label>` phrase sees the scope's documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlabeledDocuments {
    /// Every document in the scope, labeled or not.
    All,
    /// Nothing; documents are only consulted when a label is given.
    None,
}

impl std::str::FromStr for UnlabeledDocuments {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            other => Err(anyhow::anyhow!(
                "UNLABELED_DOCUMENTS must be 'all' or 'none', got '{}'",
                other
            )),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub owner_id: Option<u64>,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub max_output_tokens: u32,
    pub prediction_max_output_tokens: u32,
    pub temperature: f32,
    pub response_char_limit: usize,
    pub database_url: String,
    pub status_message: String,

    // Scope state
    pub chart_memory_capacity: usize,
    pub dedupe_capacity: usize,
    pub unlabeled_documents: UnlabeledDocuments,
    pub notification_ttl: Duration,
    pub max_upload_bytes: u64,

    // External data
    pub fetch_timeout_secs: u64,
    pub coingecko_url: String,
    pub market_snapshot_size: usize,
    pub duckduckgo_url: String,
    pub tavily_api_key: Option<String>,
    pub tavily_url: String,

    pub keywords: KeywordConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            owner_id: env::var("OWNER_ID").ok().and_then(|id| id.parse().ok()),
            openai_api_key: env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY must be set"))?,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            max_output_tokens: parse_var("MAX_OUTPUT_TOKENS", 1000),
            prediction_max_output_tokens: parse_var("PREDICTION_MAX_OUTPUT_TOKENS", 2000),
            temperature: parse_var("TEMPERATURE", 0.4),
            response_char_limit: parse_var("RESPONSE_CHAR_LIMIT", DISCORD_MESSAGE_LIMIT),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/elder.db".to_string()),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Mention me with a question".to_string()),
            chart_memory_capacity: parse_var("CHART_MEMORY_CAPACITY", 10),
            dedupe_capacity: parse_var("DEDUPE_CAPACITY", 100),
            unlabeled_documents: match env::var("UNLABELED_DOCUMENTS") {
                Ok(raw) => raw.parse()?,
                Err(_) => UnlabeledDocuments::All,
            },
            notification_ttl: match env::var("NOTIFICATION_TTL") {
                Ok(raw) => humantime::parse_duration(&raw)
                    .map_err(|e| anyhow::anyhow!("NOTIFICATION_TTL is not a duration: {}", e))?,
                Err(_) => Duration::from_secs(60 * 60),
            },
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            fetch_timeout_secs: parse_var("FETCH_TIMEOUT_SECS", 10),
            coingecko_url: env::var("COINGECKO_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            market_snapshot_size: parse_var("MARKET_SNAPSHOT_SIZE", 5),
            duckduckgo_url: env::var("DUCKDUCKGO_URL")
                .unwrap_or_else(|_| "https://api.duckduckgo.com".to_string()),
            tavily_api_key: env::var("TAVILY_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            tavily_url: env::var("TAVILY_URL")
                .unwrap_or_else(|_| "https://api.tavily.com".to_string()),
            keywords: Self::load_keywords()?,
        })
    }

    /// Keyword sets for the classifier. `INTENTS_FILE` (default `intents.toml`) may
    /// override any subset; missing keys keep the built-in lists.
    pub fn load_keywords() -> anyhow::Result<KeywordConfig> {
        let path = env::var("INTENTS_FILE").unwrap_or_else(|_| "intents.toml".to_string());
        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str::<KeywordConfig>(&content)
                .map_err(|e| anyhow::anyhow!("{} is not a valid keyword file: {}", path, e)),
            Err(_) => Ok(KeywordConfig::default()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("owner_id", &self.owner_id)
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_base_url", &self.openai_base_url)
            .field("chat_model", &self.chat_model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field(
                "prediction_max_output_tokens",
                &self.prediction_max_output_tokens,
            )
            .field("temperature", &self.temperature)
            .field("response_char_limit", &self.response_char_limit)
            .field("database_url", &self.database_url)
            .field("status_message", &self.status_message)
            .field("chart_memory_capacity", &self.chart_memory_capacity)
            .field("dedupe_capacity", &self.dedupe_capacity)
            .field("unlabeled_documents", &self.unlabeled_documents)
            .field("notification_ttl", &self.notification_ttl)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("coingecko_url", &self.coingecko_url)
            .field("market_snapshot_size", &self.market_snapshot_size)
            .field("duckduckgo_url", &self.duckduckgo_url)
            .field(
                "tavily_api_key",
                &self.tavily_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("tavily_url", &self.tavily_url)
            .finish_non_exhaustive()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
/// Embed description limit is 4096 characters
pub const DISCORD_EMBED_LIMIT: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_logic() {
        // 1. Missing required vars
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("OPENAI_API_KEY");
        assert!(
            Config::build().is_err(),
            "Should fail when required vars are missing"
        );

        // 2. Defaults
        env::set_var("DISCORD_TOKEN", "test_token");
        env::set_var("OPENAI_API_KEY", "sk-secret");
        env::set_var("INTENTS_FILE", "/nonexistent/intents.toml");
        let config = Config::build().unwrap();
        assert_eq!(config.discord_token, "test_token");
        assert_eq!(config.chart_memory_capacity, 10);
        assert_eq!(config.response_char_limit, DISCORD_MESSAGE_LIMIT);
        assert_eq!(config.unlabeled_documents, UnlabeledDocuments::All);
        assert_eq!(config.notification_ttl, Duration::from_secs(3600));

        // 3. Overrides
        env::set_var("UNLABELED_DOCUMENTS", "none");
        env::set_var("NOTIFICATION_TTL", "30m");
        let config = Config::build().unwrap();
        assert_eq!(config.unlabeled_documents, UnlabeledDocuments::None);
        assert_eq!(config.notification_ttl, Duration::from_secs(1800));

        env::set_var("UNLABELED_DOCUMENTS", "some");
        assert!(Config::build().is_err());
        env::remove_var("UNLABELED_DOCUMENTS");

        // 4. Debug redaction
        env::set_var("TAVILY_API_KEY", "tvly-secret");
        let debug_output = format!("{:?}", Config::build().unwrap());
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("sk-secret"));
        assert!(!debug_output.contains("tvly-secret"));
        assert!(debug_output.contains("[REDACTED]"));

        // Cleanup
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("OPENAI_API_KEY");
        env::remove_var("TAVILY_API_KEY");
        env::remove_var("NOTIFICATION_TTL");
        env::remove_var("INTENTS_FILE");
    }
}
