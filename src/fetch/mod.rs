//! Live data adapters used for real-time questions.
//!
//! Both adapters hand back a [`FetchOutcome`] and never an error: network,
//! status and decode problems are logged and folded into `Failed`.

pub mod financial;
pub mod format;
pub mod web;

pub use financial::CoinGecko;
pub use web::WebSearcher;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Normalized text ready to be quoted in a prompt.
    Found(String),
    /// Why nothing usable came back.
    Failed(String),
}

impl From<Result<String, FetchError>> for FetchOutcome {
    fn from(result: Result<String, FetchError>) -> Self {
        match result {
            Ok(text) => FetchOutcome::Found(text),
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("no usable result")]
    Empty,
}

/// Price and market snapshot lookups.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn lookup(&self, query: &str) -> FetchOutcome;
}

/// General-purpose search.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> FetchOutcome;
}

/// First explicit `$TICKER` in the text, lowercased. A bare `$` amount such as `$120` is not a ticker.
pub fn explicit_symbol(text: &str) -> Option<String> {
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        let after = &rest[pos + 1..];
        let symbol: String = after
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let letters_only = symbol.chars().all(|c| c.is_ascii_alphabetic());
        if (2..=10).contains(&symbol.len()) && letters_only {
            return Some(symbol.to_lowercase());
        }
        rest = after;
    }
    None
}
