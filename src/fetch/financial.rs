use super::format::{or_na, signed_percent, usd, usd_whole};
use super::{explicit_symbol, FetchError, FetchOutcome, MarketData};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// CoinGecko market data. An explicit `$TICKER` gets a targeted lookup;
/// anything else, or a failed lookup, gets the top-N snapshot by market cap.
pub struct CoinGecko {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    snapshot_size: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct CoinDetail {
    name: String,
    symbol: String,
    market_data: Option<MarketDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrencyMap {
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketDetail {
    #[serde(default)]
    current_price: CurrencyMap,
    #[serde(default)]
    market_cap: CurrencyMap,
    #[serde(default)]
    total_volume: CurrencyMap,
    price_change_percentage_24h: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    name: String,
    symbol: String,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
    price_change_percentage_24h: Option<f64>,
}

impl CoinGecko {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        snapshot_size: usize,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            snapshot_size: snapshot_size.max(1),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("CoinGecko: GET {}", url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Resolves a ticker to a CoinGecko id, preferring an exact symbol match.
    async fn resolve_id(&self, symbol: &str) -> Result<String, FetchError> {
        let search: SearchResponse = self.get_json("/search", &[("query", symbol)]).await?;
        search
            .coins
            .iter()
            .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
            .or_else(|| search.coins.first())
            .map(|c| c.id.clone())
            .ok_or(FetchError::Empty)
    }

    pub async fn asset(&self, symbol: &str) -> Result<String, FetchError> {
        let id = self.resolve_id(symbol).await?;
        let detail: CoinDetail = self
            .get_json(
                &format!("/coins/{}", id),
                &[
                    ("localization", "false"),
                    ("tickers", "false"),
                    ("community_data", "false"),
                    ("developer_data", "false"),
                ],
            )
            .await?;

        let market = detail.market_data.ok_or(FetchError::Empty)?;
        if market.current_price.usd.is_none() {
            return Err(FetchError::Empty);
        }

        Ok(format!(
            "**{} ({}) live market data**\n\
             - Price: {}\n\
             - Market cap: {}\n\
             - 24h change: {}\n\
             - 24h volume: {}\n\
             _Source: CoinGecko, fetched {}_",
            detail.name,
            detail.symbol.to_uppercase(),
            or_na(market.current_price.usd, usd),
            or_na(market.market_cap.usd, usd_whole),
            or_na(market.price_change_percentage_24h, signed_percent),
            or_na(market.total_volume.usd, usd_whole),
            Utc::now().format("%Y-%m-%d %H:%M UTC"),
        ))
    }

    pub async fn snapshot(&self) -> Result<String, FetchError> {
        let per_page = self.snapshot_size.to_string();
        let rows: Vec<MarketRow> = self
            .get_json(
                "/coins/markets",
                &[
                    ("vs_currency", "usd"),
                    ("order", "market_cap_desc"),
                    ("per_page", per_page.as_str()),
                    ("page", "1"),
                    ("sparkline", "false"),
                ],
            )
            .await?;

        if rows.is_empty() {
            return Err(FetchError::Empty);
        }

        let mut text = format!("**Top {} cryptocurrencies by market cap**\n", rows.len());
        for (i, row) in rows.iter().take(self.snapshot_size).enumerate() {
            text.push_str(&format!(
                "{}. {} ({}): {} ({} 24h), market cap {}, volume {}\n",
                i + 1,
                row.name,
                row.symbol.to_uppercase(),
                or_na(row.current_price, usd),
                or_na(row.price_change_percentage_24h, signed_percent),
                or_na(row.market_cap, usd_whole),
                or_na(row.total_volume, usd_whole),
            ));
        }
        text.push_str(&format!(
            "_Source: CoinGecko, fetched {}_",
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ));
        Ok(text)
    }
}

#[async_trait]
impl MarketData for CoinGecko {
    async fn lookup(&self, query: &str) -> FetchOutcome {
        if let Some(symbol) = explicit_symbol(query) {
            match self.asset(&symbol).await {
                Ok(text) => {
                    info!("CoinGecko: resolved ${}", symbol.to_uppercase());
                    return FetchOutcome::Found(text);
                }
                Err(e) => warn!(
                    "CoinGecko: lookup for ${} failed ({}), using market snapshot",
                    symbol.to_uppercase(),
                    e
                ),
            }
        }

        let outcome: FetchOutcome = self.snapshot().await.into();
        if let FetchOutcome::Failed(reason) = &outcome {
            warn!("CoinGecko: market snapshot failed: {}", reason);
        }
        outcome
    }
}
