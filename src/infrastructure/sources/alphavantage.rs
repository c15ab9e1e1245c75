use super::rate_limit::RateLimiter;
use super::{http_client, parse_number};
use crate::domain::entities::observation::RawPriceData;
use crate::domain::error::FetchError;
use crate::domain::ports::price_source::PriceSource;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Compact output covers the last 100 trading days; older dates need the
/// full series.
const COMPACT_WINDOW_DAYS: i64 = 140;

/// Fallback provider. Needs an API key; without one every call fails
/// permanently. A fetch is two queries and each waits for its own slot.
pub struct AlphaVantageSource {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl AlphaVantageSource {
    pub fn new(api_key: Option<String>, requests_per_minute: u32) -> Self {
        Self::with_base_url(api_key, requests_per_minute, BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, requests_per_minute: u32, base_url: &str) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.to_string(),
            client: http_client(),
            limiter: RateLimiter::per_minute(requests_per_minute),
        }
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        self.limiter.acquire().await;
        let resp = self
            .client
            .get(&self.base_url)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(
                status,
                format!("Alpha Vantage returned {status}"),
            ));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::other(format!("Malformed Alpha Vantage response: {e}")))?;
        check_body(&body)?;
        Ok(body)
    }
}

fn output_size(date: NaiveDate, today: NaiveDate) -> &'static str {
    if (today - date).num_days() <= COMPACT_WINDOW_DAYS {
        "compact"
    } else {
        "full"
    }
}

/// Alpha Vantage reports errors and throttling with HTTP 200.
fn check_body(body: &Value) -> Result<(), FetchError> {
    if let Some(msg) = body.get("Error Message").and_then(Value::as_str) {
        return Err(FetchError::missing_data(msg.to_string()));
    }
    for key in ["Note", "Information"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            return Err(FetchError::api_limit(msg.to_string()));
        }
    }
    Ok(())
}

fn parse_daily_close(symbol: &str, date: NaiveDate, body: &Value) -> Result<f64, FetchError> {
    let series = body
        .get("Time Series (Daily)")
        .and_then(Value::as_object)
        .ok_or_else(|| FetchError::missing_data(format!("No time series for {symbol}")))?;

    let key = date.format("%Y-%m-%d").to_string();
    series
        .get(&key)
        .and_then(|bar| bar.get("4. close"))
        .and_then(parse_number)
        .ok_or_else(|| FetchError::missing_data(format!("No close for {symbol} on {date}")))
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Overview {
    market_cap: Option<f64>,
    shares_outstanding: Option<f64>,
    name: Option<String>,
    exchange: Option<String>,
}

fn parse_overview(body: &Value) -> Overview {
    let text = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty() && *s != "None")
            .map(str::to_string)
    };
    Overview {
        market_cap: body.get("MarketCapitalization").and_then(parse_number),
        shares_outstanding: body.get("SharesOutstanding").and_then(parse_number),
        name: text("Name"),
        exchange: text("Exchange"),
    }
}

#[async_trait]
impl PriceSource for AlphaVantageSource {
    fn name(&self) -> &str {
        "alphavantage"
    }

    async fn fetch(&self, symbol: &str, date: NaiveDate) -> Result<RawPriceData, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::other("ALPHA_VANTAGE_API_KEY is not set"))?;

        let size = output_size(date, Utc::now().date_naive());
        let daily = self
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", size),
                ("apikey", key),
            ])
            .await?;
        let close = parse_daily_close(symbol, date, &daily)?;

        let overview = parse_overview(
            &self
                .query(&[("function", "OVERVIEW"), ("symbol", symbol), ("apikey", key)])
                .await?,
        );
        let market_cap = match overview.shares_outstanding {
            Some(shares) if shares > 0.0 => Some(close * shares),
            _ => overview.market_cap,
        };

        Ok(RawPriceData {
            symbol: symbol.to_string(),
            date,
            close_price: Some(close),
            market_cap,
            name: overview.name,
            exchange: overview.exchange,
        })
    }
}
