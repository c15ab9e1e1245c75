use super::rate_limit::RateLimiter;
use super::{http_client, parse_number};
use crate::domain::entities::observation::RawPriceData;
use crate::domain::error::FetchError;
use crate::domain::ports::price_source::PriceSource;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Request, Url};
use serde::Deserialize;

const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Primary provider: v8 chart API for the close, v7 quote API for share
/// count, market cap, name and exchange. Each of the two requests takes its
/// own rate-limit slot.
pub struct YahooSource {
    base_url: String,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl YahooSource {
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_base_url(BASE_URL, requests_per_minute)
    }

    pub fn with_base_url(base_url: &str, requests_per_minute: u32) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(),
            limiter: RateLimiter::per_minute(requests_per_minute),
        }
    }

    /// `base_url` plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::other(format!("Bad Yahoo base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::other("Yahoo base URL cannot take a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn chart_request(&self, symbol: &str, date: NaiveDate) -> Result<Request, FetchError> {
        let start = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default();
        let end = start + 86_400;
        self.client
            .get(self.endpoint(&["v8", "finance", "chart", symbol])?)
            .query(&[
                ("period1", start.to_string()),
                ("period2", end.to_string()),
                ("interval", "1d".to_string()),
            ])
            .build()
            .map_err(|e| FetchError::other(format!("Bad Yahoo request: {e}")))
    }

    fn quote_request(&self, symbol: &str) -> Result<Request, FetchError> {
        self.client
            .get(self.endpoint(&["v7", "finance", "quote"])?)
            .query(&[("symbols", symbol)])
            .build()
            .map_err(|e| FetchError::other(format!("Bad Yahoo request: {e}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, request: Request) -> Result<T, FetchError> {
        self.limiter.acquire().await;
        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(
                status,
                format!("Yahoo API returned {status}"),
            ));
        }

        resp.json()
            .await
            .map_err(|e| FetchError::other(format!("Malformed Yahoo response: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBars>,
}

#[derive(Debug, Deserialize)]
struct QuoteBars {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    quote_response: QuoteResult,
}

#[derive(Debug, Deserialize)]
struct QuoteResult {
    #[serde(default)]
    result: Vec<serde_json::Value>,
}

/// Fields taken from the quote endpoint.
#[derive(Debug, Default, Clone, PartialEq)]
struct QuoteInfo {
    market_cap: Option<f64>,
    shares_outstanding: Option<f64>,
    name: Option<String>,
    exchange: Option<String>,
}

/// Close for exactly `date`, or `missing_data` when the bar is absent.
fn parse_chart(symbol: &str, date: NaiveDate, resp: ChartResponse) -> Result<f64, FetchError> {
    let result = match resp.chart.result {
        Some(r) => r,
        None => {
            return Err(match resp.chart.error {
                Some(err) if err.code == "Not Found" => {
                    FetchError::missing_data(format!("Unknown symbol {symbol}"))
                }
                Some(err) => FetchError::other(format!(
                    "Yahoo chart error {}: {}",
                    err.code,
                    err.description.unwrap_or_default()
                )),
                None => FetchError::other("Empty chart result with no error"),
            })
        }
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::other("Chart result array is empty"))?;
    let timestamps = data.timestamp.unwrap_or_default();
    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    timestamps
        .iter()
        .zip(closes)
        .find_map(|(&ts, close)| {
            let bar_date = DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive());
            (bar_date == Some(date)).then_some(close).flatten()
        })
        .ok_or_else(|| FetchError::missing_data(format!("No bar for {symbol} on {date}")))
}

fn parse_quote(symbol: &str, resp: QuoteResponse) -> Result<QuoteInfo, FetchError> {
    let quote = resp
        .quote_response
        .result
        .into_iter()
        .find(|q| {
            q.get("symbol")
                .and_then(|s| s.as_str())
                .is_some_and(|s| s.eq_ignore_ascii_case(symbol))
        })
        .ok_or_else(|| FetchError::missing_data(format!("No quote for {symbol}")))?;

    let text = |key: &str| quote.get(key).and_then(|v| v.as_str()).map(str::to_string);
    Ok(QuoteInfo {
        market_cap: quote.get("marketCap").and_then(parse_number),
        shares_outstanding: quote.get("sharesOutstanding").and_then(parse_number),
        name: text("longName").or_else(|| text("shortName")),
        exchange: text("fullExchangeName").or_else(|| text("exchange")),
    })
}

/// Historical cap from shares when known, else the current reported cap.
fn historical_market_cap(close: f64, quote: &QuoteInfo) -> Option<f64> {
    match quote.shares_outstanding {
        Some(shares) if shares > 0.0 => Some(close * shares),
        _ => quote.market_cap,
    }
}

#[async_trait]
impl PriceSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch(&self, symbol: &str, date: NaiveDate) -> Result<RawPriceData, FetchError> {
        let chart: ChartResponse = self.get_json(self.chart_request(symbol, date)?).await?;
        let close = parse_chart(symbol, date, chart)?;

        let quote: QuoteResponse = self.get_json(self.quote_request(symbol)?).await?;
        let info = parse_quote(symbol, quote)?;

        Ok(RawPriceData {
            symbol: symbol.to_string(),
            date,
            close_price: Some(close),
            market_cap: historical_market_cap(close, &info),
            name: info.name,
            exchange: info.exchange,
        })
    }
}
