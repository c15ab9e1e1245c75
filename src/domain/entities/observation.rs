use crate::domain::error::RetryError;
use crate::domain::values::error_kind::ErrorKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What a provider returned for one symbol on one date. Either value may be
/// absent: non-equity instruments often have a price but no market cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPriceData {
    pub symbol: String,
    pub date: NaiveDate,
    pub close_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub name: Option<String>,
    pub exchange: Option<String>,
}

impl RawPriceData {
    pub fn new(symbol: &str, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            close_price: None,
            market_cap: None,
            name: None,
            exchange: None,
        }
    }

    /// Both a positive close and a positive market cap are present.
    pub fn is_usable(&self) -> bool {
        matches!(self.close_price, Some(p) if p.is_finite() && p > 0.0)
            && matches!(self.market_cap, Some(c) if c.is_finite() && c > 0.0)
    }

    /// Name the field that made this response insufficient, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if !matches!(self.close_price, Some(p) if p.is_finite() && p > 0.0) {
            Some("close_price")
        } else if !matches!(self.market_cap, Some(c) if c.is_finite() && c > 0.0) {
            Some("market_cap")
        } else {
            None
        }
    }
}

/// One stored row per (symbol, date). A successful row has both prices and
/// no error; a terminal failure has an error and no prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub symbol: String,
    pub date: NaiveDate,
    pub close_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub source: String,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
}

impl Observation {
    pub fn success(raw: &RawPriceData, source: &str) -> Self {
        Self {
            symbol: raw.symbol.clone(),
            date: raw.date,
            close_price: raw.close_price,
            market_cap: raw.market_cap,
            source: source.to_string(),
            error_kind: None,
            error: None,
        }
    }

    pub fn failure(symbol: &str, date: NaiveDate, source: &str, err: &RetryError) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            close_price: None,
            market_cap: None,
            source: source.to_string(),
            error_kind: Some(err.kind()),
            error: Some(err.to_string()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error_kind.is_none() && self.close_price.is_some() && self.market_cap.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMetadata {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub latest_market_cap: Option<f64>,
    pub last_updated: DateTime<Utc>,
}
