//! Shared test helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use capindex::application::retry::RetryConfig;
use capindex::config::Config;
use capindex::domain::entities::observation::RawPriceData;
use capindex::domain::error::FetchError;
use capindex::domain::ports::price_source::PriceSource;
use capindex::domain::values::error_kind::ErrorKind;
use capindex::CapIndex;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Script {
    Price {
        close: Option<f64>,
        market_cap: Option<f64>,
    },
    Fail(ErrorKind),
    /// Fail `remaining` more times, then answer with the price.
    Flaky {
        remaining: usize,
        kind: ErrorKind,
        close: f64,
        market_cap: f64,
    },
}

/// Scripted provider. Unscripted pairs answer `missing_data`.
pub struct FakeSource {
    name: String,
    scripts: Mutex<HashMap<(String, NaiveDate), Script>>,
    calls: AtomicUsize,
    calls_by_key: Mutex<HashMap<(String, NaiveDate), usize>>,
}

impl FakeSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scripts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            calls_by_key: Mutex::new(HashMap::new()),
        }
    }

    fn script(self, symbol: &str, date: NaiveDate, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert((symbol.to_string(), date), script);
        self
    }

    pub fn with_price(self, symbol: &str, date: NaiveDate, close: f64, market_cap: f64) -> Self {
        self.script(
            symbol,
            date,
            Script::Price {
                close: Some(close),
                market_cap: Some(market_cap),
            },
        )
    }

    /// A price with no market cap, as returned for funds and indices.
    pub fn with_close_only(self, symbol: &str, date: NaiveDate, close: f64) -> Self {
        self.script(
            symbol,
            date,
            Script::Price {
                close: Some(close),
                market_cap: None,
            },
        )
    }

    pub fn with_error(self, symbol: &str, date: NaiveDate, kind: ErrorKind) -> Self {
        self.script(symbol, date, Script::Fail(kind))
    }

    pub fn with_flaky(
        self,
        symbol: &str,
        date: NaiveDate,
        failures: usize,
        kind: ErrorKind,
        close: f64,
        market_cap: f64,
    ) -> Self {
        self.script(
            symbol,
            date,
            Script::Flaky {
                remaining: failures,
                kind,
                close,
                market_cap,
            },
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, symbol: &str, date: NaiveDate) -> usize {
        self.calls_by_key
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), date))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PriceSource for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, symbol: &str, date: NaiveDate) -> Result<RawPriceData, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = (symbol.to_string(), date);
        *self.calls_by_key.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(&key) else {
            return Err(FetchError::missing_data(format!("{symbol} not covered")));
        };

        let (close, market_cap) = match script {
            Script::Price { close, market_cap } => (*close, *market_cap),
            Script::Fail(kind) => {
                return Err(FetchError::new(*kind, format!("{} scripted failure", self.name)))
            }
            Script::Flaky {
                remaining,
                kind,
                close,
                market_cap,
            } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::new(*kind, "flaky"));
                }
                (Some(*close), Some(*market_cap))
            }
        };

        let mut raw = RawPriceData::new(symbol, date);
        raw.close_price = close;
        raw.market_cap = market_cap;
        raw.name = Some(format!("{symbol} Corp"));
        raw.exchange = Some("NMS".into());
        Ok(raw)
    }
}

pub fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Defaults with no sleeping between retries.
pub fn test_config() -> Config {
    Config {
        retry: RetryConfig::immediate(3),
        symbols: symbols(&["AAPL", "MSFT"]),
        top_n: 3,
        ..Config::default()
    }
}

pub fn setup_with(primary: Arc<FakeSource>, fallback: Arc<FakeSource>) -> CapIndex {
    CapIndex::with_sources(":memory:", primary, fallback, test_config()).unwrap()
}

/// An index over providers that cover nothing.
pub fn setup() -> CapIndex {
    setup_with(
        Arc::new(FakeSource::new("primary")),
        Arc::new(FakeSource::new("fallback")),
    )
}
