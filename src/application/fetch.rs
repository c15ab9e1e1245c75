//! Per-(symbol, date) provider fallback.

use crate::application::retry::RetryPolicy;
use crate::domain::entities::observation::{Observation, RawPriceData};
use crate::domain::error::{FetchError, RetryError};
use crate::domain::ports::price_source::PriceSource;
use chrono::NaiveDate;
use std::sync::Arc;

/// Outcome of one orchestrated fetch. Profile fields come from whichever
/// provider produced the usable value.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub observation: Observation,
    pub name: Option<String>,
    pub exchange: Option<String>,
}

/// Tries each source in order (each through the retry policy) and stops at
/// the first usable response. Never returns an error: a pair that every
/// source failed on becomes an error observation.
pub struct FetchOrchestrator {
    sources: Vec<Arc<dyn PriceSource>>,
    retry: RetryPolicy,
}

impl FetchOrchestrator {
    pub fn new(primary: Arc<dyn PriceSource>, fallback: Arc<dyn PriceSource>, retry: RetryPolicy) -> Self {
        Self::with_sources(vec![primary, fallback], retry)
    }

    pub fn with_sources(sources: Vec<Arc<dyn PriceSource>>, retry: RetryPolicy) -> Self {
        Self { sources, retry }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub async fn fetch(&self, symbol: &str, date: NaiveDate) -> Observation {
        self.resolve(symbol, date).await.observation
    }

    pub async fn resolve(&self, symbol: &str, date: NaiveDate) -> FetchReport {
        let mut last: Option<(&str, RetryError)> = None;

        for source in &self.sources {
            let label = format!("{}:{symbol}:{date}", source.name());
            let src = source.as_ref();
            let outcome = self
                .retry
                .execute(&label, move || src.fetch(symbol, date))
                .await;

            let err = match outcome {
                Ok(mut raw) if raw.is_usable() => {
                    tracing::debug!(source = source.name(), %symbol, %date, "usable response");
                    // Key the row by what was asked for, not what the provider echoed.
                    raw.symbol = symbol.to_string();
                    raw.date = date;
                    return Self::success(raw, source.name());
                }
                Ok(raw) => {
                    let field = raw.missing_field().unwrap_or("value");
                    RetryError {
                        attempts: 1,
                        last: FetchError::missing_data(format!(
                            "{} returned no {field} for {symbol} on {date}",
                            source.name()
                        )),
                    }
                }
                Err(e) => e,
            };

            tracing::warn!(source = source.name(), %symbol, %date, error = %err, "source failed, falling back");
            last = Some((source.name(), err));
        }

        let (source_name, err) = last.unwrap_or_else(|| {
            (
                "none",
                RetryError {
                    attempts: 0,
                    last: FetchError::other("no price sources configured"),
                },
            )
        });
        tracing::warn!(%symbol, %date, kind = %err.kind(), "all sources failed");

        FetchReport {
            observation: Observation::failure(symbol, date, source_name, &err),
            name: None,
            exchange: None,
        }
    }

    fn success(raw: RawPriceData, source: &str) -> FetchReport {
        FetchReport {
            observation: Observation::success(&raw, source),
            name: raw.name,
            exchange: raw.exchange,
        }
    }
}
