use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Returns are fractions (0.02 = 2%), not percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    pub daily_return: f64,
    pub cumulative_return: f64,
    pub index_value: f64,
}

/// Snapshot of the index on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub date: NaiveDate,
    pub total_stocks: usize,
    pub total_market_cap: f64,
    pub average_market_cap: f64,
    pub min_market_cap: f64,
    pub max_market_cap: f64,
    pub daily_return: Option<f64>,
    pub cumulative_return: Option<f64>,
    pub index_value: Option<f64>,
}
