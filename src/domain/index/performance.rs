//! Chained equal-weight performance series.
//!
//! The value on any date depends on every daily return before it, so the
//! series is always produced by replaying forward from the first
//! composition, which anchors the index at base 100.

use crate::domain::entities::composition::Composition;
use crate::domain::entities::observation::Observation;
use crate::domain::entities::performance::PerformanceRecord;
use chrono::NaiveDate;
use std::collections::HashMap;

pub const INDEX_BASE: f64 = 100.0;

/// Close prices keyed by (date, symbol).
pub struct PriceTable<'a> {
    closes: HashMap<(NaiveDate, &'a str), f64>,
}

impl<'a> PriceTable<'a> {
    pub fn from_observations(observations: &'a [Observation]) -> Self {
        let closes = observations
            .iter()
            .filter(|o| o.error_kind.is_none())
            .filter_map(|o| match o.close_price {
                Some(p) if p.is_finite() && p > 0.0 => Some(((o.date, o.symbol.as_str()), p)),
                _ => None,
            })
            .collect();
        Self { closes }
    }

    pub fn close(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        self.closes.get(&(date, symbol)).copied()
    }
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Full series for an ascending run of compositions.
    pub fn compute(compositions: &[Composition], observations: &[Observation]) -> Vec<PerformanceRecord> {
        Self::chain(&Self::daily_returns(compositions, observations))
    }

    /// `(date, return)` per composition; the first date's return is 0.
    pub fn daily_returns(
        compositions: &[Composition],
        observations: &[Observation],
    ) -> Vec<(NaiveDate, f64)> {
        let prices = PriceTable::from_observations(observations);
        let mut out = Vec::with_capacity(compositions.len());
        let mut prev: Option<&Composition> = None;
        for curr in compositions {
            let r = prev.map_or(0.0, |p| Self::daily_return(p, curr, &prices));
            out.push((curr.date, r));
            prev = Some(curr);
        }
        out
    }

    /// Mean simple return over yesterday's members that are still in the
    /// index today and have a close on both days. Entrants, leavers and
    /// price holes are skipped; no usable symbol at all gives 0.
    pub fn daily_return(prev: &Composition, curr: &Composition, prices: &PriceTable) -> f64 {
        let returns: Vec<f64> = prev
            .members
            .iter()
            .filter(|m| curr.contains(&m.symbol))
            .filter_map(|m| {
                let p0 = prices.close(prev.date, &m.symbol)?;
                let p1 = prices.close(curr.date, &m.symbol)?;
                Some(p1 / p0 - 1.0)
            })
            .collect();

        if returns.is_empty() {
            return 0.0;
        }
        returns.iter().sum::<f64>() / returns.len() as f64
    }

    /// Chain a plain list of (date, daily_return). The first entry is the
    /// base date; its return is taken as 0.
    pub fn chain(daily_returns: &[(NaiveDate, f64)]) -> Vec<PerformanceRecord> {
        let Some(((first_date, _), rest)) = daily_returns.split_first() else {
            return Vec::new();
        };
        let mut last = PerformanceRecord {
            date: *first_date,
            daily_return: 0.0,
            cumulative_return: 0.0,
            index_value: INDEX_BASE,
        };
        let mut records = vec![last.clone()];
        for (date, r) in rest {
            last = Self::step(&last, *date, *r);
            records.push(last.clone());
        }
        records
    }

    fn step(prev: &PerformanceRecord, date: NaiveDate, daily_return: f64) -> PerformanceRecord {
        PerformanceRecord {
            date,
            daily_return,
            cumulative_return: (1.0 + prev.cumulative_return) * (1.0 + daily_return) - 1.0,
            index_value: prev.index_value * (1.0 + daily_return),
        }
    }
}
