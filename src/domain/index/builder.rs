//! Equal-weighted top-N selection.
//!
//! Candidates are the valid observations for a single date. Ordering is
//! market cap descending with ties broken by symbol ascending, so the same
//! input always produces the same ranks regardless of input order.

use crate::domain::entities::composition::{Composition, Constituent};
use crate::domain::entities::observation::Observation;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashSet;

pub struct IndexBuilder;

impl IndexBuilder {
    /// Build the composition for `date` from that date's observations.
    ///
    /// Observations for other dates, error rows and rows without a finite
    /// positive market cap are ignored. Fewer than one candidate yields an
    /// empty composition rather than an error.
    pub fn build(date: NaiveDate, observations: &[Observation], top_n: usize) -> Composition {
        let mut candidates: Vec<(&str, f64)> = observations
            .iter()
            .filter(|o| o.date == date && o.is_valid())
            .filter_map(|o| match o.market_cap {
                Some(cap) if cap.is_finite() && cap > 0.0 => Some((o.symbol.as_str(), cap)),
                _ => None,
            })
            .collect();

        candidates.sort_by(|a, b| rank_order(a, b));
        let mut seen = HashSet::new();
        candidates.retain(|(symbol, _)| seen.insert(*symbol));
        candidates.truncate(top_n);

        if candidates.is_empty() {
            return Composition::empty(date);
        }

        let weight = 1.0 / candidates.len() as f64;
        let members = candidates
            .into_iter()
            .enumerate()
            .map(|(i, (symbol, market_cap))| Constituent {
                symbol: symbol.to_string(),
                rank: i as u32 + 1,
                market_cap,
                weight,
            })
            .collect();

        Composition { date, members }
    }
}

fn rank_order(a: &(&str, f64), b: &(&str, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}
