use crate::domain::entities::composition::{Composition, CompositionChange};
use crate::domain::entities::observation::{Observation, StockMetadata};
use crate::domain::entities::performance::{IndexSummary, PerformanceRecord};
use crate::domain::error::DomainError;
use crate::domain::ports::index_repository::IndexRepository;
use crate::domain::ports::observation_repository::{ObservationRepository, ObservationStats};
use crate::domain::values::date_range::DateRange;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub observations: ObservationStats,
    pub composition_dates: usize,
    pub first_composition: Option<NaiveDate>,
    pub last_composition: Option<NaiveDate>,
}

/// Read-only access to stored observations and derivations.
pub struct QueryUseCase {
    observations: Arc<dyn ObservationRepository>,
    index: Arc<dyn IndexRepository>,
}

impl QueryUseCase {
    pub fn new(observations: Arc<dyn ObservationRepository>, index: Arc<dyn IndexRepository>) -> Self {
        Self {
            observations,
            index,
        }
    }

    pub fn composition(&self, date: NaiveDate) -> Result<Composition, DomainError> {
        self.index
            .get_composition(date)?
            .ok_or_else(|| DomainError::NotFound(format!("No index composition found for {date}")))
    }

    pub fn performance(&self, range: &DateRange) -> Result<Vec<PerformanceRecord>, DomainError> {
        self.index.performance_between(range)
    }

    pub fn changes(&self, range: &DateRange) -> Result<Vec<CompositionChange>, DomainError> {
        self.index.changes_between(range)
    }

    pub fn summary(&self, date: NaiveDate) -> Result<IndexSummary, DomainError> {
        let composition = self.composition(date)?;
        let perf = self.index.get_performance(date)?;

        let caps: Vec<f64> = composition.members.iter().map(|m| m.market_cap).collect();
        let total: f64 = caps.iter().sum();
        let min = caps.iter().copied().fold(f64::INFINITY, f64::min);
        let max = caps.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(IndexSummary {
            date,
            total_stocks: caps.len(),
            total_market_cap: total,
            average_market_cap: total / caps.len() as f64,
            min_market_cap: min,
            max_market_cap: max,
            daily_return: perf.as_ref().map(|p| p.daily_return),
            cumulative_return: perf.as_ref().map(|p| p.cumulative_return),
            index_value: perf.as_ref().map(|p| p.index_value),
        })
    }

    pub fn observation(&self, symbol: &str, date: NaiveDate) -> Result<Option<Observation>, DomainError> {
        self.observations.get_observation(symbol, date)
    }

    pub fn observations_for_date(&self, date: NaiveDate) -> Result<Vec<Observation>, DomainError> {
        self.observations.observations_for_date(date)
    }

    pub fn all_observations(&self) -> Result<Vec<Observation>, DomainError> {
        self.observations.all_observations()
    }

    pub fn metadata(&self, symbol: &str) -> Result<Option<StockMetadata>, DomainError> {
        self.observations.get_metadata(symbol)
    }

    pub fn stats(&self) -> Result<IndexStats, DomainError> {
        let dates = self.index.composition_dates()?;
        Ok(IndexStats {
            observations: self.observations.stats()?,
            composition_dates: dates.len(),
            first_composition: dates.first().copied(),
            last_composition: dates.last().copied(),
        })
    }
}
