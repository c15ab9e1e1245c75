use crate::domain::entities::observation::{Observation, StockMetadata};
use crate::domain::error::DomainError;
use crate::domain::values::date_range::DateRange;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// What a conditional insert actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No row existed for the key.
    Inserted,
    /// An error row was replaced by a successful observation.
    Repaired,
    /// A row already existed and was left untouched.
    Unchanged,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObservationStats {
    pub total_observations: usize,
    pub valid_observations: usize,
    pub error_observations: usize,
    pub distinct_symbols: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

pub trait ObservationRepository: Send + Sync {
    /// Insert if absent. A successful row is never modified afterwards; an
    /// error row may only be replaced by a successful one.
    fn upsert_observation(&self, obs: &Observation) -> Result<UpsertOutcome, DomainError>;

    /// Last-write-wins on `timestamp`. `None` name/exchange keep stored values.
    fn upsert_metadata(
        &self,
        symbol: &str,
        name: Option<&str>,
        exchange: Option<&str>,
        market_cap: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Valid rows only, ordered by symbol.
    fn observations_for_date(&self, date: NaiveDate) -> Result<Vec<Observation>, DomainError>;

    /// Valid rows only, ordered by date then symbol.
    fn observations_between(&self, range: &DateRange) -> Result<Vec<Observation>, DomainError>;

    /// Any row for the key, error rows included.
    fn get_observation(&self, symbol: &str, date: NaiveDate)
        -> Result<Option<Observation>, DomainError>;

    /// Every row, error rows included, ordered by symbol then date.
    fn all_observations(&self) -> Result<Vec<Observation>, DomainError>;

    fn get_metadata(&self, symbol: &str) -> Result<Option<StockMetadata>, DomainError>;

    /// Distinct dates in range with at least one valid observation.
    fn dates_with_data(&self, range: &DateRange) -> Result<Vec<NaiveDate>, DomainError>;

    fn stats(&self) -> Result<ObservationStats, DomainError>;
}
