use crate::domain::entities::composition::{Composition, CompositionChange};
use crate::domain::entities::performance::PerformanceRecord;
use crate::domain::error::DomainError;
use crate::domain::values::date_range::DateRange;
use chrono::NaiveDate;

/// Persisted derivations: compositions, turnover and the performance series.
pub trait IndexRepository: Send + Sync {
    /// Replace whatever composition is stored for `composition.date`.
    fn save_composition(&self, composition: &Composition) -> Result<(), DomainError>;

    fn get_composition(&self, date: NaiveDate) -> Result<Option<Composition>, DomainError>;

    /// Every stored composition, ascending by date.
    fn all_compositions(&self) -> Result<Vec<Composition>, DomainError>;

    fn composition_dates(&self) -> Result<Vec<NaiveDate>, DomainError>;

    /// Atomically replace the whole change log.
    fn replace_changes(&self, changes: &[CompositionChange]) -> Result<(), DomainError>;

    fn changes_between(&self, range: &DateRange) -> Result<Vec<CompositionChange>, DomainError>;

    /// Atomically replace the whole performance series.
    fn replace_performance(&self, records: &[PerformanceRecord]) -> Result<(), DomainError>;

    fn performance_between(&self, range: &DateRange)
        -> Result<Vec<PerformanceRecord>, DomainError>;

    fn get_performance(&self, date: NaiveDate) -> Result<Option<PerformanceRecord>, DomainError>;
}
