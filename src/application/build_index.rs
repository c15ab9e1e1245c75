use crate::domain::entities::composition::Composition;
use crate::domain::error::DomainError;
use crate::domain::index::builder::IndexBuilder;
use crate::domain::index::changes::ChangeDetector;
use crate::domain::index::performance::PerformanceCalculator;
use crate::domain::ports::index_repository::IndexRepository;
use crate::domain::ports::observation_repository::ObservationRepository;
use crate::domain::values::date_range::DateRange;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub top_n: usize,
    pub dates_processed: usize,
    pub compositions_built: usize,
    /// Dates with no valid observation at all.
    pub empty_dates: Vec<NaiveDate>,
    /// Changes dated inside the requested range.
    pub changes_detected: usize,
    /// Length of the full replayed series.
    pub performance_records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutput {
    pub report: BuildReport,
    pub compositions: Vec<Composition>,
}

pub struct BuildIndexUseCase {
    observations: Arc<dyn ObservationRepository>,
    index: Arc<dyn IndexRepository>,
}

impl BuildIndexUseCase {
    pub fn new(observations: Arc<dyn ObservationRepository>, index: Arc<dyn IndexRepository>) -> Self {
        Self {
            observations,
            index,
        }
    }

    /// Build and persist a composition for every date in `range`, then
    /// recompute turnover and performance over the whole stored history.
    pub fn execute(&self, range: DateRange, top_n: usize) -> Result<BuildOutput, DomainError> {
        if top_n == 0 {
            return Err(DomainError::InvalidInput("top_n must be at least 1".into()));
        }

        let mut compositions = Vec::new();
        let mut empty_dates = Vec::new();
        let mut built = 0;
        let with_data: HashSet<NaiveDate> =
            self.observations.dates_with_data(&range)?.into_iter().collect();

        for date in range.days() {
            let composition = if with_data.contains(&date) {
                let observations = self.observations.observations_for_date(date)?;
                IndexBuilder::build(date, &observations, top_n)
            } else {
                Composition::empty(date)
            };

            if composition.is_empty() {
                tracing::debug!(%date, "no valid observations, empty composition");
                empty_dates.push(date);
            } else {
                if composition.len() < top_n {
                    tracing::warn!(%date, members = composition.len(), top_n, "fewer candidates than requested");
                }
                self.index.save_composition(&composition)?;
                built += 1;
                tracing::info!(%date, members = composition.len(), "built composition");
            }
            compositions.push(composition);
        }

        let (changes, records) = self.refresh_derived(&range)?;

        let report = BuildReport {
            start_date: range.start,
            end_date: range.end,
            top_n,
            dates_processed: compositions.len(),
            compositions_built: built,
            empty_dates,
            changes_detected: changes,
            performance_records: records,
        };
        tracing::info!(
            built = report.compositions_built,
            empty = report.empty_dates.len(),
            changes = report.changes_detected,
            "index build complete"
        );

        Ok(BuildOutput {
            report,
            compositions,
        })
    }

    /// Replay changes and performance from the first stored composition.
    /// Returns (changes inside `range`, total performance records).
    fn refresh_derived(&self, range: &DateRange) -> Result<(usize, usize), DomainError> {
        let history = self.index.all_compositions()?;

        let changes = ChangeDetector::diff_series(&history);
        self.index.replace_changes(&changes)?;
        let in_range = changes.iter().filter(|c| range.contains(c.date)).count();

        let records = match (history.first(), history.last()) {
            (Some(first), Some(last)) => {
                let span = DateRange::new(first.date, last.date).map_err(DomainError::InvalidInput)?;
                let observations = self.observations.observations_between(&span)?;
                PerformanceCalculator::compute(&history, &observations)
            }
            _ => Vec::new(),
        };
        self.index.replace_performance(&records)?;

        Ok((in_range, records.len()))
    }
}
