//! Batch ingestion over a symbol universe and a date range.
//!
//! Each (symbol, date) pair is fetched and stored independently. Pairs run
//! concurrently up to the worker limit; provider throttling lives in the
//! sources themselves. Nothing a single pair does can abort the batch.

use crate::application::fetch::{FetchOrchestrator, FetchReport};
use crate::domain::entities::observation::Observation;
use crate::domain::error::DomainError;
use crate::domain::ports::observation_repository::{ObservationRepository, UpsertOutcome};
use crate::domain::values::date_range::DateRange;
use crate::domain::values::error_kind::ErrorKind;
use crate::domain::values::symbols::normalize_symbols;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Empty means the configured default universe.
    pub symbols: Vec<String>,
    pub range: DateRange,
    pub weekdays_only: bool,
}

impl IngestRequest {
    pub fn new(symbols: Vec<String>, range: DateRange) -> Self {
        Self {
            symbols,
            range,
            weekdays_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPair {
    pub symbol: String,
    pub date: NaiveDate,
    pub kind: ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorBreakdown {
    pub network: usize,
    pub missing_data: usize,
    pub api_limit: usize,
    pub other: usize,
}

impl ErrorBreakdown {
    pub fn record(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Network => self.network += 1,
            ErrorKind::MissingData => self.missing_data += 1,
            ErrorKind::ApiLimit => self.api_limit += 1,
            ErrorKind::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.network + self.missing_data + self.api_limit + self.other
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub run_id: String,
    pub total_pairs: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub error_breakdown: ErrorBreakdown,
    /// Successful pairs by the source that produced them.
    pub per_source: BTreeMap<String, usize>,
    pub failed_pairs: Vec<FailedPair>,
    /// Rows actually written; replays of covered pairs land in `unchanged`.
    pub inserted: usize,
    pub repaired: usize,
    pub unchanged: usize,
    pub success_rate: f64,
}

impl IngestSummary {
    fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            total_pairs: 0,
            success_count: 0,
            failure_count: 0,
            error_breakdown: ErrorBreakdown::default(),
            per_source: BTreeMap::new(),
            failed_pairs: Vec::new(),
            inserted: 0,
            repaired: 0,
            unchanged: 0,
            success_rate: 0.0,
        }
    }

    fn record(&mut self, outcome: PairOutcome) {
        self.total_pairs += 1;
        match outcome {
            PairOutcome::Stored { observation, upsert } => {
                match upsert {
                    UpsertOutcome::Inserted => self.inserted += 1,
                    UpsertOutcome::Repaired => self.repaired += 1,
                    UpsertOutcome::Unchanged => self.unchanged += 1,
                }
                if observation.is_valid() {
                    self.success_count += 1;
                    *self.per_source.entry(observation.source).or_insert(0) += 1;
                } else {
                    let kind = observation.error_kind.unwrap_or(ErrorKind::Other);
                    let reason = observation.error.unwrap_or_else(|| kind.to_string());
                    self.fail(observation.symbol, observation.date, kind, reason);
                }
            }
            PairOutcome::Failed {
                symbol,
                date,
                reason,
            } => self.fail(symbol, date, ErrorKind::Other, reason),
        }
    }

    fn fail(&mut self, symbol: String, date: NaiveDate, kind: ErrorKind, reason: String) {
        self.failure_count += 1;
        self.error_breakdown.record(kind);
        self.failed_pairs.push(FailedPair {
            symbol,
            date,
            kind,
            reason,
        });
    }

    fn finish(mut self) -> Self {
        self.success_rate = if self.total_pairs > 0 {
            self.success_count as f64 / self.total_pairs as f64 * 100.0
        } else {
            0.0
        };
        self
    }
}

enum PairOutcome {
    Stored {
        observation: Observation,
        upsert: UpsertOutcome,
    },
    /// The pair never reached a stored row (storage fault, task panic).
    Failed {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },
}

pub struct IngestUseCase {
    orchestrator: Arc<FetchOrchestrator>,
    repo: Arc<dyn ObservationRepository>,
    workers: usize,
    default_symbols: Vec<String>,
}

impl IngestUseCase {
    pub fn new(
        orchestrator: Arc<FetchOrchestrator>,
        repo: Arc<dyn ObservationRepository>,
        workers: usize,
        default_symbols: Vec<String>,
    ) -> Self {
        Self {
            orchestrator,
            repo,
            workers: workers.max(1),
            default_symbols,
        }
    }

    pub async fn execute(&self, request: IngestRequest) -> Result<IngestSummary, DomainError> {
        let symbols = if request.symbols.is_empty() {
            normalize_symbols(&self.default_symbols)
        } else {
            normalize_symbols(&request.symbols)
        };
        if symbols.is_empty() {
            return Err(DomainError::InvalidInput("No symbols to ingest".into()));
        }

        let dates = if request.weekdays_only {
            request.range.weekdays()
        } else {
            request.range.days()
        };

        let pairs: Vec<(String, NaiveDate)> = symbols
            .iter()
            .flat_map(|s| dates.iter().map(move |d| (s.clone(), *d)))
            .collect();

        let mut summary = IngestSummary::new();
        tracing::info!(
            run_id = %summary.run_id,
            symbols = symbols.len(),
            dates = dates.len(),
            pairs = pairs.len(),
            workers = self.workers,
            "starting ingestion"
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(pairs.len());

        for (symbol, date) in pairs {
            let orchestrator = Arc::clone(&self.orchestrator);
            let repo = Arc::clone(&self.repo);
            let semaphore = Arc::clone(&semaphore);
            let key = (symbol.clone(), date);

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return PairOutcome::Failed {
                        symbol,
                        date,
                        reason: "worker pool closed".into(),
                    };
                };
                let report = orchestrator.resolve(&symbol, date).await;
                store(repo.as_ref(), report)
            });
            handles.push((key, handle));
        }

        for ((symbol, date), handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(%symbol, %date, error = %e, "ingestion task failed");
                    PairOutcome::Failed {
                        symbol,
                        date,
                        reason: format!("task failed: {e}"),
                    }
                }
            };
            summary.record(outcome);
        }

        let summary = summary.finish();
        tracing::info!(
            run_id = %summary.run_id,
            success = summary.success_count,
            failure = summary.failure_count,
            inserted = summary.inserted,
            unchanged = summary.unchanged,
            success_rate = summary.success_rate,
            "ingestion complete"
        );
        if !summary.failed_pairs.is_empty() {
            tracing::warn!(failed = summary.failed_pairs.len(), "some pairs could not be fetched");
        }
        Ok(summary)
    }
}

fn store(repo: &dyn ObservationRepository, report: FetchReport) -> PairOutcome {
    let obs = report.observation;
    let upsert = match repo.upsert_observation(&obs) {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(symbol = %obs.symbol, date = %obs.date, error = %e, "failed to store observation");
            return PairOutcome::Failed {
                symbol: obs.symbol,
                date: obs.date,
                reason: format!("storage: {e}"),
            };
        }
    };

    // Metadata follows the stored row; a fetch that was discarded leaves it alone.
    let written = matches!(upsert, UpsertOutcome::Inserted | UpsertOutcome::Repaired);
    if written && obs.is_valid() {
        let stamp = obs
            .date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        if let Err(e) = repo.upsert_metadata(
            &obs.symbol,
            report.name.as_deref(),
            report.exchange.as_deref(),
            obs.market_cap,
            stamp,
        ) {
            tracing::warn!(symbol = %obs.symbol, error = %e, "failed to update metadata");
        }
    }

    PairOutcome::Stored {
        observation: obs,
        upsert,
    }
}
