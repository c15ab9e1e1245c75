pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

use crate::application::build_index::{BuildIndexUseCase, BuildOutput};
use crate::application::fetch::FetchOrchestrator;
use crate::application::ingest::{IngestRequest, IngestSummary, IngestUseCase};
use crate::application::query::{IndexStats, QueryUseCase};
use crate::application::retry::RetryPolicy;
use crate::config::Config;
use crate::domain::entities::composition::{Composition, CompositionChange};
use crate::domain::entities::observation::{Observation, StockMetadata};
use crate::domain::entities::performance::{IndexSummary, PerformanceRecord};
use crate::domain::error::DomainError;
use crate::domain::ports::index_repository::IndexRepository;
use crate::domain::ports::observation_repository::ObservationRepository;
use crate::domain::ports::price_source::PriceSource;
use crate::domain::values::date_range::DateRange;
use crate::infrastructure::sources::alphavantage::AlphaVantageSource;
use crate::infrastructure::sources::yahoo::YahooSource;
use crate::infrastructure::sqlite::index_repo::SqliteIndexRepo;
use crate::infrastructure::sqlite::migrations::run_migrations;
use crate::infrastructure::sqlite::observation_repo::SqliteObservationRepo;
use crate::infrastructure::sqlite::{open_connection, shared_memory_uri};
use chrono::NaiveDate;
use std::sync::Arc;

pub struct CapIndex {
    config: Config,
    ingest_uc: IngestUseCase,
    build_uc: BuildIndexUseCase,
    query_uc: QueryUseCase,
}

impl CapIndex {
    /// Production wiring: Yahoo primary, Alpha Vantage fallback, each
    /// throttled per HTTP request at its configured rate.
    pub fn new(config: Config) -> Result<Self, DomainError> {
        let primary: Arc<dyn PriceSource> = Arc::new(YahooSource::new(config.yahoo_rpm));
        let fallback: Arc<dyn PriceSource> = Arc::new(AlphaVantageSource::new(
            config.alpha_vantage_api_key.clone(),
            config.alphavantage_rpm,
        ));
        let db_path = config.db_path.clone();
        Self::with_sources(&db_path, primary, fallback, config)
    }

    /// Wire against arbitrary providers. `":memory:"` gives a private
    /// in-memory database shared by this instance's connections.
    pub fn with_sources(
        db_path: &str,
        primary: Arc<dyn PriceSource>,
        fallback: Arc<dyn PriceSource>,
        config: Config,
    ) -> Result<Self, DomainError> {
        let path = if db_path == ":memory:" {
            shared_memory_uri()
        } else {
            db_path.to_string()
        };

        let conn1 = open_connection(&path)?;
        run_migrations(&conn1).map_err(DomainError::Database)?;
        let conn2 = open_connection(&path)?;

        let observations: Arc<dyn ObservationRepository> =
            Arc::new(SqliteObservationRepo::new(conn1));
        let index: Arc<dyn IndexRepository> = Arc::new(SqliteIndexRepo::new(conn2));

        let orchestrator = Arc::new(FetchOrchestrator::new(
            primary,
            fallback,
            RetryPolicy::new(config.retry.clone()),
        ));

        tracing::debug!(db = %path, sources = ?orchestrator.source_names(), "capindex initialized");

        Ok(Self {
            ingest_uc: IngestUseCase::new(
                orchestrator,
                observations.clone(),
                config.workers,
                config.symbols.clone(),
            ),
            build_uc: BuildIndexUseCase::new(observations.clone(), index.clone()),
            query_uc: QueryUseCase::new(observations, index),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch and store every (symbol, date) pair. An empty symbol list means
    /// the configured universe.
    pub async fn ingest(
        &self,
        symbols: Vec<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IngestSummary, DomainError> {
        self.ingest_with(IngestRequest::new(symbols, date_range(start, end)?))
            .await
    }

    pub async fn ingest_with(&self, request: IngestRequest) -> Result<IngestSummary, DomainError> {
        self.ingest_uc.execute(request).await
    }

    /// `top_n` of `None` uses the configured size.
    pub fn build_index(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        top_n: Option<usize>,
    ) -> Result<BuildOutput, DomainError> {
        self.build_uc
            .execute(date_range(start, end)?, top_n.unwrap_or(self.config.top_n))
    }

    pub fn get_composition(&self, date: NaiveDate) -> Result<Composition, DomainError> {
        self.query_uc.composition(date)
    }

    pub fn get_performance(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PerformanceRecord>, DomainError> {
        self.query_uc.performance(&date_range(start, end)?)
    }

    pub fn get_changes(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompositionChange>, DomainError> {
        self.query_uc.changes(&date_range(start, end)?)
    }

    pub fn summary(&self, date: NaiveDate) -> Result<IndexSummary, DomainError> {
        self.query_uc.summary(date)
    }

    pub fn stats(&self) -> Result<IndexStats, DomainError> {
        self.query_uc.stats()
    }

    pub fn observation(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<Observation>, DomainError> {
        self.query_uc.observation(symbol, date)
    }

    pub fn observations_for_date(&self, date: NaiveDate) -> Result<Vec<Observation>, DomainError> {
        self.query_uc.observations_for_date(date)
    }

    pub fn all_observations(&self) -> Result<Vec<Observation>, DomainError> {
        self.query_uc.all_observations()
    }

    pub fn metadata(&self, symbol: &str) -> Result<Option<StockMetadata>, DomainError> {
        self.query_uc.metadata(symbol)
    }
}

fn date_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, DomainError> {
    DateRange::new(start, end).map_err(DomainError::InvalidInput)
}
