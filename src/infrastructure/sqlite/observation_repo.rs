use super::{date_from_sql, date_to_sql};
use crate::domain::entities::observation::{Observation, StockMetadata};
use crate::domain::error::DomainError;
use crate::domain::ports::observation_repository::*;
use crate::domain::values::date_range::DateRange;
use crate::domain::values::error_kind::ErrorKind;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

const SELECT_COLS: &str = "symbol, date, close_price, market_cap, source, error_kind, error";

/// Valid means the row holds both values and no error.
const VALID: &str = "error_kind IS NULL AND close_price IS NOT NULL AND market_cap IS NOT NULL";

pub struct SqliteObservationRepo {
    conn: Mutex<Connection>,
}

impl SqliteObservationRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn row_to_observation(row: &rusqlite::Row) -> Result<Observation, rusqlite::Error> {
        let date_str: String = row.get(1)?;
        let kind_str: Option<String> = row.get(5)?;

        Ok(Observation {
            symbol: row.get(0)?,
            date: date_from_sql(1, &date_str)?,
            close_price: row.get(2)?,
            market_cap: row.get(3)?,
            source: row.get(4)?,
            error_kind: kind_str.map(|s| {
                s.parse().unwrap_or_else(|_| {
                    tracing::warn!(kind = %s, "unknown error kind in observation, treating as other");
                    ErrorKind::Other
                })
            }),
            error: row.get(6)?,
        })
    }

    fn query_observations(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::types::ToSql],
    ) -> Result<Vec<Observation>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_observation)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(format!("Failed to read observation: {e}")))?;
        Ok(rows)
    }
}

impl ObservationRepository for SqliteObservationRepo {
    fn upsert_observation(&self, obs: &Observation) -> Result<UpsertOutcome, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let date = date_to_sql(obs.date);

        // The primary key decides; no read-then-write.
        let inserted = conn.execute(
            "INSERT INTO daily_observations (symbol, date, close_price, market_cap, source, error_kind, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(symbol, date) DO NOTHING",
            params![
                obs.symbol,
                date,
                obs.close_price,
                obs.market_cap,
                obs.source,
                obs.error_kind.map(|k| k.to_string()),
                obs.error,
                now,
            ],
        ).map_err(|e| DomainError::Database(format!("Failed to insert observation: {e}")))?;

        if inserted > 0 {
            return Ok(UpsertOutcome::Inserted);
        }
        if !obs.is_valid() {
            return Ok(UpsertOutcome::Unchanged);
        }

        let repaired = conn.execute(
            "UPDATE daily_observations
             SET close_price = ?3, market_cap = ?4, source = ?5, error_kind = NULL, error = NULL, updated_at = ?6
             WHERE symbol = ?1 AND date = ?2 AND error_kind IS NOT NULL",
            params![obs.symbol, date, obs.close_price, obs.market_cap, obs.source, now],
        ).map_err(|e| DomainError::Database(format!("Failed to repair observation: {e}")))?;

        Ok(if repaired > 0 {
            UpsertOutcome::Repaired
        } else {
            UpsertOutcome::Unchanged
        })
    }

    fn upsert_metadata(
        &self,
        symbol: &str,
        name: Option<&str>,
        exchange: Option<&str>,
        market_cap: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO stock_metadata (symbol, name, exchange, latest_market_cap, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(symbol) DO UPDATE SET
                name = COALESCE(excluded.name, stock_metadata.name),
                exchange = COALESCE(excluded.exchange, stock_metadata.exchange),
                latest_market_cap = COALESCE(excluded.latest_market_cap, stock_metadata.latest_market_cap),
                last_updated = excluded.last_updated
             WHERE excluded.last_updated >= stock_metadata.last_updated",
            params![symbol, name, exchange, market_cap, timestamp.to_rfc3339()],
        ).map_err(|e| DomainError::Database(format!("Failed to upsert metadata: {e}")))?;
        Ok(())
    }

    fn observations_for_date(&self, date: NaiveDate) -> Result<Vec<Observation>, DomainError> {
        let sql = format!(
            "SELECT {SELECT_COLS} FROM daily_observations WHERE date = ?1 AND {VALID} ORDER BY symbol"
        );
        self.query_observations(&sql, &[&date_to_sql(date)])
    }

    fn observations_between(&self, range: &DateRange) -> Result<Vec<Observation>, DomainError> {
        let sql = format!(
            "SELECT {SELECT_COLS} FROM daily_observations
             WHERE date >= ?1 AND date <= ?2 AND {VALID}
             ORDER BY date, symbol"
        );
        self.query_observations(&sql, &[&date_to_sql(range.start), &date_to_sql(range.end)])
    }

    fn get_observation(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<Observation>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM daily_observations WHERE symbol = ?1 AND date = ?2"),
            params![symbol, date_to_sql(date)],
            Self::row_to_observation,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn all_observations(&self) -> Result<Vec<Observation>, DomainError> {
        let sql = format!("SELECT {SELECT_COLS} FROM daily_observations ORDER BY symbol, date");
        self.query_observations(&sql, &[])
    }

    fn get_metadata(&self, symbol: &str) -> Result<Option<StockMetadata>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.query_row(
            "SELECT symbol, name, exchange, latest_market_cap, last_updated FROM stock_metadata WHERE symbol = ?1",
            params![symbol],
            |row| {
                let updated_str: String = row.get(4)?;
                Ok(StockMetadata {
                    symbol: row.get(0)?,
                    name: row.get(1)?,
                    exchange: row.get(2)?,
                    latest_market_cap: row.get(3)?,
                    last_updated: DateTime::parse_from_rfc3339(&updated_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            },
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn dates_with_data(&self, range: &DateRange) -> Result<Vec<NaiveDate>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT DISTINCT date FROM daily_observations
                 WHERE date >= ?1 AND date <= ?2 AND {VALID} ORDER BY date"
            ))
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let dates = stmt
            .query_map(params![date_to_sql(range.start), date_to_sql(range.end)], |row| {
                let s: String = row.get(0)?;
                date_from_sql(0, &s)
            })
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(dates)
    }

    fn stats(&self) -> Result<ObservationStats, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let (total, valid, symbols, first, last): (i64, i64, i64, Option<String>, Option<String>) = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*),
                            COALESCE(SUM(CASE WHEN {VALID} THEN 1 ELSE 0 END), 0),
                            COUNT(DISTINCT symbol),
                            MIN(date),
                            MAX(date)
                     FROM daily_observations"
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(ObservationStats {
            total_observations: total as usize,
            valid_observations: valid as usize,
            error_observations: (total - valid) as usize,
            distinct_symbols: symbols as usize,
            first_date: first.and_then(|s| s.parse().ok()),
            last_date: last.and_then(|s| s.parse().ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite::migrations::run_migrations;

    fn repo() -> SqliteObservationRepo {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        SqliteObservationRepo::new(conn)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn ok_obs(close: f64, source: &str) -> Observation {
        Observation {
            symbol: "AAPL".into(),
            date: day(),
            close_price: Some(close),
            market_cap: Some(close * 1.0e10),
            source: source.into(),
            error_kind: None,
            error: None,
        }
    }

    fn err_obs() -> Observation {
        Observation {
            symbol: "AAPL".into(),
            date: day(),
            close_price: None,
            market_cap: None,
            source: "alphavantage".into(),
            error_kind: Some(ErrorKind::Network),
            error: Some("timeout".into()),
        }
    }

    #[test]
    fn test_success_never_overwritten() {
        let r = repo();
        assert_eq!(r.upsert_observation(&ok_obs(190.0, "yahoo")).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(r.upsert_observation(&err_obs()).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(
            r.upsert_observation(&ok_obs(999.0, "alphavantage")).unwrap(),
            UpsertOutcome::Unchanged
        );

        let stored = r.get_observation("AAPL", day()).unwrap().unwrap();
        assert_eq!(stored.close_price, Some(190.0));
        assert_eq!(stored.source, "yahoo");
    }

    #[test]
    fn test_error_row_repaired_by_success() {
        let r = repo();
        assert_eq!(r.upsert_observation(&err_obs()).unwrap(), UpsertOutcome::Inserted);
        assert!(r.observations_for_date(day()).unwrap().is_empty());

        assert_eq!(r.upsert_observation(&err_obs()).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(r.upsert_observation(&ok_obs(190.0, "yahoo")).unwrap(), UpsertOutcome::Repaired);

        let valid = r.observations_for_date(day()).unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].error_kind, None);
        assert_eq!(valid[0].error, None);
    }

    #[test]
    fn test_metadata_last_write_wins() {
        let r = repo();
        let t1 = "2024-06-03T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let t0 = "2024-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();

        r.upsert_metadata("AAPL", Some("Apple Inc."), Some("NMS"), Some(3.0e12), t1)
            .unwrap();
        // Older timestamp is ignored.
        r.upsert_metadata("AAPL", None, None, Some(1.0), t0).unwrap();
        let m = r.get_metadata("AAPL").unwrap().unwrap();
        assert_eq!(m.latest_market_cap, Some(3.0e12));

        // Newer timestamp wins but keeps the known name.
        let t2 = "2024-06-04T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        r.upsert_metadata("AAPL", None, None, Some(3.1e12), t2).unwrap();
        let m = r.get_metadata("AAPL").unwrap().unwrap();
        assert_eq!(m.latest_market_cap, Some(3.1e12));
        assert_eq!(m.name.as_deref(), Some("Apple Inc."));
        assert_eq!(m.last_updated, t2);
    }

    #[test]
    fn test_dates_with_data_ignores_error_rows() {
        let r = repo();
        r.upsert_observation(&ok_obs(190.0, "yahoo")).unwrap();
        let mut failed = err_obs();
        failed.date = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        r.upsert_observation(&failed).unwrap();
        let mut later = ok_obs(191.0, "yahoo");
        later.date = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        r.upsert_observation(&later).unwrap();

        let range = DateRange::new(day(), NaiveDate::from_ymd_opt(2024, 6, 5).unwrap()).unwrap();
        assert_eq!(r.dates_with_data(&range).unwrap(), vec![day()]);
    }

    #[test]
    fn test_stats_counts() {
        let r = repo();
        r.upsert_observation(&ok_obs(1.0, "yahoo")).unwrap();
        let mut other = err_obs();
        other.symbol = "MSFT".into();
        r.upsert_observation(&other).unwrap();

        let s = r.stats().unwrap();
        assert_eq!(s.total_observations, 2);
        assert_eq!(s.valid_observations, 1);
        assert_eq!(s.error_observations, 1);
        assert_eq!(s.distinct_symbols, 2);
        assert_eq!(s.first_date, Some(day()));
    }
}
