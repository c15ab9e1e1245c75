pub mod index_repo;
pub mod migrations;
pub mod observation_repo;

use crate::domain::error::DomainError;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::time::Duration;

/// Open a connection with WAL and a busy timeout. `":memory:"` callers
/// should pass a shared-cache URI so several connections see one database.
pub fn open_connection(path: &str) -> Result<Connection, DomainError> {
    let conn = Connection::open(path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| DomainError::Database(format!("Busy timeout error: {e}")))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
    Ok(conn)
}

/// In-memory database name that several connections can share.
pub fn shared_memory_uri() -> String {
    format!("file:capindex-{}?mode=memory&cache=shared", uuid::Uuid::new_v4())
}

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_sql(idx: usize, s: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
