use super::{date_from_sql, date_to_sql};
use crate::domain::entities::composition::{Composition, CompositionChange, Constituent};
use crate::domain::entities::performance::PerformanceRecord;
use crate::domain::error::DomainError;
use crate::domain::ports::index_repository::IndexRepository;
use crate::domain::values::change_action::ChangeAction;
use crate::domain::values::date_range::DateRange;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

pub struct SqliteIndexRepo {
    conn: Mutex<Connection>,
}

impl SqliteIndexRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn row_to_member(row: &rusqlite::Row) -> Result<(NaiveDate, Constituent), rusqlite::Error> {
        let date_str: String = row.get(0)?;
        Ok((
            date_from_sql(0, &date_str)?,
            Constituent {
                symbol: row.get(1)?,
                rank: row.get(2)?,
                market_cap: row.get(3)?,
                weight: row.get(4)?,
            },
        ))
    }

    fn row_to_change(row: &rusqlite::Row) -> Result<CompositionChange, rusqlite::Error> {
        let date_str: String = row.get(0)?;
        let action_str: String = row.get(2)?;
        let action: ChangeAction = action_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        Ok(CompositionChange {
            date: date_from_sql(0, &date_str)?,
            symbol: row.get(1)?,
            action,
            previous_rank: row.get(3)?,
            new_rank: row.get(4)?,
            market_cap: row.get(5)?,
        })
    }

    fn row_to_performance(row: &rusqlite::Row) -> Result<PerformanceRecord, rusqlite::Error> {
        let date_str: String = row.get(0)?;
        Ok(PerformanceRecord {
            date: date_from_sql(0, &date_str)?,
            daily_return: row.get(1)?,
            cumulative_return: row.get(2)?,
            index_value: row.get(3)?,
        })
    }
}

/// Fold rank-ordered member rows into one composition per date.
fn group_by_date(rows: Vec<(NaiveDate, Constituent)>) -> Vec<Composition> {
    let mut out: Vec<Composition> = Vec::new();
    for (date, member) in rows {
        match out.last_mut() {
            Some(last) if last.date == date => last.members.push(member),
            _ => out.push(Composition {
                date,
                members: vec![member],
            }),
        }
    }
    out
}

impl IndexRepository for SqliteIndexRepo {
    fn save_composition(&self, composition: &Composition) -> Result<(), DomainError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let tx = conn.transaction()?;
        let date = date_to_sql(composition.date);
        tx.execute("DELETE FROM index_compositions WHERE date = ?1", params![date])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO index_compositions (date, symbol, rank, market_cap, weight)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for m in &composition.members {
                stmt.execute(params![date, m.symbol, m.rank, m.market_cap, m.weight])?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::Database(format!("Failed to save composition: {e}")))
    }

    fn get_composition(&self, date: NaiveDate) -> Result<Option<Composition>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT date, symbol, rank, market_cap, weight FROM index_compositions
             WHERE date = ?1 ORDER BY rank",
        )?;
        let rows = stmt
            .query_map(params![date_to_sql(date)], Self::row_to_member)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(group_by_date(rows).into_iter().next())
    }

    fn all_compositions(&self) -> Result<Vec<Composition>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT date, symbol, rank, market_cap, weight FROM index_compositions
             ORDER BY date, rank",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_member)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(group_by_date(rows))
    }

    fn composition_dates(&self) -> Result<Vec<NaiveDate>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT date FROM index_compositions ORDER BY date")?;
        let dates = stmt
            .query_map([], |row| {
                let s: String = row.get(0)?;
                date_from_sql(0, &s)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dates)
    }

    fn replace_changes(&self, changes: &[CompositionChange]) -> Result<(), DomainError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM composition_changes", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO composition_changes (date, symbol, action, previous_rank, new_rank, market_cap)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for c in changes {
                stmt.execute(params![
                    date_to_sql(c.date),
                    c.symbol,
                    c.action.to_string(),
                    c.previous_rank,
                    c.new_rank,
                    c.market_cap,
                ])?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::Database(format!("Failed to save changes: {e}")))
    }

    fn changes_between(&self, range: &DateRange) -> Result<Vec<CompositionChange>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT date, symbol, action, previous_rank, new_rank, market_cap
             FROM composition_changes
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date, id",
        )?;
        let changes = stmt
            .query_map(
                params![date_to_sql(range.start), date_to_sql(range.end)],
                Self::row_to_change,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(changes)
    }

    fn replace_performance(&self, records: &[PerformanceRecord]) -> Result<(), DomainError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM index_performance", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO index_performance (date, daily_return, cumulative_return, index_value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in records {
                stmt.execute(params![
                    date_to_sql(r.date),
                    r.daily_return,
                    r.cumulative_return,
                    r.index_value,
                ])?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::Database(format!("Failed to save performance: {e}")))
    }

    fn performance_between(
        &self,
        range: &DateRange,
    ) -> Result<Vec<PerformanceRecord>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT date, daily_return, cumulative_return, index_value
             FROM index_performance
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date",
        )?;
        let records = stmt
            .query_map(
                params![date_to_sql(range.start), date_to_sql(range.end)],
                Self::row_to_performance,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn get_performance(&self, date: NaiveDate) -> Result<Option<PerformanceRecord>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.query_row(
            "SELECT date, daily_return, cumulative_return, index_value
             FROM index_performance WHERE date = ?1",
            params![date_to_sql(date)],
            Self::row_to_performance,
        )
        .optional()
        .map_err(DomainError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite::migrations::run_migrations;

    fn repo() -> SqliteIndexRepo {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        SqliteIndexRepo::new(conn)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn comp(day: u32, symbols: &[&str]) -> Composition {
        let n = symbols.len() as f64;
        Composition {
            date: d(day),
            members: symbols
                .iter()
                .enumerate()
                .map(|(i, s)| Constituent {
                    symbol: s.to_string(),
                    rank: i as u32 + 1,
                    market_cap: 1.0e12 - i as f64,
                    weight: 1.0 / n,
                })
                .collect(),
        }
    }

    #[test]
    fn test_save_composition_replaces_date() {
        let r = repo();
        r.save_composition(&comp(3, &["A", "B", "C"])).unwrap();
        r.save_composition(&comp(3, &["D", "E"])).unwrap();

        let stored = r.get_composition(d(3)).unwrap().unwrap();
        assert_eq!(stored, comp(3, &["D", "E"]));
        assert!(r.get_composition(d(4)).unwrap().is_none());
    }

    #[test]
    fn test_all_compositions_grouped_and_sorted() {
        let r = repo();
        r.save_composition(&comp(5, &["B", "C"])).unwrap();
        r.save_composition(&comp(3, &["A", "B"])).unwrap();

        let all = r.all_compositions().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].date, d(3));
        assert_eq!(all[1].members[0].symbol, "B");
        assert_eq!(r.composition_dates().unwrap(), vec![d(3), d(5)]);
    }

    #[test]
    fn test_changes_replaced_and_ranged() {
        let r = repo();
        let change = |day, sym: &str, action| CompositionChange {
            date: d(day),
            symbol: sym.to_string(),
            action,
            previous_rank: None,
            new_rank: Some(1),
            market_cap: 1.0,
        };
        r.replace_changes(&[change(3, "A", ChangeAction::Entered)]).unwrap();
        r.replace_changes(&[
            change(4, "D", ChangeAction::Entered),
            change(4, "A", ChangeAction::Exited),
            change(9, "Z", ChangeAction::Entered),
        ])
        .unwrap();

        let range = DateRange::new(d(1), d(5)).unwrap();
        let got = r.changes_between(&range).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].symbol, "D");
        assert_eq!(got[1].action, ChangeAction::Exited);
    }

    #[test]
    fn test_performance_round_trip() {
        let r = repo();
        let rec = PerformanceRecord {
            date: d(4),
            daily_return: 0.02,
            cumulative_return: 0.02,
            index_value: 102.0,
        };
        r.replace_performance(std::slice::from_ref(&rec)).unwrap();
        assert_eq!(r.get_performance(d(4)).unwrap(), Some(rec));
        assert!(r.get_performance(d(3)).unwrap().is_none());
    }
}
