use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS daily_observations (
            symbol TEXT NOT NULL,
            date TEXT NOT NULL,
            close_price REAL,
            market_cap REAL,
            source TEXT NOT NULL,
            error_kind TEXT,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (symbol, date)
        );

        CREATE TABLE IF NOT EXISTS stock_metadata (
            symbol TEXT PRIMARY KEY,
            name TEXT,
            exchange TEXT,
            latest_market_cap REAL,
            last_updated TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS index_compositions (
            date TEXT NOT NULL,
            symbol TEXT NOT NULL,
            rank INTEGER NOT NULL,
            market_cap REAL NOT NULL,
            weight REAL NOT NULL,
            PRIMARY KEY (date, symbol)
        );

        CREATE TABLE IF NOT EXISTS composition_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            symbol TEXT NOT NULL,
            action TEXT NOT NULL,
            previous_rank INTEGER,
            new_rank INTEGER,
            market_cap REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS index_performance (
            date TEXT PRIMARY KEY,
            daily_return REAL NOT NULL,
            cumulative_return REAL NOT NULL,
            index_value REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_observations_date ON daily_observations(date);
        CREATE INDEX IF NOT EXISTS idx_compositions_rank ON index_compositions(date, rank);
        CREATE INDEX IF NOT EXISTS idx_changes_date ON composition_changes(date);
        "
    ).map_err(|e| format!("Migration failed: {e}"))
}
