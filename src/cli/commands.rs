use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "capindex",
    about = "Equal-weighted top-N US market-cap index: ingest, build, query"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch closes and market caps for a date range
    Ingest {
        /// First date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Comma-separated tickers; defaults to CAPINDEX_SYMBOLS or the built-in universe
        #[arg(long)]
        symbols: Option<String>,
        /// Skip Saturdays and Sundays
        #[arg(long)]
        weekdays_only: bool,
    },
    /// Build compositions, changes and performance from stored observations
    Build {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Index size; defaults to CAPINDEX_TOP_N
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Show the composition stored for a date
    Composition { date: NaiveDate },
    /// Performance series over a range
    Performance {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Entries and exits over a range
    Changes {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Market-cap and return summary for a date
    Summary { date: NaiveDate },
    /// Database statistics
    Stats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from([
            "capindex",
            "ingest",
            "--start",
            "2024-06-03",
            "--end",
            "2024-06-07",
            "--symbols",
            "AAPL,MSFT",
            "--weekdays-only",
        ])
        .unwrap();
        match cli.command {
            Commands::Ingest {
                start,
                symbols,
                weekdays_only,
                ..
            } => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
                assert_eq!(symbols.as_deref(), Some("AAPL,MSFT"));
                assert!(weekdays_only);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn test_rejects_bad_date() {
        assert!(Cli::try_parse_from(["capindex", "composition", "06/03/2024"]).is_err());
    }
}
