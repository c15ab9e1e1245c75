use capindex::application::ingest::IngestRequest;
use capindex::cli::commands::{Cli, Commands};
use capindex::config::Config;
use capindex::domain::values::date_range::DateRange;
use capindex::domain::values::symbols::parse_symbol_list;
use capindex::logging::{self, LogFormat};
use capindex::CapIndex;
use clap::Parser;
use serde::Serialize;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(LogFormat::from_env()) {
        eprintln!("Warning: {e}");
    }

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let index = match CapIndex::new(config) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Error initializing capindex: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(&index, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(index: &CapIndex, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ingest {
            start,
            end,
            symbols,
            weekdays_only,
        } => {
            let symbols = symbols.map(|s| parse_symbol_list(&s)).unwrap_or_default();
            let mut request = IngestRequest::new(symbols, DateRange::new(start, end)?);
            request.weekdays_only = weekdays_only;
            print_json(&index.ingest_with(request).await?)?;
        }
        Commands::Build { start, end, top_n } => {
            let output = index.build_index(start, end, top_n)?;
            print_json(&output.report)?;
        }
        Commands::Composition { date } => print_json(&index.get_composition(date)?)?,
        Commands::Performance { start, end } => {
            print_json(&index.get_performance(start, end)?)?
        }
        Commands::Changes { start, end } => print_json(&index.get_changes(start, end)?)?,
        Commands::Summary { date } => print_json(&index.summary(date)?)?,
        Commands::Stats => print_json(&index.stats()?)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
