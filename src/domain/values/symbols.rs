/// Large-cap US equities used when no symbol list is supplied.
pub const DEFAULT_UNIVERSE: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "GOOGL", "AMZN", "META", "BRK-B", "AVGO", "TSLA", "LLY",
    "JPM", "V", "WMT", "XOM", "UNH", "MA", "ORCL", "COST", "PG", "JNJ",
    "HD", "NFLX", "BAC", "ABBV", "KO", "CRM", "CVX", "MRK", "AMD", "PEP",
    "TMO", "ADBE", "CSCO", "ACN", "LIN", "MCD", "WFC", "ABT", "IBM", "PM",
    "GE", "QCOM", "TXN", "INTU", "DIS", "AMGN", "CAT", "VZ", "ISRG", "NOW",
];

/// Upper-case, trim, drop empties and duplicates. First occurrence wins.
pub fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for s in symbols {
        let sym = s.as_ref().trim().to_uppercase();
        if !sym.is_empty() && !out.contains(&sym) {
            out.push(sym);
        }
    }
    out
}

/// Split a comma-separated list such as `"aapl, msft,,GOOGL"`.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    normalize_symbols(raw.split(','))
}

pub fn default_universe() -> Vec<String> {
    DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect()
}
