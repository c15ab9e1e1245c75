mod common;

use capindex::application::ingest::IngestRequest;
use capindex::domain::error::DomainError;
use capindex::domain::values::date_range::DateRange;
use capindex::domain::values::error_kind::ErrorKind;
use common::{d, setup, setup_with, symbols, FakeSource};
use std::sync::Arc;

#[tokio::test]
async fn test_primary_success_is_stored() {
    let primary = Arc::new(FakeSource::new("yahoo").with_price("AAPL", d(3), 190.0, 3.0e12));
    let fallback = Arc::new(FakeSource::new("alphavantage"));
    let index = setup_with(primary.clone(), fallback.clone());

    let summary = index.ingest(symbols(&["AAPL"]), d(3), d(3)).await.unwrap();
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failure_count, 0);
    assert_eq!(summary.per_source.get("yahoo"), Some(&1));
    assert_eq!(fallback.calls(), 0);

    let obs = index.observation("AAPL", d(3)).unwrap().unwrap();
    assert_eq!(obs.source, "yahoo");
    assert_eq!(obs.close_price, Some(190.0));
    assert_eq!(obs.market_cap, Some(3.0e12));
    assert!(obs.error_kind.is_none());

    let meta = index.metadata("AAPL").unwrap().unwrap();
    assert_eq!(meta.name.as_deref(), Some("AAPL Corp"));
    assert_eq!(meta.latest_market_cap, Some(3.0e12));
}

#[tokio::test]
async fn test_fallback_after_transient_exhaustion() {
    let primary = Arc::new(FakeSource::new("yahoo").with_error("AAPL", d(3), ErrorKind::Network));
    let fallback =
        Arc::new(FakeSource::new("alphavantage").with_price("AAPL", d(3), 191.0, 2.9e12));
    let index = setup_with(primary.clone(), fallback.clone());

    let summary = index.ingest(symbols(&["AAPL"]), d(3), d(3)).await.unwrap();
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.per_source.get("alphavantage"), Some(&1));

    // Transient errors use every attempt before falling back.
    assert_eq!(primary.calls_for("AAPL", d(3)), 3);
    assert_eq!(fallback.calls_for("AAPL", d(3)), 1);

    let obs = index.observation("AAPL", d(3)).unwrap().unwrap();
    assert_eq!(obs.source, "alphavantage");
    assert_eq!(obs.close_price, Some(191.0));
}

#[tokio::test]
async fn test_permanent_error_skips_retries() {
    let primary =
        Arc::new(FakeSource::new("yahoo").with_error("AAPL", d(3), ErrorKind::MissingData));
    let fallback =
        Arc::new(FakeSource::new("alphavantage").with_price("AAPL", d(3), 191.0, 2.9e12));
    let index = setup_with(primary.clone(), fallback.clone());

    index.ingest(symbols(&["AAPL"]), d(3), d(3)).await.unwrap();
    assert_eq!(primary.calls_for("AAPL", d(3)), 1);
    assert_eq!(fallback.calls_for("AAPL", d(3)), 1);
}

#[tokio::test]
async fn test_flaky_primary_recovers_within_budget() {
    let primary = Arc::new(FakeSource::new("yahoo").with_flaky(
        "MSFT",
        d(3),
        2,
        ErrorKind::ApiLimit,
        420.0,
        3.1e12,
    ));
    let fallback = Arc::new(FakeSource::new("alphavantage"));
    let index = setup_with(primary.clone(), fallback.clone());

    let summary = index.ingest(symbols(&["MSFT"]), d(3), d(3)).await.unwrap();
    assert_eq!(summary.success_count, 1);
    assert_eq!(primary.calls_for("MSFT", d(3)), 3);
    assert_eq!(fallback.calls(), 0);
    assert_eq!(index.observation("MSFT", d(3)).unwrap().unwrap().source, "yahoo");
}

#[tokio::test]
async fn test_missing_market_cap_falls_back() {
    let primary = Arc::new(FakeSource::new("yahoo").with_close_only("SPY", d(3), 530.0));
    let fallback =
        Arc::new(FakeSource::new("alphavantage").with_price("SPY", d(3), 530.0, 5.0e11));
    let index = setup_with(primary.clone(), fallback.clone());

    index.ingest(symbols(&["SPY"]), d(3), d(3)).await.unwrap();
    let obs = index.observation("SPY", d(3)).unwrap().unwrap();
    assert_eq!(obs.source, "alphavantage");
    assert_eq!(obs.market_cap, Some(5.0e11));
    assert_eq!(primary.calls_for("SPY", d(3)), 1);
}

#[tokio::test]
async fn test_terminal_failure_stores_error_row() {
    let primary = Arc::new(FakeSource::new("yahoo").with_error("AAPL", d(3), ErrorKind::Network));
    let fallback =
        Arc::new(FakeSource::new("alphavantage").with_error("AAPL", d(3), ErrorKind::ApiLimit));
    let index = setup_with(primary, fallback);

    let summary = index.ingest(symbols(&["AAPL"]), d(3), d(3)).await.unwrap();
    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.error_breakdown.api_limit, 1);
    assert_eq!(summary.error_breakdown.total(), 1);
    assert_eq!(summary.failed_pairs[0].symbol, "AAPL");
    assert_eq!(summary.failed_pairs[0].date, d(3));
    assert_eq!(summary.failed_pairs[0].kind, ErrorKind::ApiLimit);

    let obs = index.observation("AAPL", d(3)).unwrap().unwrap();
    assert_eq!(obs.source, "alphavantage");
    assert_eq!(obs.error_kind, Some(ErrorKind::ApiLimit));
    assert!(obs.error.is_some());
    assert!(obs.close_price.is_none());
    assert!(obs.market_cap.is_none());

    // Error rows never feed the index.
    assert!(index.observations_for_date(d(3)).unwrap().is_empty());
    assert!(index.metadata("AAPL").unwrap().is_none());
}

#[tokio::test]
async fn test_one_bad_pair_does_not_abort_batch() {
    let primary = Arc::new(
        FakeSource::new("yahoo")
            .with_price("AAPL", d(3), 190.0, 3.0e12)
            .with_price("MSFT", d(3), 420.0, 3.1e12)
            .with_price("AAPL", d(4), 192.0, 3.02e12),
    );
    let fallback = Arc::new(FakeSource::new("alphavantage"));
    let index = setup_with(primary, fallback);

    let summary = index
        .ingest(symbols(&["AAPL", "MSFT", "ZZZZ"]), d(3), d(4))
        .await
        .unwrap();
    assert_eq!(summary.total_pairs, 6);
    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.failure_count, 3);
    assert_eq!(summary.error_breakdown.missing_data, 3);
    assert!((summary.success_rate - 50.0).abs() < 1e-9);

    let failed: Vec<(&str, chrono::NaiveDate)> = summary
        .failed_pairs
        .iter()
        .map(|f| (f.symbol.as_str(), f.date))
        .collect();
    assert!(failed.contains(&("MSFT", d(4))));
    assert!(failed.contains(&("ZZZZ", d(3))));
    assert!(failed.contains(&("ZZZZ", d(4))));

    assert_eq!(index.all_observations().unwrap().len(), 6);
}

#[tokio::test]
async fn test_symbols_are_normalized() {
    let primary = Arc::new(FakeSource::new("yahoo").with_price("AAPL", d(3), 190.0, 3.0e12));
    let index = setup_with(primary.clone(), Arc::new(FakeSource::new("alphavantage")));

    let summary = index
        .ingest(symbols(&[" aapl", "AAPL", ""]), d(3), d(3))
        .await
        .unwrap();
    assert_eq!(summary.total_pairs, 1);
    assert_eq!(primary.calls(), 1);
}

#[tokio::test]
async fn test_empty_symbol_list_uses_configured_universe() {
    let primary = Arc::new(
        FakeSource::new("yahoo")
            .with_price("AAPL", d(3), 190.0, 3.0e12)
            .with_price("MSFT", d(3), 420.0, 3.1e12),
    );
    let index = setup_with(primary, Arc::new(FakeSource::new("alphavantage")));

    let summary = index.ingest(vec![], d(3), d(3)).await.unwrap();
    assert_eq!(summary.total_pairs, 2);
    assert_eq!(summary.success_count, 2);
}

#[tokio::test]
async fn test_weekdays_only_skips_weekend() {
    let primary = Arc::new(FakeSource::new("yahoo"));
    let index = setup_with(primary.clone(), Arc::new(FakeSource::new("alphavantage")));

    // 2024-06-07 is a Friday, 06-10 a Monday.
    let mut request = IngestRequest::new(symbols(&["AAPL"]), DateRange::new(d(7), d(10)).unwrap());
    request.weekdays_only = true;
    let summary = index.ingest_with(request).await.unwrap();

    assert_eq!(summary.total_pairs, 2);
    assert_eq!(primary.calls_for("AAPL", d(8)), 0);
    assert_eq!(primary.calls_for("AAPL", d(9)), 0);
}

#[tokio::test]
async fn test_inverted_range_rejected() {
    let index = setup();
    let result = index.ingest(symbols(&["AAPL"]), d(5), d(3)).await;
    assert!(matches!(result, Err(DomainError::InvalidInput(_))));
}

#[tokio::test]
async fn test_run_ids_are_unique() {
    let index = setup();
    let a = index.ingest(symbols(&["AAPL"]), d(3), d(3)).await.unwrap();
    let b = index.ingest(symbols(&["AAPL"]), d(3), d(3)).await.unwrap();
    assert_ne!(a.run_id, b.run_id);
}
