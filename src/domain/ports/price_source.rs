use crate::domain::entities::observation::RawPriceData;
use crate::domain::error::FetchError;
use async_trait::async_trait;
use chrono::NaiveDate;

/// One external provider of daily closes and market caps.
///
/// Implementations make exactly one attempt per call and throttle their own
/// HTTP requests. Retries and fallback are layered on top by the caller.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short identifier stored as the observation's `source` (e.g. "yahoo").
    fn name(&self) -> &str;

    async fn fetch(&self, symbol: &str, date: NaiveDate) -> Result<RawPriceData, FetchError>;
}
