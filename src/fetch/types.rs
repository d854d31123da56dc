// src/fetch/types.rs
use anyhow::Result;

use crate::models::{Currency, PriceRecord, RouteConfig};

/// One fare source. Implementations own their HTTP client and pacing, fail
/// soft on per-request errors, and only ever emit records in the currency
/// they declare.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Stable source identifier, matched against `RouteConfig::sources`.
    fn name(&self) -> &'static str;

    /// The single currency this source quotes in.
    fn currency(&self) -> Currency;

    async fn fetch(&self, route: &RouteConfig) -> Result<Vec<PriceRecord>>;

    /// Operator-facing notice surfaced after a run (e.g. a rejected API key).
    fn status_warning(&self) -> Option<String> {
        None
    }
}
