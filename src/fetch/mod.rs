// src/fetch/mod.rs
pub mod connectors;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::models::{AppSettings, PriceRecord, RouteConfig};
use crate::fetch::types::Connector;

/// Source id → connector. Built once at startup; shared read-only by the
/// fetch tasks.
pub type ConnectorRegistry = HashMap<String, Arc<dyn Connector>>;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_records_total", "Fare records collected from sources.");
        describe_counter!(
            "fetch_source_errors_total",
            "Connector fetch errors (non-fatal, per route/source pair)."
        );
        describe_counter!(
            "fetch_timeouts_total",
            "Connector calls abandoned at the per-call deadline."
        );
        describe_gauge!("fetch_last_run_ts", "Unix ts when the last fetch cycle ran.");
    });
}

/// Fetch all configured routes from all their sources.
///
/// Routes run concurrently, at most `concurrency_limit` at a time (upstream
/// rate limits are shared across connectors). Each connector call is bounded
/// by `fetch_timeout_seconds`; a timeout or error costs only that
/// (route, source) pair its records — the rest of the run proceeds.
/// Output ordering is not meaningful.
pub async fn collect_all(
    routes: &[RouteConfig],
    registry: &ConnectorRegistry,
    settings: &AppSettings,
) -> Vec<PriceRecord> {
    ensure_metrics_described();

    let semaphore = Arc::new(Semaphore::new(settings.concurrency_limit.max(1)));
    let per_call_timeout = Duration::from_secs(settings.fetch_timeout_seconds.max(1));

    let mut tasks: JoinSet<Vec<PriceRecord>> = JoinSet::new();
    for route in routes.iter().cloned() {
        let semaphore = Arc::clone(&semaphore);
        let registry: Vec<(String, Arc<dyn Connector>)> = route
            .sources
            .iter()
            .filter_map(|name| match registry.get(name) {
                Some(c) => Some((name.clone(), Arc::clone(c))),
                None => {
                    // Config validation rejects unknown sources up front, so
                    // this only fires for a registry built by hand.
                    tracing::warn!(source = %name, "no connector registered, skipping");
                    None
                }
            })
            .collect();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("fetch semaphore closed");
            fetch_route(&route, &registry, per_call_timeout).await
        });
    }

    let mut all = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(records) => all.extend(records),
            Err(e) => {
                // A panicked route task is isolated like any other failure.
                tracing::warn!(error = ?e, "route fetch task failed");
                counter!("fetch_source_errors_total").increment(1);
            }
        }
    }

    gauge!("fetch_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
    tracing::info!(records = all.len(), routes = routes.len(), "fetch cycle done");
    all
}

async fn fetch_route(
    route: &RouteConfig,
    connectors: &[(String, Arc<dyn Connector>)],
    per_call_timeout: Duration,
) -> Vec<PriceRecord> {
    let mut records = Vec::new();
    tracing::info!(
        origin = %route.origin,
        destination = %route.destination,
        sources = ?route.sources,
        "processing route"
    );

    for (name, connector) in connectors {
        match tokio::time::timeout(per_call_timeout, connector.fetch(route)).await {
            Ok(Ok(batch)) => {
                tracing::info!(
                    source = %name,
                    origin = %route.origin,
                    destination = %route.destination,
                    count = batch.len(),
                    "source done"
                );
                counter!("fetch_records_total").increment(batch.len() as u64);
                records.extend(batch);
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    source = %name,
                    origin = %route.origin,
                    destination = %route.destination,
                    error = ?e,
                    "source error"
                );
                counter!("fetch_source_errors_total").increment(1);
            }
            Err(_) => {
                tracing::warn!(
                    source = %name,
                    origin = %route.origin,
                    destination = %route.destination,
                    timeout_secs = per_call_timeout.as_secs(),
                    "source call abandoned at deadline"
                );
                counter!("fetch_timeouts_total").increment(1);
            }
        }
    }
    records
}
