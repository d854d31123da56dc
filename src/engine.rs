//! # Pipeline Driver
//! One run-cycle: fetch fares from every configured source, check thresholds,
//! ask the ledger which candidates deserve an alert, persist the ledger, then
//! hand the approved alerts to the notifier.
//!
//! The ledger is persisted *before* notification: durability of "we decided
//! to alert" must not depend on the messaging service being up. No failure of
//! one route, source, or alert aborts the rest of the run.

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::checker;
use crate::fetch::{self, ConnectorRegistry};
use crate::ledger::{AlertLedger, Decision};
use crate::models::{AppSettings, RouteConfig};
use crate::notify::{ApprovedAlert, Notifier};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("alerts_sent_total", "Alerts delivered to the notifier.");
        describe_counter!(
            "alerts_suppressed_total",
            "Candidates suppressed by the dedup ledger."
        );
    });
}

/// What a run did, for logging and tests.
#[derive(Debug, Default)]
pub struct RunReport {
    pub collected: usize,
    pub candidates: usize,
    pub approved: Vec<ApprovedAlert>,
    pub suppressed: usize,
    pub notified: usize,
}

/// Execute one full cycle. The caller owns the ledger for the duration
/// (load → run → done); there is exactly one writer.
pub async fn run(
    routes: &[RouteConfig],
    settings: &AppSettings,
    registry: &ConnectorRegistry,
    ledger: &mut AlertLedger,
    notifier: &dyn Notifier,
) -> Result<RunReport> {
    ensure_metrics_described();

    let now = Utc::now();
    let mut report = RunReport::default();

    // Keep the state file bounded before this run adds to it.
    ledger.purge_expired(now);

    let records = fetch::collect_all(routes, registry, settings).await;
    report.collected = records.len();

    let candidates = checker::check_prices(&records, routes, settings);
    report.candidates = candidates.len();

    // Same-key candidates are decided in arrival order: each decision is
    // relative to the running entry.
    for candidate in candidates {
        match ledger.decide(&candidate, Utc::now()) {
            Decision::Approve => report.approved.push(ApprovedAlert {
                candidate,
                dropped_further: false,
            }),
            Decision::ApproveAsDrop => report.approved.push(ApprovedAlert {
                candidate,
                dropped_further: true,
            }),
            Decision::Suppress => report.suppressed += 1,
        }
    }
    counter!("alerts_suppressed_total").increment(report.suppressed as u64);

    // Stale state next run just means one possible duplicate alert; a failed
    // save is an error to log, not a reason to drop the alerts we owe.
    if let Err(e) = ledger.save() {
        tracing::error!(error = ?e, "alert ledger save failed");
    }

    for alert in &report.approved {
        match notifier.notify(alert).await {
            Ok(()) => {
                report.notified += 1;
                counter!("alerts_sent_total").increment(1);
            }
            Err(e) => {
                tracing::warn!(
                    key = %alert.candidate.record.route_key(),
                    error = ?e,
                    "notification failed, continuing with the rest"
                );
            }
        }
    }

    // Surface connector trouble (e.g. a rotated API key) to the operator.
    for connector in registry.values() {
        if let Some(warning) = connector.status_warning() {
            tracing::warn!(source = connector.name(), %warning, "connector status warning");
            if let Err(e) = notifier.notify_error(&warning).await {
                tracing::warn!(error = ?e, "could not deliver status warning");
            }
        }
    }

    tracing::info!(
        collected = report.collected,
        candidates = report.candidates,
        approved = report.approved.len(),
        suppressed = report.suppressed,
        notified = report.notified,
        "run cycle done"
    );
    Ok(report)
}
