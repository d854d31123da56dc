//! # Threshold Evaluator
//! Pure logic that maps `(PriceRecord, RouteConfig)` → `Candidate | None`.
//! No I/O, suitable for unit tests and offline evaluation.
//!
//! Policy: thresholds and prices are only compared in the same currency.
//! There is no implicit conversion — a stale manual rate must never decide an
//! alert on its own. The manual-rate comparison exists as an explicit opt-in
//! (`cross_rate_check`) that runs after the direct path, never instead of it.

use std::collections::HashMap;

use crate::models::{AppSettings, Currency, PriceRecord, RouteConfig};

/// A record that passed its route's threshold, with the matched threshold
/// kept for message construction.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub record: PriceRecord,
    pub threshold: f64,
    pub threshold_currency: Currency,
}

/// Evaluate one record against its route. Returns `None` for unavailable
/// fares (`price <= 0`), records whose currency has no configured threshold,
/// and prices above threshold. Passing is inclusive: `price <= threshold`.
pub fn evaluate(
    record: &PriceRecord,
    route: &RouteConfig,
    settings: &AppSettings,
) -> Option<Candidate> {
    if record.price <= 0.0 {
        tracing::debug!(
            key = %record.route_key(),
            source = %record.source,
            "no fare available, skipping"
        );
        return None;
    }

    // Direct same-currency comparison.
    let direct = match record.currency {
        Currency::Usd => route.threshold_usd,
        Currency::Ars => route.threshold_ars,
    };
    if let Some(threshold) = direct {
        if record.price <= threshold {
            return Some(Candidate {
                record: record.clone(),
                threshold,
                threshold_currency: record.currency,
            });
        }
    }

    // Optional secondary comparison through the static manual rate, against
    // the other currency's threshold.
    if settings.cross_rate_check && settings.manual_usd_to_ars > 0.0 {
        let rate = settings.manual_usd_to_ars;
        let (converted, other_threshold, other_currency) = match record.currency {
            Currency::Usd => (record.price * rate, route.threshold_ars, Currency::Ars),
            Currency::Ars => (record.price / rate, route.threshold_usd, Currency::Usd),
        };
        if let Some(threshold) = other_threshold {
            if converted <= threshold {
                return Some(Candidate {
                    record: record.clone(),
                    threshold,
                    threshold_currency: other_currency,
                });
            }
        }
    }

    None
}

/// Evaluate a whole batch, resolving each record's route by
/// origin/destination first.
pub fn check_prices(
    records: &[PriceRecord],
    routes: &[RouteConfig],
    settings: &AppSettings,
) -> Vec<Candidate> {
    let lookup: HashMap<String, &RouteConfig> = routes
        .iter()
        .map(|r| (format!("{}-{}", r.origin, r.destination), r))
        .collect();

    let mut candidates = Vec::new();
    for record in records {
        let Some(route) = resolve_route(record, &lookup) else {
            // A connector answered with an airport pair nobody configured.
            tracing::debug!(
                origin = %record.origin,
                destination = %record.destination,
                source = %record.source,
                "no route configured, skipping"
            );
            continue;
        };
        if let Some(candidate) = evaluate(record, route, settings) {
            candidates.push(candidate);
        }
    }

    tracing::info!(
        records = records.len(),
        candidates = candidates.len(),
        "threshold check done"
    );
    candidates
}

/// Airports in the same city that providers substitute for one another
/// (e.g. Sky answers AEP for a route configured as EZE).
fn equivalent_airports(code: &str) -> &'static [&'static str] {
    match code {
        "EZE" => &["AEP"],
        "AEP" => &["EZE"],
        "GIG" => &["SDU"],
        "SDU" => &["GIG"],
        _ => &[],
    }
}

fn resolve_route<'a>(
    record: &PriceRecord,
    lookup: &HashMap<String, &'a RouteConfig>,
) -> Option<&'a RouteConfig> {
    if let Some(route) = lookup.get(&format!("{}-{}", record.origin, record.destination)) {
        return Some(route);
    }
    for alt_origin in equivalent_airports(&record.origin) {
        if let Some(route) = lookup.get(&format!("{}-{}", alt_origin, record.destination)) {
            return Some(route);
        }
    }
    for alt_dest in equivalent_airports(&record.destination) {
        if let Some(route) = lookup.get(&format!("{}-{}", record.origin, alt_dest)) {
            return Some(route);
        }
    }
    None
}
