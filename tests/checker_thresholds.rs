// tests/checker_thresholds.rs
// Batch threshold checking with route resolution, including the
// same-city-airport substitutions providers are known to make.

use chrono::{NaiveDate, Utc};

use farewatch::checker::check_prices;
use farewatch::models::{AppSettings, Currency, PriceRecord, RouteConfig, TripType};

fn record(origin: &str, destination: &str, price: f64, currency: Currency) -> PriceRecord {
    PriceRecord {
        source: match currency {
            Currency::Usd => "level".to_string(),
            Currency::Ars => "sky".to_string(),
        },
        airline: "Mock Air".to_string(),
        origin: origin.to_string(),
        destination: destination.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
        price,
        currency,
        stops: 0,
        flight_number: None,
        seats_remaining: None,
        duration_minutes: None,
        tags: vec![],
        fetched_at: Utc::now(),
    }
}

fn route(
    origin: &str,
    destination: &str,
    threshold_usd: Option<f64>,
    threshold_ars: Option<f64>,
) -> RouteConfig {
    RouteConfig {
        origin: origin.to_string(),
        destination: destination.to_string(),
        sources: vec!["level".to_string(), "sky".to_string()],
        threshold_usd,
        threshold_ars,
        months_ahead: 6,
        trip_type: TripType::RoundTrip,
    }
}

#[test]
fn mixed_batch_filters_per_route_and_currency() {
    let settings = AppSettings::default();
    let routes = vec![
        route("EZE", "BCN", Some(550.0), None),
        route("EZE", "SSA", None, Some(500_000.0)),
    ];
    let records = vec![
        record("EZE", "BCN", 511.0, Currency::Usd),     // passes
        record("EZE", "BCN", 600.0, Currency::Usd),     // above threshold
        record("EZE", "BCN", 0.0, Currency::Usd),       // no fare
        record("EZE", "BCN", 300_000.0, Currency::Ars), // no ARS threshold on this route
        record("EZE", "SSA", 401_363.0, Currency::Ars), // passes
        record("EZE", "SSA", 511.0, Currency::Usd),     // no USD threshold on this route
    ];

    let candidates = check_prices(&records, &routes, &settings);

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].record.destination, "BCN");
    assert_eq!(candidates[0].threshold_currency, Currency::Usd);
    assert_eq!(candidates[1].record.destination, "SSA");
    assert_eq!(candidates[1].threshold_currency, Currency::Ars);
    assert_eq!(candidates[1].threshold, 500_000.0);
}

#[test]
fn sibling_airport_resolves_to_the_configured_route() {
    // Route is configured from EZE; Sky answers with AEP (both Buenos Aires).
    let settings = AppSettings::default();
    let routes = vec![route("EZE", "SSA", None, Some(500_000.0))];
    let records = vec![record("AEP", "SSA", 420_000.0, Currency::Ars)];

    let candidates = check_prices(&records, &routes, &settings);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].record.origin, "AEP");
    assert_eq!(candidates[0].threshold, 500_000.0);
}

#[test]
fn sibling_destination_resolves_too() {
    let settings = AppSettings::default();
    let routes = vec![route("EZE", "GIG", Some(400.0), None)];
    let records = vec![record("EZE", "SDU", 350.0, Currency::Usd)];

    let candidates = check_prices(&records, &routes, &settings);
    assert_eq!(candidates.len(), 1);
}

#[test]
fn unconfigured_pairs_are_skipped() {
    let settings = AppSettings::default();
    let routes = vec![route("EZE", "BCN", Some(550.0), None)];
    let records = vec![
        record("EZE", "MAD", 100.0, Currency::Usd),
        record("MVD", "BCN", 100.0, Currency::Usd),
    ];

    assert!(check_prices(&records, &routes, &settings).is_empty());
}
