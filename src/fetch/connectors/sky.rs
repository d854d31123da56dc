//! Sky Airline (H2) connector.
//!
//! Sky exposes a lowest-fares REST API behind Azure API Management; the
//! subscription key is the public one shipped in their web frontend. One
//! POST with `dateFlexibility = 14` covers a ~28-day window, so the scan
//! walks forward one window at a time. Fares come back in ARS.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::fetch::types::Connector;
use crate::models::{AppSettings, Currency, PriceRecord, RouteConfig};

const SEARCH_URL: &str =
    "https://api.skyairline.com/shopping-lowest-fares/lowest-fares/v1/search";
// Public key extracted from Sky's web frontend (visible in their JS bundle).
// If Sky rotates it, requests start failing 401/403 and the run surfaces a
// status warning instead of retrying.
const API_KEY: &str = "4c998b33d2aa4e8aba0f9a63d4c04d7d";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// dateFlexibility=14 means ±14 days around the center date per request.
const FLEXIBILITY_DAYS: u64 = 14;
const DAYS_PER_REQUEST: u64 = 28;

/// Sky wants city codes, not airport codes, for the origin.
fn city_code(airport: &str) -> &str {
    match airport {
        "EZE" | "AEP" => "BUE",
        other => other,
    }
}

pub struct SkyConnector {
    client: Client,
    user_agent: String,
    request_delay: Duration,
    api_key_failed: AtomicBool,
}

impl SkyConnector {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            client: Client::new(),
            user_agent: settings.user_agent.clone(),
            request_delay: Duration::from_secs(settings.request_delay_seconds),
            api_key_failed: AtomicBool::new(false),
        }
    }

    async fn fetch_window(
        &self,
        route: &RouteConfig,
        origin_city: &str,
        center_date: NaiveDate,
    ) -> Result<SearchResponse> {
        let body = serde_json::json!({
            "currency": "ARS",
            "passengerCount": [{"ptc": "ADT", "quantity": 1}],
            "itineraryParts": [{
                "origin": origin_city,
                "destination": route.destination,
                "departureDate": center_date.to_string(),
                "dateFlexibility": FLEXIBILITY_DAYS,
            }],
        });

        let response = self
            .client
            .post(SEARCH_URL)
            .timeout(REQUEST_TIMEOUT)
            .header("ocp-apim-subscription-key", API_KEY)
            .header("channel", "WEB")
            .header("homemarket", "AR")
            .header("pointofsale", "AR")
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(&body)
            .send()
            .await
            .context("sky search request")?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // The key was probably rotated; further calls would just burn quota.
            self.api_key_failed.store(true, Ordering::Relaxed);
            anyhow::bail!("sky api key rejected (HTTP {status})");
        }

        response
            .error_for_status()
            .context("sky search non-2xx")?
            .json::<SearchResponse>()
            .await
            .context("sky search body")
    }
}

#[async_trait::async_trait]
impl Connector for SkyConnector {
    fn name(&self) -> &'static str {
        "sky"
    }

    fn currency(&self) -> Currency {
        Currency::Ars
    }

    async fn fetch(&self, route: &RouteConfig) -> Result<Vec<PriceRecord>> {
        if self.api_key_failed.load(Ordering::Relaxed) {
            tracing::warn!("sky: api key marked invalid, skipping");
            return Ok(Vec::new());
        }

        let today = Utc::now().date_naive();
        let total_days = u64::from(route.months_ahead) * 30;
        let num_requests = total_days / DAYS_PER_REQUEST + 1;
        let origin_city = city_code(&route.origin).to_string();

        tracing::info!(
            origin = %route.origin,
            origin_city = %origin_city,
            destination = %route.destination,
            windows = num_requests,
            "sky: scanning"
        );

        let mut records = Vec::new();
        let mut seen_dates: HashSet<NaiveDate> = HashSet::new();

        for i in 0..num_requests {
            if i > 0 {
                tokio::time::sleep(self.request_delay).await;
            }
            let center_date = today
                .checked_add_days(Days::new(FLEXIBILITY_DAYS + i * DAYS_PER_REQUEST))
                .context("sky scan window out of calendar range")?;

            match self.fetch_window(route, &origin_city, center_date).await {
                Ok(resp) => records.extend(records_from_response(&resp, route, &mut seen_dates)),
                Err(e) => {
                    tracing::warn!(
                        origin = %route.origin,
                        destination = %route.destination,
                        window = %center_date,
                        error = ?e,
                        "sky: window failed"
                    );
                    if self.api_key_failed.load(Ordering::Relaxed) {
                        // Keep whatever the earlier windows produced.
                        break;
                    }
                }
            }
        }

        tracing::info!(
            origin = %route.origin,
            destination = %route.destination,
            count = records.len(),
            "sky: scan done"
        );
        Ok(records)
    }

    fn status_warning(&self) -> Option<String> {
        if self.api_key_failed.load(Ordering::Relaxed) {
            Some(
                "Sky Airline rejected the API key (401/403); it was probably rotated. \
                 Sky fares cannot be fetched until the key in the sky connector is updated."
                    .to_string(),
            )
        } else {
            None
        }
    }
}

fn records_from_response(
    resp: &SearchResponse,
    route: &RouteConfig,
    seen_dates: &mut HashSet<NaiveDate>,
) -> Vec<PriceRecord> {
    let mut out = Vec::new();
    for part in &resp.itinerary_parts {
        if !part.is_available {
            continue;
        }
        let Some(date) = part
            .departure_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        if !seen_dates.insert(date) {
            continue;
        }

        let pricing = part.pricing_info.as_ref();
        let price = pricing.and_then(|p| p.base_fare_with_taxes).unwrap_or(0.0);
        let seats = pricing
            .and_then(|p| p.seats_remaining.as_ref())
            .and_then(|s| s.number);

        let flight_number = part.segments.first().map(|seg| {
            format!(
                "{}{}",
                seg.operating_airline_code.as_deref().unwrap_or("H2"),
                seg.flight_number.as_deref().unwrap_or_default()
            )
        });

        out.push(PriceRecord {
            source: "sky".to_string(),
            airline: "Sky Airline".to_string(),
            origin: part.origin.clone().unwrap_or_else(|| route.origin.clone()),
            destination: part
                .destination
                .clone()
                .unwrap_or_else(|| route.destination.clone()),
            date,
            price,
            currency: Currency::Ars,
            stops: part.stops,
            flight_number,
            seats_remaining: seats,
            duration_minutes: part.total_duration,
            tags: Vec::new(),
            fetched_at: Utc::now(),
        });
    }
    out
}

// Response shape (fields we use): itineraryParts at the top level, each with
// availability, pricing, segments, and total duration.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "itineraryParts", default)]
    itinerary_parts: Vec<ItineraryPart>,
}

#[derive(Debug, Deserialize)]
struct ItineraryPart {
    #[serde(rename = "isAvailable", default)]
    is_available: bool,
    #[serde(rename = "departureDate")]
    departure_date: Option<String>,
    origin: Option<String>,
    destination: Option<String>,
    #[serde(rename = "pricingInfo")]
    pricing_info: Option<PricingInfo>,
    #[serde(default)]
    stops: u32,
    #[serde(default)]
    segments: Vec<Segment>,
    #[serde(rename = "totalDuration")]
    total_duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PricingInfo {
    #[serde(rename = "baseFareWithTaxes")]
    base_fare_with_taxes: Option<f64>,
    #[serde(rename = "seatsRemaining")]
    seats_remaining: Option<SeatsRemaining>,
}

#[derive(Debug, Deserialize)]
struct SeatsRemaining {
    number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(rename = "operatingAirlineCode")]
    operating_airline_code: Option<String>,
    #[serde(rename = "flightNumber")]
    flight_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TripType;

    fn route() -> RouteConfig {
        RouteConfig {
            origin: "EZE".into(),
            destination: "SSA".into(),
            sources: vec!["sky".into()],
            threshold_usd: None,
            threshold_ars: Some(500_000.0),
            months_ahead: 3,
            trip_type: TripType::RoundTrip,
        }
    }

    #[test]
    fn buenos_aires_airports_map_to_city() {
        assert_eq!(city_code("EZE"), "BUE");
        assert_eq!(city_code("AEP"), "BUE");
        assert_eq!(city_code("COR"), "COR");
    }

    #[test]
    fn parses_available_itineraries_only() {
        let body = r#"{
            "itineraryParts": [
                {
                    "isAvailable": true,
                    "departureDate": "2026-10-05",
                    "origin": "BUE",
                    "destination": "SSA",
                    "pricingInfo": {
                        "baseFareWithTaxes": 401363.0,
                        "seatsRemaining": {"number": 3}
                    },
                    "stops": 1,
                    "segments": [{"operatingAirlineCode": "H2", "flightNumber": "800"}],
                    "totalDuration": 415
                },
                {
                    "isAvailable": false,
                    "departureDate": "2026-10-06",
                    "pricingInfo": {"baseFareWithTaxes": 99999.0}
                },
                {
                    "isAvailable": true,
                    "departureDate": "2026-10-05",
                    "pricingInfo": {"baseFareWithTaxes": 450000.0}
                }
            ]
        }"#;
        let resp: SearchResponse = serde_json::from_str(body).unwrap();
        let mut seen = HashSet::new();
        let records = records_from_response(&resp, &route(), &mut seen);

        // Unavailable itinerary dropped, duplicate date dropped.
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.price, 401_363.0);
        assert_eq!(r.currency, Currency::Ars);
        assert_eq!(r.stops, 1);
        assert_eq!(r.flight_number.as_deref(), Some("H2800"));
        assert_eq!(r.seats_remaining, Some(3));
        assert_eq!(r.duration_minutes, Some(415));
        assert_eq!(r.origin, "BUE");
    }

    #[test]
    fn missing_pricing_yields_zero_price() {
        // Downstream filters price <= 0; the connector stays faithful to the
        // payload rather than guessing.
        let body = r#"{"itineraryParts": [{"isAvailable": true, "departureDate": "2026-10-07"}]}"#;
        let resp: SearchResponse = serde_json::from_str(body).unwrap();
        let mut seen = HashSet::new();
        let records = records_from_response(&resp, &route(), &mut seen);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, 0.0);
    }
}
