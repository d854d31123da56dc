//! Level Airlines connector.
//!
//! Level (IAG's low-cost long-haul brand) exposes a public price-calendar
//! API without authentication. One GET per month returns the cheapest fare
//! per day; prices come back in USD for the Europe–America routes.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::fetch::types::Connector;
use crate::models::{AppSettings, Currency, PriceRecord, RouteConfig, TripType};

const CALENDAR_URL: &str = "https://www.flylevel.com/nwe/flights/api/calendar/";
// Level only honors a few currency codes; anything else falls back to EUR.
const CURRENCY_CODE: &str = "USD";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LevelConnector {
    client: Client,
    user_agent: String,
    request_delay: Duration,
}

impl LevelConnector {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            client: Client::new(),
            user_agent: settings.user_agent.clone(),
            request_delay: Duration::from_secs(settings.request_delay_seconds),
        }
    }

    async fn fetch_month(
        &self,
        route: &RouteConfig,
        year: i32,
        month: u32,
        trip: &str,
    ) -> Result<CalendarResponse> {
        let response = self
            .client
            .get(CALENDAR_URL)
            .timeout(REQUEST_TIMEOUT)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[
                ("triptype", trip),
                ("origin", route.origin.as_str()),
                ("destination", route.destination.as_str()),
                ("month", month.to_string().as_str()),
                ("year", year.to_string().as_str()),
                ("currencyCode", CURRENCY_CODE),
                ("originType", "flights"),
            ])
            .send()
            .await
            .context("level calendar request")?
            .error_for_status()
            .context("level calendar non-2xx")?;

        response
            .json::<CalendarResponse>()
            .await
            .context("level calendar body")
    }
}

#[async_trait::async_trait]
impl Connector for LevelConnector {
    fn name(&self) -> &'static str {
        "level"
    }

    fn currency(&self) -> Currency {
        Currency::Usd
    }

    /// Scan month by month from the current month through `months_ahead`.
    /// A failed month is logged and skipped; adjacent months overlap on the
    /// wire, so dates are deduplicated across the whole scan.
    async fn fetch(&self, route: &RouteConfig) -> Result<Vec<PriceRecord>> {
        let months = months_to_scan(Utc::now().date_naive(), route.months_ahead);
        let trip = match route.trip_type {
            TripType::RoundTrip => "RT",
            TripType::OneWay => "OW",
        };

        tracing::info!(
            origin = %route.origin,
            destination = %route.destination,
            months = months.len(),
            "level: scanning"
        );

        let mut records = Vec::new();
        let mut seen_dates: HashSet<NaiveDate> = HashSet::new();

        for (i, (year, month)) in months.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.request_delay).await;
            }
            match self.fetch_month(route, *year, *month, trip).await {
                Ok(resp) => records.extend(records_from_response(&resp, route, &mut seen_dates)),
                Err(e) => {
                    tracing::warn!(
                        origin = %route.origin,
                        destination = %route.destination,
                        year, month, error = ?e,
                        "level: month failed, continuing"
                    );
                }
            }
        }

        tracing::info!(
            origin = %route.origin,
            destination = %route.destination,
            count = records.len(),
            "level: scan done"
        );
        Ok(records)
    }
}

/// (year, month) pairs from `today`'s month, `months_ahead` long.
fn months_to_scan(today: NaiveDate, months_ahead: u32) -> Vec<(i32, u32)> {
    let mut out = Vec::with_capacity(months_ahead as usize);
    for i in 0..months_ahead {
        let m0 = today.month0() + i;
        out.push((today.year() + (m0 / 12) as i32, m0 % 12 + 1));
    }
    out
}

fn records_from_response(
    resp: &CalendarResponse,
    route: &RouteConfig,
    seen_dates: &mut HashSet<NaiveDate>,
) -> Vec<PriceRecord> {
    let Some(data) = &resp.data else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for day in &data.day_prices {
        let Some(price) = day.price else { continue };
        let Some(date) = day
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        if !seen_dates.insert(date) {
            continue;
        }

        out.push(PriceRecord {
            source: "level".to_string(),
            airline: "Level".to_string(),
            origin: route.origin.clone(),
            destination: route.destination.clone(),
            date,
            price,
            currency: Currency::Usd,
            // Level flies its trunk routes nonstop.
            stops: 0,
            flight_number: None,
            seats_remaining: None,
            duration_minutes: None,
            tags: day.tags.clone().unwrap_or_default(),
            fetched_at: Utc::now(),
        });
    }
    out
}

// Response shape: {"data": {"dayPrices": [{"date", "price", "tags"}]}}
#[derive(Debug, Deserialize)]
struct CalendarResponse {
    data: Option<CalendarData>,
}

#[derive(Debug, Deserialize)]
struct CalendarData {
    #[serde(rename = "dayPrices", default)]
    day_prices: Vec<DayPrice>,
}

#[derive(Debug, Deserialize)]
struct DayPrice {
    date: Option<String>,
    price: Option<f64>,
    tags: Option<Vec<String>>,
}
