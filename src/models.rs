// src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Currencies the fare sources quote in. Closed set on purpose: every
/// connector declares exactly one, and thresholds are configured per currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Ars,
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::Usd => write!(f, "USD"),
            Currency::Ars => write!(f, "ARS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    #[default]
    RoundTrip,
    OneWay,
}

/// Standardized fare quote, source-agnostic. Every connector returns these,
/// no matter which provider the data came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub source: String,      // connector id, e.g. "level", "sky"
    pub airline: String,     // "Level", "Sky Airline", ...
    pub origin: String,      // IATA code
    pub destination: String, // IATA code
    pub date: NaiveDate,
    /// A price of zero or less means "no fare available" and never alerts.
    pub price: f64,
    pub currency: Currency,
    pub stops: u32,
    pub flight_number: Option<String>,
    /// Seats left at this fare (Sky only).
    pub seats_remaining: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub tags: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl PriceRecord {
    /// Ledger key for this route+date combo. A function of route and date
    /// only — repeated observations of the same flight collapse to one entry
    /// regardless of price.
    pub fn route_key(&self) -> String {
        format!("{}-{}-{}", self.origin, self.destination, self.date)
    }

    /// Formatted price for messages, e.g. "USD 511" or "ARS 401,363".
    pub fn display_price(&self) -> String {
        format!("{} {}", self.currency, group_thousands(self.price))
    }
}

/// Round to whole units and insert thousands separators.
fn group_thousands(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - offset) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if whole < 0 {
        format!("-{out}")
    } else {
        out
    }
}

/// One route to monitor: origin/destination, which sources to query, the
/// price thresholds, and how far ahead to scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub origin: String,
    pub destination: String,
    pub sources: Vec<String>,
    #[serde(default)]
    pub threshold_usd: Option<f64>,
    #[serde(default)]
    pub threshold_ars: Option<f64>,
    #[serde(default = "default_months_ahead")]
    pub months_ahead: u32,
    #[serde(default)]
    pub trip_type: TripType,
}

fn default_months_ahead() -> u32 {
    6
}

/// Global settings. Every field has a default so a minimal config file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Pause between successive calls to the same provider API.
    pub request_delay_seconds: u64,
    pub alert_cooldown_hours: i64,
    /// Routes fetched in parallel. Kept small: upstream rate limits are
    /// shared across connectors.
    pub concurrency_limit: usize,
    /// Wall-clock bound on a single connector `fetch(route)` call.
    pub fetch_timeout_seconds: u64,
    /// Ledger entries older than this are purged, independent of cooldown.
    pub retention_days: i64,
    /// Static USD→ARS rate. Only consulted when `cross_rate_check` is on.
    pub manual_usd_to_ars: f64,
    /// Opt-in secondary threshold comparison through `manual_usd_to_ars`.
    /// Off by default so a stale rate can never mask a direct comparison.
    pub cross_rate_check: bool,
    pub user_agent: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            request_delay_seconds: 3,
            alert_cooldown_hours: 48,
            concurrency_limit: 2,
            fetch_timeout_seconds: 120,
            retention_days: 7,
            manual_usd_to_ars: 1200.0,
            cross_rate_check: false,
            user_agent: concat!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
                "AppleWebKit/537.36 (KHTML, like Gecko) ",
                "Chrome/145.0.0.0 Safari/537.36"
            )
            .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(price: f64, currency: Currency) -> PriceRecord {
        PriceRecord {
            source: "level".into(),
            airline: "Level".into(),
            origin: "EZE".into(),
            destination: "BCN".into(),
            date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            price,
            currency,
            stops: 0,
            flight_number: None,
            seats_remaining: None,
            duration_minutes: None,
            tags: vec![],
            fetched_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn route_key_is_origin_destination_date() {
        let r = record(511.0, Currency::Usd);
        assert_eq!(r.route_key(), "EZE-BCN-2026-12-01");
    }

    #[test]
    fn display_price_groups_thousands() {
        assert_eq!(record(511.0, Currency::Usd).display_price(), "USD 511");
        assert_eq!(
            record(401_363.0, Currency::Ars).display_price(),
            "ARS 401,363"
        );
        assert_eq!(
            record(1_234_567.0, Currency::Ars).display_price(),
            "ARS 1,234,567"
        );
    }

    #[test]
    fn currency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
        let back: Currency = serde_json::from_str("\"ARS\"").unwrap();
        assert_eq!(back, Currency::Ars);
    }
}
