//! # Alert Deduplication Ledger
//! Decides, per route+date key, whether a candidate is worth another
//! notification: first sighting and further price drops always pass, repeats
//! at the same-or-higher price are suppressed until the cooldown expires.
//!
//! The ledger is the single source of truth for "has this already been
//! alerted". It is owned by the pipeline driver for the duration of a run
//! (load → mutate → persist); there are no concurrent writers. State lives
//! in one JSON file; a missing or corrupt file degrades to an empty ledger —
//! worst case is one duplicate alert, never a crash.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::checker::Candidate;
use crate::models::Currency;

/// Last alert sent for one `origin-destination-date` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub price: f64,
    pub currency: Currency,
    pub alerted_at: DateTime<Utc>,
}

/// Outcome of [`AlertLedger::decide`] for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// First alert for this key, or cooldown-expired refresh.
    Approve,
    /// Already alerted, but the price dropped further.
    ApproveAsDrop,
    /// Same-or-higher price inside the cooldown window.
    Suppress,
}

#[derive(Debug)]
pub struct AlertLedger {
    entries: BTreeMap<String, LedgerEntry>,
    cooldown: ChronoDuration,
    retention: ChronoDuration,
    path: Option<PathBuf>,
}

impl AlertLedger {
    /// Ledger with no backing file. Used by tests and ad-hoc tools.
    pub fn in_memory(cooldown_hours: i64, retention_days: i64) -> Self {
        Self {
            entries: BTreeMap::new(),
            cooldown: ChronoDuration::hours(cooldown_hours.max(0)),
            retention: ChronoDuration::days(retention_days.max(0)),
            path: None,
        }
    }

    /// Load the ledger from `path`. Missing or unreadable state is never
    /// fatal: the run simply starts from an empty ledger.
    pub fn load(path: &Path, cooldown_hours: i64, retention_days: i64) -> Self {
        let mut ledger = Self::in_memory(cooldown_hours, retention_days);
        ledger.path = Some(path.to_path_buf());

        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, LedgerEntry>>(&raw) {
                Ok(entries) => {
                    tracing::info!(entries = entries.len(), "alert ledger loaded");
                    ledger.entries = entries;
                }
                Err(e) => {
                    tracing::warn!(error = ?e, path = %path.display(), "corrupt alert ledger, starting empty");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no alert ledger yet, starting empty");
            }
            Err(e) => {
                tracing::warn!(error = ?e, path = %path.display(), "cannot read alert ledger, starting empty");
            }
        }
        ledger
    }

    /// Decide whether `candidate` should produce an alert, and update the
    /// entry accordingly. One atomic compare-and-update per key; candidates
    /// for the same key must be fed in arrival order.
    pub fn decide(&mut self, candidate: &Candidate, now: DateTime<Utc>) -> Decision {
        let key = candidate.record.route_key();
        let price = candidate.record.price;
        let currency = candidate.record.currency;

        let Some(entry) = self.entries.get_mut(&key) else {
            self.entries.insert(
                key,
                LedgerEntry {
                    price,
                    currency,
                    alerted_at: now,
                },
            );
            return Decision::Approve;
        };

        if price < entry.price {
            tracing::info!(
                key = %candidate.record.route_key(),
                old_price = entry.price,
                new_price = price,
                "price dropped further"
            );
            entry.price = price;
            entry.currency = currency;
            entry.alerted_at = now;
            return Decision::ApproveAsDrop;
        }

        if now.signed_duration_since(entry.alerted_at) < self.cooldown {
            return Decision::Suppress;
        }

        // Cooldown expired: refresh the alert. Only the timestamp moves; the
        // recorded price stays, so a later dip below it still counts as a drop.
        entry.alerted_at = now;
        Decision::Approve
    }

    /// Drop entries older than the retention horizon. Called once per run
    /// before new candidates are evaluated, so the file stays bounded.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let retention = self.retention;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.signed_duration_since(entry.alerted_at) <= retention);
        let purged = before - self.entries.len();
        if purged > 0 {
            tracing::info!(purged, "expired ledger entries purged");
        }
        purged
    }

    /// Persist the ledger to its backing file (whole-file write). No-op for
    /// in-memory ledgers.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.entries).context("encoding alert ledger")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(entries = self.entries.len(), "alert ledger saved");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, key: &str) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceRecord, RouteConfig, TripType};
    use chrono::{NaiveDate, TimeZone};

    fn candidate(price: f64) -> Candidate {
        Candidate {
            record: PriceRecord {
                source: "level".into(),
                airline: "Level".into(),
                origin: "EZE".into(),
                destination: "BCN".into(),
                date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
                price,
                currency: Currency::Usd,
                stops: 0,
                flight_number: None,
                seats_remaining: None,
                duration_minutes: None,
                tags: vec![],
                fetched_at: Utc::now(),
            },
            threshold: 550.0,
            threshold_currency: Currency::Usd,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_sighting_approves_and_records() {
        let mut ledger = AlertLedger::in_memory(48, 7);
        assert_eq!(ledger.decide(&candidate(511.0), t0()), Decision::Approve);

        let entry = ledger.entry("EZE-BCN-2026-12-01").unwrap();
        assert_eq!(entry.price, 511.0);
        assert_eq!(entry.currency, Currency::Usd);
        assert_eq!(entry.alerted_at, t0());
    }

    #[test]
    fn repeat_inside_cooldown_suppresses_idempotently() {
        let mut ledger = AlertLedger::in_memory(48, 7);
        ledger.decide(&candidate(511.0), t0());

        let later = t0() + ChronoDuration::hours(1);
        assert_eq!(ledger.decide(&candidate(520.0), later), Decision::Suppress);
        assert_eq!(ledger.decide(&candidate(520.0), later), Decision::Suppress);
        // Suppression leaves the entry untouched.
        assert_eq!(ledger.entry("EZE-BCN-2026-12-01").unwrap().price, 511.0);
        assert_eq!(ledger.entry("EZE-BCN-2026-12-01").unwrap().alerted_at, t0());
    }

    #[test]
    fn lower_price_always_approves_as_drop() {
        let mut ledger = AlertLedger::in_memory(48, 7);
        ledger.decide(&candidate(511.0), t0());

        // Deep inside the cooldown — drops pass anyway.
        let later = t0() + ChronoDuration::minutes(5);
        assert_eq!(
            ledger.decide(&candidate(480.0), later),
            Decision::ApproveAsDrop
        );
        let entry = ledger.entry("EZE-BCN-2026-12-01").unwrap();
        assert_eq!(entry.price, 480.0);
        assert_eq!(entry.alerted_at, later);
    }

    #[test]
    fn strictly_decreasing_prices_never_suppress() {
        let mut ledger = AlertLedger::in_memory(48, 7);
        let mut now = t0();
        for (i, price) in [511.0, 505.0, 490.0, 489.5, 300.0].iter().enumerate() {
            now += ChronoDuration::minutes(10);
            let decision = ledger.decide(&candidate(*price), now);
            if i == 0 {
                assert_eq!(decision, Decision::Approve);
            } else {
                assert_eq!(decision, Decision::ApproveAsDrop);
            }
        }
    }

    #[test]
    fn cooldown_boundary_refreshes() {
        let cooldown_hours = 48;
        let mut ledger = AlertLedger::in_memory(cooldown_hours, 7);
        ledger.decide(&candidate(511.0), t0());

        let just_before = t0() + ChronoDuration::hours(cooldown_hours) - ChronoDuration::seconds(1);
        assert_eq!(
            ledger.decide(&candidate(520.0), just_before),
            Decision::Suppress
        );

        let just_after = t0() + ChronoDuration::hours(cooldown_hours) + ChronoDuration::seconds(1);
        assert_eq!(
            ledger.decide(&candidate(520.0), just_after),
            Decision::Approve
        );

        // Refresh moved the timestamp but kept the lower recorded price, so a
        // later 505 is still a drop.
        let entry = ledger.entry("EZE-BCN-2026-12-01").unwrap();
        assert_eq!(entry.price, 511.0);
        assert_eq!(entry.alerted_at, just_after);
        assert_eq!(
            ledger.decide(&candidate(505.0), just_after + ChronoDuration::minutes(1)),
            Decision::ApproveAsDrop
        );
    }

    #[test]
    fn purge_respects_retention_not_cooldown() {
        let mut ledger = AlertLedger::in_memory(48, 7);
        ledger.decide(&candidate(511.0), t0());

        // Past cooldown but inside retention: stays.
        let day3 = t0() + ChronoDuration::days(3);
        assert_eq!(ledger.purge_expired(day3), 0);
        assert_eq!(ledger.len(), 1);

        // Past retention: gone.
        let day8 = t0() + ChronoDuration::days(8);
        assert_eq!(ledger.purge_expired(day8), 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("alert_state.json");

        let mut ledger = AlertLedger::load(&path, 48, 7);
        assert!(ledger.is_empty());
        ledger.decide(&candidate(511.0), t0());
        ledger.save().unwrap();

        let reloaded = AlertLedger::load(&path, 48, 7);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.entry("EZE-BCN-2026-12-01"),
            ledger.entry("EZE-BCN-2026-12-01")
        );
    }

    #[test]
    fn corrupt_state_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let ledger = AlertLedger::load(&path, 48, 7);
        assert!(ledger.is_empty());
    }
}
