// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod checker;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod ledger;
pub mod models;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::checker::Candidate;
pub use crate::engine::{run, RunReport};
pub use crate::fetch::types::Connector;
pub use crate::fetch::ConnectorRegistry;
pub use crate::ledger::{AlertLedger, Decision};
pub use crate::models::{AppSettings, Currency, PriceRecord, RouteConfig, TripType};
pub use crate::notify::{ApprovedAlert, ConsoleNotifier, Notifier};
