pub mod telegram;

use anyhow::Result;

use crate::checker::Candidate;

/// A candidate the ledger approved, ready for delivery. `dropped_further`
/// switches the message header: this key already alerted once and the price
/// has gone down since.
#[derive(Debug, Clone)]
pub struct ApprovedAlert {
    pub candidate: Candidate,
    pub dropped_further: bool,
}

/// Outbound alert channel. A failed send is the caller's problem to log;
/// implementations just report it.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &ApprovedAlert) -> Result<()>;

    /// Best-effort operator notice (e.g. a connector's credentials expired).
    async fn notify_error(&self, message: &str) -> Result<()>;
}

/// Format an alert as Telegram HTML. The console sink strips the tags.
pub fn format_message(alert: &ApprovedAlert) -> String {
    let record = &alert.candidate.record;
    let (emoji, header) = if alert.dropped_further {
        ("📉", "DROPPED FURTHER")
    } else {
        ("🔥", "PRICE ALERT")
    };

    let mut lines = vec![
        format!(
            "{emoji} <b>{header} — {} → {}</b>",
            record.origin, record.destination
        ),
        String::new(),
        format!("💰 <b>{}</b> ({})", record.display_price(), record.airline),
        format!("📅 {}", record.date),
    ];

    if record.stops == 0 {
        lines.push("✈️ Nonstop".to_string());
    } else {
        lines.push(format!("✈️ {} stop(s)", record.stops));
    }

    if let Some(flight_number) = &record.flight_number {
        lines.push(format!("🔢 Flight {flight_number}"));
    }
    if let Some(seats) = record.seats_remaining {
        let urgency = if seats <= 3 { "⚡" } else { "🪑" };
        lines.push(format!("{urgency} {seats} seats left"));
    }
    if let Some(minutes) = record.duration_minutes {
        lines.push(format!("⏱️ {}h {}m", minutes / 60, minutes % 60));
    }
    if record.tags.iter().any(|t| t == "IsMinimumPriceMonth") {
        lines.push("🏷️ <i>Lowest price of the month</i>".to_string());
    }

    lines.extend([
        String::new(),
        format!("📊 Source: {}", record.source),
        format!(
            "🎯 Threshold: {} {}",
            alert.candidate.threshold_currency, alert.candidate.threshold
        ),
        format!("⏰ {} UTC", record.fetched_at.format("%Y-%m-%d %H:%M:%S")),
    ]);

    lines.join("\n")
}

/// Escape the subset of HTML Telegram cares about.
pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Dry-run sink: prints would-be alerts to stdout instead of sending them.
pub struct ConsoleNotifier;

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, alert: &ApprovedAlert) -> Result<()> {
        let clean = format_message(alert)
            .replace("<b>", "")
            .replace("</b>", "")
            .replace("<i>", "")
            .replace("</i>", "");
        println!("\n{}", "=".repeat(50));
        println!("[DRY RUN] alert that would be sent:");
        println!("{clean}");
        println!("{}\n", "=".repeat(50));
        Ok(())
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        println!("\n⚠️ {message}\n");
        Ok(())
    }
}
