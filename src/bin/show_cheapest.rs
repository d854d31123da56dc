//! Fetches every configured route and prints the five cheapest fares per
//! route, no thresholds or ledger involved. Handy for picking a threshold.

use anyhow::Result;

use farewatch::config::{default_config_path, load_config};
use farewatch::fetch::connectors::default_registry;
use farewatch::fetch::collect_all;
use farewatch::models::PriceRecord;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let config = load_config(&default_config_path()?)?;
    let registry = default_registry(&config.settings);

    let records = collect_all(&config.routes, &registry, &config.settings).await;

    for route in &config.routes {
        let mut fares: Vec<&PriceRecord> = records
            .iter()
            .filter(|r| {
                r.origin == route.origin && r.destination == route.destination && r.price > 0.0
            })
            .collect();
        fares.sort_by(|a, b| a.price.total_cmp(&b.price));

        println!("\n{} → {}", route.origin, route.destination);
        if fares.is_empty() {
            println!("  (no fares found)");
            continue;
        }
        for record in fares.iter().take(5) {
            let stops = if record.stops == 0 {
                "nonstop".to_string()
            } else {
                format!("{} stop(s)", record.stops)
            };
            println!(
                "  {}  {:>12}  {}  [{}]",
                record.date,
                record.display_price(),
                stops,
                record.source
            );
        }
    }

    println!("\nshow-cheapest done");
    Ok(())
}
