// src/fetch/connectors/mod.rs
pub mod level;
pub mod sky;

use std::sync::Arc;

use crate::fetch::types::Connector;
use crate::fetch::ConnectorRegistry;
use crate::models::AppSettings;

/// Registry with every built-in provider. Adding a provider means one new
/// module implementing [`Connector`] and one line here.
pub fn default_registry(settings: &AppSettings) -> ConnectorRegistry {
    let connectors: Vec<Arc<dyn Connector>> = vec![
        Arc::new(level::LevelConnector::new(settings)),
        Arc::new(sky::SkyConnector::new(settings)),
    ];
    connectors
        .into_iter()
        .map(|c| (c.name().to_string(), c))
        .collect()
}
