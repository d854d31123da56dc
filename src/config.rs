// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{AppSettings, RouteConfig};

const ENV_PATH: &str = "FAREWATCH_CONFIG";

/// Routes plus global settings, as read from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub settings: AppSettings,
}

/// Load and normalize configuration from an explicit path.
/// Supports TOML or JSON formats.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut cfg = parse_config(&content, ext.as_str())?;
    normalize(&mut cfg);
    Ok(cfg)
}

/// Resolve the config path using env var + fallbacks:
/// 1) $FAREWATCH_CONFIG
/// 2) config/routes.toml
/// 3) config/routes.json
pub fn default_config_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(pb);
        }
        return Err(anyhow!("FAREWATCH_CONFIG points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/routes.toml");
    if toml_p.exists() {
        return Ok(toml_p);
    }
    let json_p = PathBuf::from("config/routes.json");
    if json_p.exists() {
        return Ok(json_p);
    }
    Err(anyhow!(
        "no config file found (looked at $FAREWATCH_CONFIG, config/routes.toml, config/routes.json)"
    ))
}

fn parse_config(s: &str, hint_ext: &str) -> Result<FileConfig> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[routes]]");
    if try_toml {
        if let Ok(v) = toml::from_str::<FileConfig>(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = serde_json::from_str::<FileConfig>(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = toml::from_str::<FileConfig>(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("config is neither valid TOML nor valid JSON"))
}

fn normalize(cfg: &mut FileConfig) {
    for route in &mut cfg.routes {
        route.origin = route.origin.trim().to_ascii_uppercase();
        route.destination = route.destination.trim().to_ascii_uppercase();
        for s in &mut route.sources {
            *s = s.trim().to_ascii_lowercase();
        }
        route.sources.retain(|s| !s.is_empty());
    }
}

/// Validate routes against the connector registry. Any invalid route is
/// fatal: a run must not start with a partially-usable route set.
pub fn validate_routes(routes: &[RouteConfig], known_sources: &[String]) -> Result<()> {
    if routes.is_empty() {
        bail!("no routes configured");
    }
    for (i, route) in routes.iter().enumerate() {
        let label = format!("route #{i} ({}→{})", route.origin, route.destination);
        if route.origin.is_empty() || route.destination.is_empty() {
            bail!("route #{i}: origin and destination are required");
        }
        if route.sources.is_empty() {
            bail!("{label}: at least one source is required");
        }
        for s in &route.sources {
            if !known_sources.iter().any(|k| k == s) {
                bail!(
                    "{label}: unknown source '{s}' (known: {})",
                    known_sources.join(", ")
                );
            }
        }
        if route.threshold_usd.is_none() && route.threshold_ars.is_none() {
            bail!("{label}: set threshold_usd and/or threshold_ars");
        }
    }
    Ok(())
}
