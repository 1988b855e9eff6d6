//! Relay region names from the coordination server's DERP map.

use anyhow::{Context, Result};
use log::{debug, warn};
use meshdash_model::RelayTable;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_DERP_MAP_URL: &str = "https://controlplane.tailscale.com/derpmap/default";

#[derive(Debug, Deserialize)]
struct DerpMap {
    #[serde(rename = "Regions", default)]
    regions: HashMap<String, DerpRegion>,
}

#[derive(Debug, Deserialize)]
struct DerpRegion {
    #[serde(rename = "RegionCode")]
    code: Option<String>,
    #[serde(rename = "RegionName")]
    name: Option<String>,
}

pub fn parse_derp_map(json: &str) -> Result<RelayTable> {
    let map: DerpMap = serde_json::from_str(json).context("invalid DERP map")?;

    let mut table = RelayTable::new();
    for (id, region) in map.regions {
        match (region.code, region.name) {
            (Some(code), Some(name)) if !code.is_empty() => table.insert(code, name),
            _ => debug!("skipping DERP region {id} without code or name"),
        }
    }
    Ok(table)
}

pub fn fetch_relay_table(url: &str, timeout: Duration) -> Result<RelayTable> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")?;
    let body = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .with_context(|| format!("failed to fetch DERP map from {url}"))?;
    parse_derp_map(&body)
}

/// Like [`fetch_relay_table`], but any failure gives an empty table so relay
/// paths fall back to raw region codes.
pub fn load_relay_table(url: &str, timeout: Duration) -> RelayTable {
    match fetch_relay_table(url, timeout) {
        Ok(table) => {
            debug!("loaded {} relay regions", table.len());
            table
        }
        Err(err) => {
            warn!("relay names unavailable, showing region codes: {err:#}");
            RelayTable::new()
        }
    }
}
