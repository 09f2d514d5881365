//! Configuration sourced from a TOML file (component H).
//!
//! Every field is optional here: the TOML form only overrides what it
//! mentions, layered on top of [`super::internal::Config::default`]. This
//! mirrors river's `config::toml` split (a serde-shaped surface struct,
//! `kebab-case` on the wire) but with this crate's own field set.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompassError, Result};

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Toml {
    pub allowed_percentage_drop: Option<u8>,
    pub rate_limiter_enabled: Option<bool>,
    pub rate_limiter_throttle_standard_clients: Option<bool>,
    #[serde(default)]
    pub rate_limiter_privileged_clients: Vec<String>,
    pub rate_limiter_burst_size: Option<i64>,
    pub rate_limiter_registry_fetch_average_rate: Option<i64>,
    pub rate_limiter_full_fetch_average_rate: Option<i64>,
    pub lease_renewal_interval_in_seconds: Option<u32>,
    pub lease_expiration_duration_in_seconds: Option<u32>,
    #[serde(default)]
    pub availability_zones: BTreeMap<String, Vec<String>>,
    pub eureka_server_domain_name: Option<String>,
    #[serde(default)]
    pub default_address_resolution_order: Vec<String>,
    #[serde(default)]
    pub regions_to_fetch: Vec<String>,
}

impl Toml {
    pub fn from_path<P>(path: &P) -> Result<Self>
    where
        P: AsRef<Path> + core::fmt::Debug + ?Sized,
    {
        tracing::info!("Loading TOML from {path:?}");
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CompassError::Configuration(format!("failed to read {path:?}: {e}")))?;
        let parsed: Self = ::toml::from_str(&contents)
            .map_err(|e| CompassError::Configuration(format!("failed to parse {path:?}: {e}")))?;
        tracing::info!("TOML file contents: {parsed:?}");
        Ok(parsed)
    }
}
