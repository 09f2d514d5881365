//! The *actual* internal configuration structure (component H).
//!
//! This is ONLY used for the internal configuration, and should not ever
//! be exposed as the public API for CLI or the TOML file — those are
//! separate, smaller structs that [`super::render_config`] layers onto
//! this one's defaults. This is the buffer between any external stable UI
//! and internal impl details which may change at any time, same split
//! river uses between `config::cli`/`config::toml` and `config::internal`.
//!
//! Field coverage matches spec.md §6's recognized-options table exactly.

use std::collections::BTreeMap;

use crate::error::{CompassError, Result};

/// `compass`'s internal configuration: every option spec.md §6 names,
/// typed, plus `regions_to_fetch` (the ordered list the Topology Mapper's
/// `setRegionsToFetch` needs operationally, per spec.md §3's data model).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `allowedPercentageDrop`: eviction tolerance, 0-100.
    pub allowed_percentage_drop: u8,
    /// `rateLimiterEnabled`: enforce (vs. count) at the request gate.
    pub rate_limiter_enabled: bool,
    /// `rateLimiterThrottleStandardClients`.
    pub rate_limiter_throttle_standard_clients: bool,
    /// `rateLimiterPrivilegedClients`.
    pub rate_limiter_privileged_clients: Vec<String>,
    /// `rateLimiterBurstSize`.
    pub rate_limiter_burst_size: i64,
    /// `rateLimiterRegistryFetchAverageRate` (the combined bucket).
    pub rate_limiter_registry_fetch_average_rate: i64,
    /// `rateLimiterFullFetchAverageRate` (the full-only bucket).
    pub rate_limiter_full_fetch_average_rate: i64,
    /// `leaseRenewalIntervalInSeconds`.
    pub lease_renewal_interval_in_seconds: u32,
    /// `leaseExpirationDurationInSeconds`.
    pub lease_expiration_duration_in_seconds: u32,
    /// `availabilityZones(region)`, static variant of the Topology Mapper.
    pub availability_zones: BTreeMap<String, Vec<String>>,
    /// `eurekaServer.domainName`, base for DNS TXT lookups.
    pub eureka_server_domain_name: Option<String>,
    /// `defaultAddressResolutionOrder`.
    pub default_address_resolution_order: Vec<String>,
    /// Regions the Topology Mapper should fetch, in order.
    pub regions_to_fetch: Vec<String>,
    /// Validate-and-exit, mirroring river's `validate_configs` flag.
    pub validate_configs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_percentage_drop: 20,
            rate_limiter_enabled: true,
            rate_limiter_throttle_standard_clients: false,
            rate_limiter_privileged_clients: Vec::new(),
            rate_limiter_burst_size: 10,
            rate_limiter_registry_fetch_average_rate: 500,
            rate_limiter_full_fetch_average_rate: 100,
            lease_renewal_interval_in_seconds: 30,
            lease_expiration_duration_in_seconds: 90,
            availability_zones: BTreeMap::new(),
            eureka_server_domain_name: None,
            default_address_resolution_order: Vec::new(),
            regions_to_fetch: Vec::new(),
            validate_configs: false,
        }
    }
}

impl Config {
    /// Fraction form of `allowed_percentage_drop`, for
    /// [`crate::eviction::allowed_to_evict`].
    pub fn allowed_drop_ratio(&self) -> f64 {
        self.allowed_percentage_drop as f64 / 100.0
    }

    /// Fatal-at-startup checks (spec.md §7's `ConfigurationError`). Zone
    /// resolvability with no default fallback is checked at Topology
    /// Mapper rebuild time instead, since it needs the live resolver.
    pub fn validate(&self) -> Result<()> {
        if self.allowed_percentage_drop > 100 {
            return Err(CompassError::Configuration(format!(
                "allowedPercentageDrop must be 0..=100, got {}",
                self.allowed_percentage_drop
            )));
        }
        if self.rate_limiter_burst_size < 0 {
            return Err(CompassError::Configuration(
                "rateLimiterBurstSize must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn out_of_range_percentage_is_rejected() {
        let cfg = Config {
            allowed_percentage_drop: 101,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(CompassError::Configuration(_))));
    }

    #[test]
    fn drop_ratio_matches_percentage() {
        let cfg = Config {
            allowed_percentage_drop: 20,
            ..Config::default()
        };
        assert_eq!(cfg.allowed_drop_ratio(), 0.20);
    }
}
