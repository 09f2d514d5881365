//! Config Surface (component H)
//!
//! Loads [`internal::Config`] by layering, highest precedence first: CLI
//! flags, then a TOML file, then built-in defaults — the same precedence
//! order river documents for its own config (`config::mod`'s original
//! comment), minus the environment-variable tier spec.md §1 scopes out.

pub mod cli;
pub mod internal;
pub mod toml;

use clap::Parser;
use cli::Cli;

use crate::config::toml::Toml;
use crate::error::Result;

/// Parse CLI flags. Split out from [`render_config`] so `main` can
/// initialize tracing (using `cli.log_level`) before any config-loading
/// log lines are emitted.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Layer a TOML file (if given) on top of defaults, then apply CLI
/// overrides, validating the result.
pub fn render_config(c: &Cli) -> Result<internal::Config> {
    let mut config = internal::Config::default();

    tracing::info!(
        config = ?c,
        "CLI config"
    );

    if let Some(path) = &c.config_toml {
        tracing::info!("Applying TOML options");
        let toml = Toml::from_path(path)?;
        apply_toml(&mut config, &toml);
    } else {
        tracing::info!("No configuration file provided");
    }

    tracing::info!("Applying CLI options");
    apply_cli(&mut config, c);

    config.validate()?;
    tracing::info!(?config, "Full configuration");
    Ok(config)
}

fn apply_cli(conf: &mut internal::Config, cli: &Cli) {
    conf.validate_configs |= cli.validate_configs;
    if let Some(v) = cli.rate_limiter_enabled {
        conf.rate_limiter_enabled = v;
    }
    if let Some(v) = cli.rate_limiter_burst_size {
        conf.rate_limiter_burst_size = v;
    }
    if let Some(v) = cli.allowed_percentage_drop {
        conf.allowed_percentage_drop = v;
    }
}

fn apply_toml(conf: &mut internal::Config, toml: &Toml) {
    if let Some(v) = toml.allowed_percentage_drop {
        conf.allowed_percentage_drop = v;
    }
    if let Some(v) = toml.rate_limiter_enabled {
        conf.rate_limiter_enabled = v;
    }
    if let Some(v) = toml.rate_limiter_throttle_standard_clients {
        conf.rate_limiter_throttle_standard_clients = v;
    }
    if !toml.rate_limiter_privileged_clients.is_empty() {
        conf.rate_limiter_privileged_clients = toml.rate_limiter_privileged_clients.clone();
    }
    if let Some(v) = toml.rate_limiter_burst_size {
        conf.rate_limiter_burst_size = v;
    }
    if let Some(v) = toml.rate_limiter_registry_fetch_average_rate {
        conf.rate_limiter_registry_fetch_average_rate = v;
    }
    if let Some(v) = toml.rate_limiter_full_fetch_average_rate {
        conf.rate_limiter_full_fetch_average_rate = v;
    }
    if let Some(v) = toml.lease_renewal_interval_in_seconds {
        conf.lease_renewal_interval_in_seconds = v;
    }
    if let Some(v) = toml.lease_expiration_duration_in_seconds {
        conf.lease_expiration_duration_in_seconds = v;
    }
    if !toml.availability_zones.is_empty() {
        conf.availability_zones = toml.availability_zones.clone();
    }
    if toml.eureka_server_domain_name.is_some() {
        conf.eureka_server_domain_name = toml.eureka_server_domain_name.clone();
    }
    if !toml.default_address_resolution_order.is_empty() {
        conf.default_address_resolution_order = toml.default_address_resolution_order.clone();
    }
    if !toml.regions_to_fetch.is_empty() {
        conf.regions_to_fetch = toml.regions_to_fetch.clone();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn apply_toml_overrides_only_present_fields() {
        let mut cfg = internal::Config::default();
        let toml = Toml {
            allowed_percentage_drop: Some(50),
            ..Toml::default()
        };
        apply_toml(&mut cfg, &toml);
        assert_eq!(cfg.allowed_percentage_drop, 50);
        assert_eq!(
            cfg.rate_limiter_burst_size,
            internal::Config::default().rate_limiter_burst_size
        );
    }

    #[test]
    fn apply_cli_overrides_on_top_of_toml() {
        let mut cfg = internal::Config {
            allowed_percentage_drop: 50,
            ..internal::Config::default()
        };
        let cli = Cli {
            validate_configs: false,
            config_toml: None,
            rate_limiter_enabled: None,
            rate_limiter_burst_size: None,
            allowed_percentage_drop: Some(10),
            log_level: None,
        };
        apply_cli(&mut cfg, &cli);
        assert_eq!(cfg.allowed_percentage_drop, 10);
    }
}
